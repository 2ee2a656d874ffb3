//! Key layout of the single board table.
//!
//! ```text
//! PK     = ORG#{orgId}        SK     = ITEM#{itemId}      primary lookup
//! GSI1PK = USER#{ownerId}     GSI1SK = ITEM#{createdAt}   items by user, chronological
//! GSI2PK = ITEM               GSI2SK = {createdAt}        global feed, newest first
//! ```

pub const ATTR_PK: &str = "PK";
pub const ATTR_SK: &str = "SK";
pub const ATTR_GSI1_PK: &str = "GSI1PK";
pub const ATTR_GSI1_SK: &str = "GSI1SK";
pub const ATTR_GSI2_PK: &str = "GSI2PK";
pub const ATTR_GSI2_SK: &str = "GSI2SK";

pub const USER_FEED_INDEX: &str = "GSI1";
pub const GLOBAL_FEED_INDEX: &str = "GSI2";

/// Entity discriminator shared by every item row, also the global feed partition
pub const ITEM_ENTITY: &str = "ITEM";

const ORG_PREFIX: &str = "ORG#";
const ITEM_PREFIX: &str = "ITEM#";
const USER_PREFIX: &str = "USER#";

pub fn item_pk(org_id: &str) -> String {
    format!("{}{}", ORG_PREFIX, org_id)
}

pub fn item_sk(item_id: &str) -> String {
    format!("{}{}", ITEM_PREFIX, item_id)
}

pub fn user_feed_pk(user_id: &str) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

pub fn user_feed_sk(created_at: &str) -> String {
    format!("{}{}", ITEM_PREFIX, created_at)
}

pub fn org_id_from_pk(pk: &str) -> Option<&str> {
    pk.strip_prefix(ORG_PREFIX)
        .map(|rest| rest.split('#').next().unwrap_or(rest))
        .filter(|id| !id.is_empty())
}

pub fn item_id_from_sk(sk: &str) -> Option<&str> {
    sk.strip_prefix(ITEM_PREFIX).filter(|id| !id.is_empty())
}

/// Legacy compatibility: recover an owner id from the keys of a record written
/// before `ownerId` was stored explicitly.
///
/// Older rows embedded the creator in the partition key (`USER#{id}` or
/// `ORG#{org}#USER#{id}`); the by-user index key carries it as well. The result
/// is best-effort and must never override an explicit `ownerId`. Delete this
/// once every record carries the attribute.
pub fn legacy_owner_id(pk: &str, gsi1_pk: Option<&str>) -> Option<String> {
    let from_pk = pk
        .split('#')
        .collect::<Vec<_>>()
        .windows(2)
        .find(|pair| pair[0] == "USER" && !pair[1].is_empty())
        .map(|pair| pair[1].to_string());

    from_pk.or_else(|| {
        gsi1_pk
            .and_then(|k| k.strip_prefix(USER_PREFIX))
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        assert_eq!(item_pk("acme"), "ORG#acme");
        assert_eq!(item_sk("42"), "ITEM#42");
        assert_eq!(user_feed_pk("u1"), "USER#u1");
        assert_eq!(
            user_feed_sk("2025-01-01T00:00:00.000Z"),
            "ITEM#2025-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_key_parsers() {
        assert_eq!(org_id_from_pk("ORG#acme"), Some("acme"));
        assert_eq!(org_id_from_pk("ORG#acme#USER#u1"), Some("acme"));
        assert_eq!(org_id_from_pk("USER#u1"), None);
        assert_eq!(item_id_from_sk("ITEM#42"), Some("42"));
        assert_eq!(item_id_from_sk("ITEM#"), None);
    }

    #[test]
    fn test_legacy_owner_from_partition_key() {
        assert_eq!(legacy_owner_id("USER#u1", None), Some("u1".to_string()));
        assert_eq!(
            legacy_owner_id("ORG#acme#USER#u2", Some("USER#other")),
            Some("u2".to_string())
        );
    }

    #[test]
    fn test_legacy_owner_falls_back_to_user_index_key() {
        assert_eq!(
            legacy_owner_id("ORG#acme", Some("USER#u3")),
            Some("u3".to_string())
        );
        assert_eq!(legacy_owner_id("ORG#acme", None), None);
        assert_eq!(legacy_owner_id("ORG#acme", Some("USER#")), None);
    }
}
