//! Conversion between `Item` and DynamoDB attribute maps.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};

use super::keys::{self, *};
use super::model::*;
use crate::error::{BoardError, Result};

pub const ATTR_ENTITY_TYPE: &str = "entityType";
pub const ATTR_ITEM_TYPE: &str = "itemType";
pub const ATTR_OWNER_ID: &str = "ownerId";
pub const ATTR_TITLE: &str = "title";
pub const ATTR_CONTENT: &str = "content";
/// Note: "status" is a DynamoDB reserved word, use ExpressionAttributeNames
pub const ATTR_STATUS: &str = "status";
pub const ATTR_CREATED_AT: &str = "createdAt";
pub const ATTR_UPDATED_AT: &str = "updatedAt";
pub const ATTR_DEADLINE: &str = "deadline";
pub const ATTR_SUBTASKS: &str = "subtasks";
pub const ATTR_ASSIGNEE_ID: &str = "assigneeId";
pub const ATTR_ARCHIVED_AT: &str = "archivedAt";
pub const ATTR_ARCHIVE_STATUS: &str = "archiveStatus";
pub const ATTR_AUTO_ARCHIVE_AT: &str = "autoArchiveAt";
pub const ATTR_PRIORITY: &str = "priority";
pub const ATTR_EXPIRES_AT: &str = "expiresAt";
pub const ATTR_IS_PINNED: &str = "isPinned";
pub const ATTR_PINNED_UNTIL: &str = "pinnedUntil";

const TASK_TYPE: &str = "task";
const ANNOUNCEMENT_TYPE: &str = "announcement";

/// Fixed-width UTC timestamp so lexical order matches chronological order
/// inside filter expressions.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

fn ts(at: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(format_timestamp(at))
}

/// Full attribute map for an item, including all key attributes
pub fn item_to_attributes(item: &Item) -> HashMap<String, AttributeValue> {
    let created_at = format_timestamp(&item.created_at);
    let mut attrs = HashMap::new();

    attrs.insert(ATTR_PK.to_string(), s(item_pk(&item.org_id)));
    attrs.insert(ATTR_SK.to_string(), s(item_sk(&item.item_id)));
    attrs.insert(ATTR_GSI1_PK.to_string(), s(user_feed_pk(&item.owner_id)));
    attrs.insert(ATTR_GSI1_SK.to_string(), s(user_feed_sk(&created_at)));
    attrs.insert(ATTR_GSI2_PK.to_string(), s(ITEM_ENTITY));
    attrs.insert(ATTR_GSI2_SK.to_string(), s(created_at.clone()));

    attrs.insert(ATTR_ENTITY_TYPE.to_string(), s(ITEM_ENTITY));
    attrs.insert(ATTR_OWNER_ID.to_string(), s(item.owner_id.clone()));
    attrs.insert(ATTR_TITLE.to_string(), s(item.title.clone()));
    attrs.insert(ATTR_CONTENT.to_string(), s(item.content.clone()));
    attrs.insert(ATTR_STATUS.to_string(), s(item.status.as_str()));
    attrs.insert(ATTR_CREATED_AT.to_string(), s(created_at));
    attrs.insert(ATTR_UPDATED_AT.to_string(), ts(&item.updated_at));

    match &item.kind {
        ItemKind::Task(task) => {
            attrs.insert(ATTR_ITEM_TYPE.to_string(), s(TASK_TYPE));
            if let Some(deadline) = &task.deadline {
                attrs.insert(ATTR_DEADLINE.to_string(), ts(deadline));
            }
            attrs.insert(
                ATTR_SUBTASKS.to_string(),
                AttributeValue::L(task.subtasks.iter().map(subtask_to_attribute).collect()),
            );
            if let Some(assignee) = &task.assignee_id {
                attrs.insert(ATTR_ASSIGNEE_ID.to_string(), s(assignee.clone()));
            }
            if let Some(archived) = &task.archived {
                attrs.insert(ATTR_ARCHIVED_AT.to_string(), ts(&archived.at));
                attrs.insert(ATTR_ARCHIVE_STATUS.to_string(), s(archived.status.as_str()));
            }
            if let Some(at) = &task.auto_archive_at {
                attrs.insert(ATTR_AUTO_ARCHIVE_AT.to_string(), ts(at));
            }
        }
        ItemKind::Announcement(announcement) => {
            attrs.insert(ATTR_ITEM_TYPE.to_string(), s(ANNOUNCEMENT_TYPE));
            attrs.insert(ATTR_PRIORITY.to_string(), s(announcement.priority.as_str()));
            attrs.insert(
                ATTR_IS_PINNED.to_string(),
                AttributeValue::Bool(announcement.is_pinned),
            );
            if let Some(at) = &announcement.expires_at {
                attrs.insert(ATTR_EXPIRES_AT.to_string(), ts(at));
            }
            if let Some(at) = &announcement.pinned_until {
                attrs.insert(ATTR_PINNED_UNTIL.to_string(), ts(at));
            }
        }
    }

    attrs
}

fn subtask_to_attribute(subtask: &Subtask) -> AttributeValue {
    let mut map = HashMap::new();
    map.insert("id".to_string(), s(subtask.id.clone()));
    map.insert("title".to_string(), s(subtask.title.clone()));
    map.insert("completed".to_string(), AttributeValue::Bool(subtask.completed));
    if let Some(at) = &subtask.completed_at {
        map.insert("completedAt".to_string(), ts(at));
    }
    AttributeValue::M(map)
}

fn get_s<'a>(attrs: &'a HashMap<String, AttributeValue>, name: &str) -> Option<&'a str> {
    attrs.get(name).and_then(|v| v.as_s().ok()).map(|v| v.as_str())
}

fn get_ts(attrs: &HashMap<String, AttributeValue>, name: &str) -> Option<DateTime<Utc>> {
    get_s(attrs, name).and_then(parse_timestamp)
}

fn get_bool(attrs: &HashMap<String, AttributeValue>, name: &str) -> bool {
    attrs
        .get(name)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(false)
}

/// Decode a stored row. Missing optional attributes get defaults; missing
/// identity attributes make the record invalid.
pub fn attributes_to_item(attrs: &HashMap<String, AttributeValue>) -> Result<Item> {
    let pk = get_s(attrs, ATTR_PK).ok_or_else(|| BoardError::invalid_record("missing PK"))?;
    let sk = get_s(attrs, ATTR_SK).ok_or_else(|| BoardError::invalid_record("missing SK"))?;

    let org_id = keys::org_id_from_pk(pk)
        .ok_or_else(|| BoardError::invalid_record(format!("unexpected PK {}", pk)))?
        .to_string();
    let item_id = keys::item_id_from_sk(sk)
        .ok_or_else(|| BoardError::invalid_record(format!("unexpected SK {}", sk)))?
        .to_string();

    let owner_id = get_s(attrs, ATTR_OWNER_ID)
        .map(|s| s.to_string())
        .or_else(|| keys::legacy_owner_id(pk, get_s(attrs, ATTR_GSI1_PK)))
        .ok_or_else(|| BoardError::invalid_record(format!("no owner for {}/{}", pk, sk)))?;

    let status = get_s(attrs, ATTR_STATUS)
        .and_then(ItemStatus::parse)
        .unwrap_or(ItemStatus::Pending);

    let created_at = get_ts(attrs, ATTR_CREATED_AT)
        .ok_or_else(|| BoardError::invalid_record(format!("bad createdAt on {}/{}", pk, sk)))?;
    let updated_at = get_ts(attrs, ATTR_UPDATED_AT).unwrap_or(created_at);

    let kind = match get_s(attrs, ATTR_ITEM_TYPE) {
        Some(ANNOUNCEMENT_TYPE) => ItemKind::Announcement(AnnouncementDetails {
            priority: get_s(attrs, ATTR_PRIORITY)
                .and_then(Priority::parse)
                .unwrap_or_default(),
            expires_at: get_ts(attrs, ATTR_EXPIRES_AT),
            is_pinned: get_bool(attrs, ATTR_IS_PINNED),
            pinned_until: get_ts(attrs, ATTR_PINNED_UNTIL),
        }),
        // Rows written before itemType existed are tasks
        _ => ItemKind::Task(decode_task(attrs)?),
    };

    Ok(Item {
        org_id,
        item_id,
        owner_id,
        title: get_s(attrs, ATTR_TITLE).unwrap_or_default().to_string(),
        content: get_s(attrs, ATTR_CONTENT).unwrap_or_default().to_string(),
        status,
        created_at,
        updated_at,
        kind,
    })
}

fn decode_task(attrs: &HashMap<String, AttributeValue>) -> Result<TaskDetails> {
    let subtasks = match attrs.get(ATTR_SUBTASKS).and_then(|v| v.as_l().ok()) {
        Some(list) => list
            .iter()
            .filter_map(|v| v.as_m().ok())
            .map(|m| Subtask {
                id: get_s(m, "id").unwrap_or_default().to_string(),
                title: get_s(m, "title").unwrap_or_default().to_string(),
                completed: get_bool(m, "completed"),
                completed_at: get_ts(m, "completedAt"),
            })
            .collect(),
        None => vec![],
    };

    let archived = match get_ts(attrs, ATTR_ARCHIVED_AT) {
        Some(at) => {
            let status = get_s(attrs, ATTR_ARCHIVE_STATUS)
                .and_then(ArchiveStatus::parse)
                .ok_or_else(|| BoardError::invalid_record("archivedAt without archiveStatus"))?;
            Some(Archived { at, status })
        }
        None => None,
    };

    Ok(TaskDetails {
        deadline: get_ts(attrs, ATTR_DEADLINE),
        subtasks,
        assignee_id: get_s(attrs, ATTR_ASSIGNEE_ID).map(|s| s.to_string()),
        archived,
        auto_archive_at: get_ts(attrs, ATTR_AUTO_ARCHIVE_AT),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap()
    }

    fn sample_task() -> Item {
        Item {
            org_id: "acme".to_string(),
            item_id: "t1".to_string(),
            owner_id: "u1".to_string(),
            title: "Ship it".to_string(),
            content: "".to_string(),
            status: ItemStatus::Completed,
            created_at: at(1),
            updated_at: at(2),
            kind: ItemKind::Task(TaskDetails {
                deadline: Some(at(9)),
                subtasks: vec![Subtask {
                    id: "s1".to_string(),
                    title: "write".to_string(),
                    completed: true,
                    completed_at: Some(at(2)),
                }],
                assignee_id: None,
                archived: None,
                auto_archive_at: Some(at(3)),
            }),
        }
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        assert_eq!(format_timestamp(&at(5)), "2025-03-01T05:00:00.000Z");
        assert_eq!(parse_timestamp("2025-03-01T05:00:00Z"), Some(at(5)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_task_attributes_carry_all_keys() {
        let attrs = item_to_attributes(&sample_task());
        assert_eq!(get_s(&attrs, ATTR_PK), Some("ORG#acme"));
        assert_eq!(get_s(&attrs, ATTR_SK), Some("ITEM#t1"));
        assert_eq!(get_s(&attrs, ATTR_GSI1_PK), Some("USER#u1"));
        assert_eq!(get_s(&attrs, ATTR_GSI1_SK), Some("ITEM#2025-03-01T01:00:00.000Z"));
        assert_eq!(get_s(&attrs, ATTR_GSI2_PK), Some("ITEM"));
        assert_eq!(get_s(&attrs, ATTR_GSI2_SK), Some("2025-03-01T01:00:00.000Z"));
        assert_eq!(get_s(&attrs, ATTR_ENTITY_TYPE), Some("ITEM"));
        assert_eq!(get_s(&attrs, ATTR_ITEM_TYPE), Some("task"));
        assert!(!attrs.contains_key(ATTR_ARCHIVED_AT));

        let decoded = attributes_to_item(&attrs).unwrap();
        assert_eq!(decoded, sample_task());
    }

    #[test]
    fn test_missing_owner_uses_legacy_key_fallback() {
        let mut attrs = item_to_attributes(&sample_task());
        attrs.remove(ATTR_OWNER_ID);
        attrs.insert(ATTR_GSI1_PK.to_string(), s("USER#legacy"));

        let decoded = attributes_to_item(&attrs).unwrap();
        assert_eq!(decoded.owner_id, "legacy");
    }

    #[test]
    fn test_explicit_owner_wins_over_legacy_keys() {
        let mut attrs = item_to_attributes(&sample_task());
        attrs.insert(ATTR_PK.to_string(), s("ORG#acme#USER#someone-else"));

        let decoded = attributes_to_item(&attrs).unwrap();
        assert_eq!(decoded.owner_id, "u1");
    }

    #[test]
    fn test_archived_without_status_is_invalid() {
        let mut attrs = item_to_attributes(&sample_task());
        attrs.insert(ATTR_ARCHIVED_AT.to_string(), ts(&at(4)));

        let err = attributes_to_item(&attrs).unwrap_err();
        assert!(matches!(err, BoardError::InvalidRecord(_)));
    }

    #[test]
    fn test_announcement_decodes_with_defaults() {
        let mut attrs = HashMap::new();
        attrs.insert(ATTR_PK.to_string(), s("ORG#acme"));
        attrs.insert(ATTR_SK.to_string(), s("ITEM#a1"));
        attrs.insert(ATTR_OWNER_ID.to_string(), s("mod"));
        attrs.insert(ATTR_ITEM_TYPE.to_string(), s("announcement"));
        attrs.insert(ATTR_STATUS.to_string(), s("active"));
        attrs.insert(ATTR_CREATED_AT.to_string(), s("2025-03-01T01:00:00.000Z"));

        let item = attributes_to_item(&attrs).unwrap();
        assert!(item.is_announcement());
        assert_eq!(item.updated_at, item.created_at);
        match item.kind {
            ItemKind::Announcement(a) => {
                assert_eq!(a.priority, Priority::Normal);
                assert!(!a.is_pinned);
            }
            ItemKind::Task(_) => panic!("expected announcement"),
        }
    }
}
