use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, Utc};

use super::codec::{self, *};
use super::keys::*;
use super::model::{ArchiveStatus, Item, ItemStatus};
use crate::error::{BoardError, Result};

/// Which sweep a scan page is selecting candidates for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// `autoArchiveAt <= now` and not archived
    ArchiveDue,
    /// `status = pending`, `deadline < now` and not archived
    OverdueUnstarted,
}

/// Opaque continuation key; every key attribute of the table is a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(pub BTreeMap<String, String>);

#[derive(Debug, Default)]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// Rows on this page that could not be decoded
    pub skipped: usize,
    pub next: Option<PageCursor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveGuard {
    /// Scheduled sweep: the `autoArchiveAt` marker must still be present
    Scheduled,
    /// Interactive "archive now" / force archive
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived,
    /// Someone else won the transition, or the item is gone; nothing written
    AlreadyArchived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteGuard {
    /// Interactive delete: the item only has to exist unarchived
    Unarchived,
    /// Overdue sweep: the row must still be pending with `deadline < now`
    /// when the delete is written, not just when it was scanned
    OverdueUnstarted { now: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Already deleted or archived in the meantime; nothing removed
    Skipped,
}

/// Access-pattern contract of the board table
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get(&self, org_id: &str, item_id: &str) -> Result<Option<Item>>;

    /// Insert a new item; an existing (orgId, itemId) pair is a conflict
    async fn put_new(&self, item: &Item) -> Result<()>;

    /// Overwrite a live item; archived or missing items are a conflict
    async fn replace(&self, item: &Item) -> Result<()>;

    /// One-way archive transition: sets `archivedAt`, `archiveStatus`,
    /// `updatedAt` and removes `autoArchiveAt` in a single conditional write
    async fn archive(
        &self,
        org_id: &str,
        item_id: &str,
        status: ArchiveStatus,
        at: DateTime<Utc>,
        guard: ArchiveGuard,
    ) -> Result<ArchiveOutcome>;

    /// Physically remove an item that has never been archived, subject to `guard`
    async fn delete_unarchived(
        &self,
        org_id: &str,
        item_id: &str,
        guard: DeleteGuard,
    ) -> Result<DeleteOutcome>;

    async fn scan_page(
        &self,
        sweep: Sweep,
        now: DateTime<Utc>,
        cursor: Option<PageCursor>,
    ) -> Result<ItemPage>;

    /// Items created by a user, oldest first
    async fn user_feed(
        &self,
        user_id: &str,
        limit: i32,
        cursor: Option<PageCursor>,
    ) -> Result<ItemPage>;

    /// All items, newest first
    async fn global_feed(&self, limit: i32, cursor: Option<PageCursor>) -> Result<ItemPage>;
}

/// DynamoDB-backed item store
#[derive(Clone)]
pub struct DynamoItemStore {
    client: DynamoClient,
    table_name: String,
}

impl std::fmt::Debug for DynamoItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoItemStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoItemStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn cursor_to_key(cursor: PageCursor) -> HashMap<String, AttributeValue> {
        cursor
            .0
            .into_iter()
            .map(|(k, v)| (k, AttributeValue::S(v)))
            .collect()
    }

    fn key_to_cursor(key: Option<&HashMap<String, AttributeValue>>) -> Option<PageCursor> {
        match key {
            Some(key) if !key.is_empty() => Some(PageCursor(
                key.iter()
                    .filter_map(|(k, v)| v.as_s().ok().map(|s| (k.clone(), s.clone())))
                    .collect(),
            )),
            _ => None,
        }
    }

    fn decode_page(
        rows: &[HashMap<String, AttributeValue>],
        last_key: Option<&HashMap<String, AttributeValue>>,
    ) -> ItemPage {
        let mut page = ItemPage {
            next: Self::key_to_cursor(last_key),
            ..Default::default()
        };
        for row in rows {
            match codec::attributes_to_item(row) {
                Ok(item) => page.items.push(item),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable item row");
                    page.skipped += 1;
                }
            }
        }
        page
    }
}

/// Check if a DynamoDB error is a conditional check failure
fn is_conditional_check_failed<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ConditionalCheck,
{
    match err {
        SdkError::ServiceError(service_err) => service_err.err().is_conditional_check(),
        _ => false,
    }
}

trait ConditionalCheck {
    fn is_conditional_check(&self) -> bool;
}

impl ConditionalCheck for aws_sdk_dynamodb::operation::put_item::PutItemError {
    fn is_conditional_check(&self) -> bool {
        self.is_conditional_check_failed_exception()
    }
}

impl ConditionalCheck for aws_sdk_dynamodb::operation::update_item::UpdateItemError {
    fn is_conditional_check(&self) -> bool {
        self.is_conditional_check_failed_exception()
    }
}

impl ConditionalCheck for aws_sdk_dynamodb::operation::delete_item::DeleteItemError {
    fn is_conditional_check(&self) -> bool {
        self.is_conditional_check_failed_exception()
    }
}

#[async_trait]
impl ItemStore for DynamoItemStore {
    async fn get(&self, org_id: &str, item_id: &str) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ATTR_PK, AttributeValue::S(item_pk(org_id)))
            .key(ATTR_SK, AttributeValue::S(item_sk(item_id)))
            .send()
            .await
            .map_err(|e| BoardError::dynamo(format!("get_item failed: {}", e)))?;

        result.item().map(codec::attributes_to_item).transpose()
    }

    async fn put_new(&self, item: &Item) -> Result<()> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(codec::item_to_attributes(item)))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", ATTR_PK)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_conditional_check_failed(&e) => Err(BoardError::conflict(format!(
                "item {} already exists in {}",
                item.item_id, item.org_id
            ))),
            Err(e) => Err(BoardError::dynamo(format!("put_item failed: {}", e))),
        }
    }

    async fn replace(&self, item: &Item) -> Result<()> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(codec::item_to_attributes(item)))
            .condition_expression("attribute_exists(#pk) AND attribute_not_exists(#archived)")
            .expression_attribute_names("#pk", ATTR_PK)
            .expression_attribute_names("#archived", ATTR_ARCHIVED_AT)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_conditional_check_failed(&e) => Err(BoardError::conflict(format!(
                "item {} is missing or archived",
                item.item_id
            ))),
            Err(e) => Err(BoardError::dynamo(format!("put_item failed: {}", e))),
        }
    }

    async fn archive(
        &self,
        org_id: &str,
        item_id: &str,
        status: ArchiveStatus,
        at: DateTime<Utc>,
        guard: ArchiveGuard,
    ) -> Result<ArchiveOutcome> {
        let condition = match guard {
            ArchiveGuard::Scheduled => {
                "attribute_exists(#pk) AND attribute_not_exists(#archived) AND attribute_exists(#auto)"
            }
            ArchiveGuard::Immediate => "attribute_exists(#pk) AND attribute_not_exists(#archived)",
        };
        let now = codec::format_timestamp(&at);

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(ATTR_PK, AttributeValue::S(item_pk(org_id)))
            .key(ATTR_SK, AttributeValue::S(item_sk(item_id)))
            .update_expression(
                "SET #archived = :now, #archive_status = :status, #updated = :now REMOVE #auto",
            )
            .condition_expression(condition)
            .expression_attribute_names("#pk", ATTR_PK)
            .expression_attribute_names("#archived", ATTR_ARCHIVED_AT)
            .expression_attribute_names("#archive_status", ATTR_ARCHIVE_STATUS)
            .expression_attribute_names("#updated", ATTR_UPDATED_AT)
            .expression_attribute_names("#auto", ATTR_AUTO_ARCHIVE_AT)
            .expression_attribute_values(":now", AttributeValue::S(now))
            .expression_attribute_values(":status", AttributeValue::S(status.as_str().to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(ArchiveOutcome::Archived),
            Err(e) if is_conditional_check_failed(&e) => Ok(ArchiveOutcome::AlreadyArchived),
            Err(e) => Err(BoardError::dynamo(format!("update_item failed: {}", e))),
        }
    }

    async fn delete_unarchived(
        &self,
        org_id: &str,
        item_id: &str,
        guard: DeleteGuard,
    ) -> Result<DeleteOutcome> {
        let mut request = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key(ATTR_PK, AttributeValue::S(item_pk(org_id)))
            .key(ATTR_SK, AttributeValue::S(item_sk(item_id)))
            .expression_attribute_names("#pk", ATTR_PK)
            .expression_attribute_names("#archived", ATTR_ARCHIVED_AT);

        request = match guard {
            DeleteGuard::Unarchived => request
                .condition_expression("attribute_exists(#pk) AND attribute_not_exists(#archived)"),
            DeleteGuard::OverdueUnstarted { now } => request
                .condition_expression(
                    "attribute_exists(#pk) AND attribute_not_exists(#archived) \
                     AND #status = :pending AND #deadline < :now",
                )
                .expression_attribute_names("#status", ATTR_STATUS)
                .expression_attribute_names("#deadline", ATTR_DEADLINE)
                .expression_attribute_values(
                    ":pending",
                    AttributeValue::S(ItemStatus::Pending.as_str().to_string()),
                )
                .expression_attribute_values(
                    ":now",
                    AttributeValue::S(codec::format_timestamp(&now)),
                ),
        };

        let result = request.send().await;

        match result {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(e) if is_conditional_check_failed(&e) => Ok(DeleteOutcome::Skipped),
            Err(e) => Err(BoardError::dynamo(format!("delete_item failed: {}", e))),
        }
    }

    async fn scan_page(
        &self,
        sweep: Sweep,
        now: DateTime<Utc>,
        cursor: Option<PageCursor>,
    ) -> Result<ItemPage> {
        let mut request = self
            .client
            .scan()
            .table_name(&self.table_name)
            .expression_attribute_names("#entity", ATTR_ENTITY_TYPE)
            .expression_attribute_names("#archived", ATTR_ARCHIVED_AT)
            .expression_attribute_values(":item", AttributeValue::S(ITEM_ENTITY.to_string()))
            .expression_attribute_values(":now", AttributeValue::S(codec::format_timestamp(&now)));

        request = match sweep {
            Sweep::ArchiveDue => request
                .filter_expression(
                    "#entity = :item AND attribute_exists(#auto) AND #auto <= :now \
                     AND attribute_not_exists(#archived)",
                )
                .expression_attribute_names("#auto", ATTR_AUTO_ARCHIVE_AT),
            Sweep::OverdueUnstarted => request
                .filter_expression(
                    "#entity = :item AND #status = :pending AND attribute_exists(#deadline) \
                     AND #deadline < :now AND attribute_not_exists(#archived)",
                )
                .expression_attribute_names("#status", ATTR_STATUS)
                .expression_attribute_names("#deadline", ATTR_DEADLINE)
                .expression_attribute_values(
                    ":pending",
                    AttributeValue::S(ItemStatus::Pending.as_str().to_string()),
                ),
        };

        if let Some(cursor) = cursor {
            request = request.set_exclusive_start_key(Some(Self::cursor_to_key(cursor)));
        }

        let response = request
            .send()
            .await
            .map_err(|e| BoardError::dynamo(format!("scan failed: {}", e)))?;

        Ok(Self::decode_page(response.items(), response.last_evaluated_key()))
    }

    async fn user_feed(
        &self,
        user_id: &str,
        limit: i32,
        cursor: Option<PageCursor>,
    ) -> Result<ItemPage> {
        let response = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(USER_FEED_INDEX)
            .key_condition_expression("#pk = :pk AND begins_with(#sk, :sk_prefix)")
            .expression_attribute_names("#pk", ATTR_GSI1_PK)
            .expression_attribute_names("#sk", ATTR_GSI1_SK)
            .expression_attribute_values(":pk", AttributeValue::S(user_feed_pk(user_id)))
            .expression_attribute_values(":sk_prefix", AttributeValue::S("ITEM#".to_string()))
            .scan_index_forward(true)
            .limit(limit)
            .set_exclusive_start_key(cursor.map(Self::cursor_to_key))
            .send()
            .await
            .map_err(|e| BoardError::dynamo(format!("user feed query failed: {}", e)))?;

        Ok(Self::decode_page(response.items(), response.last_evaluated_key()))
    }

    async fn global_feed(&self, limit: i32, cursor: Option<PageCursor>) -> Result<ItemPage> {
        let response = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(GLOBAL_FEED_INDEX)
            .key_condition_expression("#pk = :pk")
            .expression_attribute_names("#pk", ATTR_GSI2_PK)
            .expression_attribute_values(":pk", AttributeValue::S(ITEM_ENTITY.to_string()))
            .scan_index_forward(false)
            .limit(limit)
            .set_exclusive_start_key(cursor.map(Self::cursor_to_key))
            .send()
            .await
            .map_err(|e| BoardError::dynamo(format!("global feed query failed: {}", e)))?;

        Ok(Self::decode_page(response.items(), response.last_evaluated_key()))
    }
}
