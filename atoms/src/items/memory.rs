//! In-memory item store for testing
//!
//! Rows are kept in key order and scanned the way DynamoDB scans: a page examines
//! at most `page_size` rows and returns only those matching the filter, so a page
//! may be empty while a continuation cursor is still returned.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::keys::{item_pk, item_sk, ATTR_PK, ATTR_SK};
use super::model::{ArchiveStatus, Archived, Item, ItemKind};
use super::store::*;
use crate::archive::{is_archive_due, is_overdue_unstarted};
use crate::error::{BoardError, Result};

type RowKey = (String, String);

#[derive(Default)]
struct Faults {
    failing_writes: HashSet<String>,
    fail_scans: bool,
    scans_before_failure: Option<usize>,
}

#[derive(Clone)]
pub struct MemoryItemStore {
    rows: Arc<RwLock<BTreeMap<RowKey, Item>>>,
    faults: Arc<RwLock<Faults>>,
    page_size: usize,
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::with_page_size(100)
    }
}

impl std::fmt::Debug for MemoryItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryItemStore")
            .field("row_count", &self.rows.read().len())
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            faults: Arc::new(RwLock::new(Faults::default())),
            page_size: page_size.max(1),
        }
    }

    fn key(org_id: &str, item_id: &str) -> RowKey {
        (item_pk(org_id), item_sk(item_id))
    }

    /// Seed a row directly, bypassing conditions
    pub fn insert(&self, item: Item) {
        let key = Self::key(&item.org_id, &item.item_id);
        self.rows.write().insert(key, item);
    }

    pub fn snapshot(&self, org_id: &str, item_id: &str) -> Option<Item> {
        self.rows.read().get(&Self::key(org_id, item_id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Make every write touching `item_id` fail with a transient error
    pub fn fail_writes_for(&self, item_id: &str) {
        self.faults.write().failing_writes.insert(item_id.to_string());
    }

    pub fn fail_scans(&self, fail: bool) {
        self.faults.write().fail_scans = fail;
    }

    /// Let `successful` scan calls through, then fail every later one
    pub fn fail_scans_after(&self, successful: usize) {
        self.faults.write().scans_before_failure = Some(successful);
    }

    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    fn check_write(&self, item_id: &str) -> Result<()> {
        if self.faults.read().failing_writes.contains(item_id) {
            return Err(BoardError::dynamo(format!(
                "simulated write failure for {}",
                item_id
            )));
        }
        Ok(())
    }

    fn paginate(items: Vec<Item>, limit: i32, cursor: Option<PageCursor>) -> ItemPage {
        let offset = cursor
            .and_then(|c| c.0.get("offset").and_then(|o| o.parse::<usize>().ok()))
            .unwrap_or(0);
        let limit = limit.max(1) as usize;
        let end = (offset + limit).min(items.len());
        let next = if end < items.len() {
            Some(PageCursor(BTreeMap::from([(
                "offset".to_string(),
                end.to_string(),
            )])))
        } else {
            None
        };
        ItemPage {
            items: items.into_iter().skip(offset).take(limit).collect(),
            skipped: 0,
            next,
        }
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn get(&self, org_id: &str, item_id: &str) -> Result<Option<Item>> {
        Ok(self.snapshot(org_id, item_id))
    }

    async fn put_new(&self, item: &Item) -> Result<()> {
        self.check_write(&item.item_id)?;
        let key = Self::key(&item.org_id, &item.item_id);
        let mut rows = self.rows.write();
        if rows.contains_key(&key) {
            return Err(BoardError::conflict(format!(
                "item {} already exists in {}",
                item.item_id, item.org_id
            )));
        }
        rows.insert(key, item.clone());
        Ok(())
    }

    async fn replace(&self, item: &Item) -> Result<()> {
        self.check_write(&item.item_id)?;
        let key = Self::key(&item.org_id, &item.item_id);
        let mut rows = self.rows.write();
        match rows.get(&key) {
            Some(existing) if !existing.is_archived() => {
                rows.insert(key, item.clone());
                Ok(())
            }
            _ => Err(BoardError::conflict(format!(
                "item {} is missing or archived",
                item.item_id
            ))),
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
        self.check_write(item_id)?;
        let mut rows = self.rows.write();
        let Some(item) = rows.get_mut(&Self::key(org_id, item_id)) else {
            return Ok(ArchiveOutcome::AlreadyArchived);
        };
        let ItemKind::Task(task) = &mut item.kind else {
            return Err(BoardError::invalid_request(format!(
                "item {} is not a task",
                item_id
            )));
        };
        if task.archived.is_some()
            || (guard == ArchiveGuard::Scheduled && task.auto_archive_at.is_none())
        {
            return Ok(ArchiveOutcome::AlreadyArchived);
        }
        task.archived = Some(Archived { at, status });
        task.auto_archive_at = None;
        item.updated_at = at;
        Ok(ArchiveOutcome::Archived)
    }

    async fn delete_unarchived(
        &self,
        org_id: &str,
        item_id: &str,
        guard: DeleteGuard,
    ) -> Result<DeleteOutcome> {
        self.check_write(item_id)?;
        let key = Self::key(org_id, item_id);
        let mut rows = self.rows.write();
        let allowed = |item: &Item| match guard {
            DeleteGuard::Unarchived => !item.is_archived(),
            DeleteGuard::OverdueUnstarted { now } => is_overdue_unstarted(item, now),
        };
        match rows.get(&key) {
            Some(item) if allowed(item) => {
                rows.remove(&key);
                Ok(DeleteOutcome::Deleted)
            }
            _ => Ok(DeleteOutcome::Skipped),
        }
    }

    async fn scan_page(
        &self,
        sweep: Sweep,
        now: DateTime<Utc>,
        cursor: Option<PageCursor>,
    ) -> Result<ItemPage> {
        {
            let mut faults = self.faults.write();
            if faults.fail_scans {
                return Err(BoardError::dynamo("simulated scan failure"));
            }
            if let Some(remaining) = faults.scans_before_failure.as_mut() {
                if *remaining == 0 {
                    return Err(BoardError::dynamo("simulated scan failure"));
                }
                *remaining -= 1;
            }
        }

        let start = cursor.and_then(|c| {
            Some((c.0.get(ATTR_PK)?.clone(), c.0.get(ATTR_SK)?.clone()))
        });
        let rows = self.rows.read();
        let examined: Vec<(&RowKey, &Item)> = rows
            .iter()
            .filter(|(key, _)| start.as_ref().map(|s| *key > s).unwrap_or(true))
            .take(self.page_size)
            .collect();

        let items = examined
            .iter()
            .filter(|(_, item)| match sweep {
                Sweep::ArchiveDue => is_archive_due(item, now),
                Sweep::OverdueUnstarted => is_overdue_unstarted(item, now),
            })
            .map(|(_, item)| (*item).clone())
            .collect();

        let next = match examined.last() {
            Some(((pk, sk), _)) if examined.len() == self.page_size => {
                let more = rows.keys().any(|k| k > &(pk.clone(), sk.clone()));
                more.then(|| {
                    PageCursor(BTreeMap::from([
                        (ATTR_PK.to_string(), pk.clone()),
                        (ATTR_SK.to_string(), sk.clone()),
                    ]))
                })
            }
            _ => None,
        };

        Ok(ItemPage {
            items,
            skipped: 0,
            next,
        })
    }

    async fn user_feed(
        &self,
        user_id: &str,
        limit: i32,
        cursor: Option<PageCursor>,
    ) -> Result<ItemPage> {
        let mut items: Vec<Item> = self
            .rows
            .read()
            .values()
            .filter(|item| item.owner_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(Self::paginate(items, limit, cursor))
    }

    async fn global_feed(&self, limit: i32, cursor: Option<PageCursor>) -> Result<ItemPage> {
        let mut items: Vec<Item> = self.rows.read().values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Self::paginate(items, limit, cursor))
    }
}
