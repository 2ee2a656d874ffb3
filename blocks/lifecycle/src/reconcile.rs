use std::sync::Arc;
use std::time::Duration;

use board_atoms::archive::{calculate_archive_status, is_archive_due, is_overdue_unstarted};
use board_atoms::events::{DeletionReason, EventKind, EventQueue, NotificationEvent};
use board_atoms::items::{
    ArchiveGuard, ArchiveOutcome, DeleteGuard, DeleteOutcome, Item, ItemStore, PageCursor, Sweep,
};
use board_atoms::Result;
use board_shared::AppConfig;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::summary::SweepSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Candidates handled in parallel within one page
    pub concurrency: usize,
    /// Wall-clock budget after which no further pages are fetched
    pub budget: Duration,
}

impl ReconcileSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            concurrency: config.sweep_concurrency.max(1),
            budget: config.job_budget,
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Periodic sweep over the item table.
///
/// Part A archives completed tasks whose `autoArchiveAt` has elapsed. Part B
/// deletes pending tasks past their deadline, enqueueing `TASK_DELETED` for the
/// owner before the row is removed. Both parts are safe to run concurrently
/// with another invocation: every write is conditional, so a lost race is a
/// no-op rather than an error. A crash between enqueue and delete leaves the
/// row in place and the next run notifies again; duplicates are accepted.
pub struct Reconciler {
    store: Arc<dyn ItemStore>,
    queue: Arc<dyn EventQueue>,
    settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ItemStore>,
        queue: Arc<dyn EventQueue>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            queue,
            settings,
        }
    }

    /// Run both sweeps. Only a failure of the run's first scan call is an
    /// error. A scan failing after that ends its sweep early with
    /// `complete: false`; per-item failures are counted in the summary.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepSummary> {
        let started = Instant::now();
        let mut summary = SweepSummary::new(now);
        let mut scanned = false;

        tracing::info!(now = %now, "Reconciliation started");

        self.sweep(Sweep::ArchiveDue, now, started, &mut scanned, &mut summary)
            .await?;
        self.sweep(Sweep::OverdueUnstarted, now, started, &mut scanned, &mut summary)
            .await?;

        tracing::info!(
            archived = summary.archived_count,
            deleted = summary.deleted_count,
            errors = summary.error_count,
            complete = summary.complete,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconciliation finished"
        );
        Ok(summary)
    }

    async fn sweep(
        &self,
        sweep: Sweep,
        now: DateTime<Utc>,
        started: Instant,
        scanned: &mut bool,
        summary: &mut SweepSummary,
    ) -> Result<()> {
        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0usize;

        loop {
            if started.elapsed() >= self.settings.budget {
                tracing::warn!(?sweep, pages, "Job budget exhausted, stopping early");
                summary.complete = false;
                return Ok(());
            }

            let page = match self.store.scan_page(sweep, now, cursor.take()).await {
                Ok(page) => page,
                Err(e) if !*scanned => {
                    tracing::error!(?sweep, error = %e, "Initial scan failed");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(?sweep, pages, error = %e, "Scan failed mid-run, keeping partial counts");
                    summary.error_count += 1;
                    summary.complete = false;
                    return Ok(());
                }
            };
            *scanned = true;
            pages += 1;

            if page.skipped > 0 {
                tracing::warn!(?sweep, skipped = page.skipped, "Undecodable rows in scan page");
                summary.error_count += page.skipped;
            }

            // Narrow again with the typed predicates; this can only drop rows
            // the string-compared filter let through, never recover ones it missed
            let candidates: Vec<Item> = page
                .items
                .into_iter()
                .filter(|item| match sweep {
                    Sweep::ArchiveDue => is_archive_due(item, now),
                    Sweep::OverdueUnstarted => is_overdue_unstarted(item, now),
                })
                .collect();

            let results: Vec<(Item, Result<bool>)> = stream::iter(candidates)
                .map(move |item| async move {
                    let result = match sweep {
                        Sweep::ArchiveDue => self.archive_one(&item, now).await,
                        Sweep::OverdueUnstarted => self.delete_one(&item, now).await,
                    };
                    (item, result)
                })
                .buffer_unordered(self.settings.concurrency.max(1))
                .collect()
                .await;

            for (item, result) in results {
                match result {
                    Ok(true) => match sweep {
                        Sweep::ArchiveDue => summary.archived_count += 1,
                        Sweep::OverdueUnstarted => summary.deleted_count += 1,
                    },
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(
                            ?sweep,
                            org_id = %item.org_id,
                            item_id = %item.item_id,
                            error = %e,
                            "Failed to reconcile item"
                        );
                        summary.error_count += 1;
                    }
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
    }

    /// True when this run performed the transition
    async fn archive_one(&self, item: &Item, now: DateTime<Utc>) -> Result<bool> {
        let status = calculate_archive_status(item);
        let outcome = self
            .store
            .archive(
                &item.org_id,
                &item.item_id,
                status,
                now,
                ArchiveGuard::Scheduled,
            )
            .await?;

        match outcome {
            ArchiveOutcome::Archived => {
                tracing::info!(
                    org_id = %item.org_id,
                    item_id = %item.item_id,
                    status = status.as_str(),
                    "Auto-archived task"
                );
                Ok(true)
            }
            ArchiveOutcome::AlreadyArchived => {
                tracing::debug!(item_id = %item.item_id, "Already archived, skipping");
                Ok(false)
            }
        }
    }

    async fn delete_one(&self, item: &Item, now: DateTime<Utc>) -> Result<bool> {
        let deadline = item.task().and_then(|task| task.deadline);
        let event = NotificationEvent::new(
            EventKind::TaskDeleted {
                reason: DeletionReason::OverdueInactive,
                deadline,
            },
            &item.owner_id,
            &item.title,
        )
        .for_item(&item.org_id, &item.item_id);

        // Notify first: a failed enqueue leaves the row for the next run. The
        // reverse gap is accepted: a crash after enqueue duplicates the notice,
        // and a delete skipped below leaves a notice for a task that survived.
        self.queue.enqueue(&event).await?;

        match self
            .store
            .delete_unarchived(
                &item.org_id,
                &item.item_id,
                DeleteGuard::OverdueUnstarted { now },
            )
            .await?
        {
            DeleteOutcome::Deleted => {
                tracing::info!(
                    org_id = %item.org_id,
                    item_id = %item.item_id,
                    owner_id = %item.owner_id,
                    "Deleted overdue pending task"
                );
                Ok(true)
            }
            DeleteOutcome::Skipped => {
                tracing::warn!(
                    org_id = %item.org_id,
                    item_id = %item.item_id,
                    owner_id = %item.owner_id,
                    "Task changed or vanished before delete; deletion notice already queued"
                );
                Ok(false)
            }
        }
    }
}
