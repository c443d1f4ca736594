//! Paced, one-mutation-per-item execution.
//!
//! [`run_batch`] walks a list of items and applies a mutation to each,
//! sleeping `item_delay` between items, `failure_pause` after an item fails
//! and `batch_pause` between batches of `batch_size` items. Every mutation is
//! wrapped in the retry policy; an item whose retries run out is recorded as
//! failed and the run moves on.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::checkpoint::{CheckpointError, ProgressTracker};
use crate::retry::{retry_with_backoff, Retriable, RetryPolicy};

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub item_delay: Duration,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub failure_pause: Duration,
    /// Items mutated at the same time; groups are serialized.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(500),
            batch_size: 5,
            batch_pause: Duration::from_secs(30),
            failure_pause: Duration::from_secs(60),
            concurrency: 1,
            retry: RetryPolicy::exponential(3, Duration::from_secs(15)),
        }
    }
}

/// Result of a successful call to the mutation closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Updated,
    /// Already at the desired state; nothing was written.
    Unchanged,
    /// The target record does not exist (e.g. no variant for the SKU).
    NotFound,
}

impl ItemOutcome {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, ItemOutcome::Updated | ItemOutcome::Unchanged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

/// Counters for one run. `succeeded() + failed() == submitted` always holds;
/// items skipped via the checkpoint are not submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub submitted: usize,
    pub skipped: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub not_found: usize,
    pub errored: usize,
    pub failures: Vec<ItemFailure>,
    /// The checkpoint was deleted because nothing failed.
    pub checkpoint_cleared: bool,
}

impl BatchReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.updated.saturating_add(self.unchanged)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.not_found.saturating_add(self.errored)
    }

    fn tally(&mut self, id: &str, result: Result<ItemOutcome, String>) -> bool {
        self.submitted = self.submitted.saturating_add(1);
        match result {
            Ok(ItemOutcome::Updated) => self.updated = self.updated.saturating_add(1),
            Ok(ItemOutcome::Unchanged) => self.unchanged = self.unchanged.saturating_add(1),
            Ok(ItemOutcome::NotFound) => {
                self.not_found = self.not_found.saturating_add(1);
                self.failures.push(ItemFailure {
                    id: id.to_owned(),
                    reason: "not found".to_owned(),
                });
                return false;
            }
            Err(reason) => {
                self.errored = self.errored.saturating_add(1);
                self.failures.push(ItemFailure {
                    id: id.to_owned(),
                    reason,
                });
                return false;
            }
        }
        true
    }
}

/// Applies `op` to every item not already marked done in `tracker`.
///
/// `key` names an item for logging and checkpointing. The tracker is flushed
/// after every batch and finished at the end, which deletes the checkpoint
/// when nothing failed.
///
/// # Errors
///
/// Only checkpoint persistence errors abort the run; mutation errors are
/// counted in the report.
pub async fn run_batch<I, K, F, Fut, E>(
    items: &[I],
    settings: &BatchSettings,
    mut tracker: Option<ProgressTracker<'_>>,
    key: K,
    op: F,
) -> Result<BatchReport, CheckpointError>
where
    K: Fn(&I) -> String,
    F: Fn(&I) -> Fut,
    Fut: Future<Output = Result<ItemOutcome, E>>,
    E: Retriable + Display,
{
    let mut report = BatchReport::default();

    let mut pending: Vec<(String, &I)> = Vec::with_capacity(items.len());
    for item in items {
        let id = key(item);
        if tracker.as_ref().is_some_and(|t| t.is_done(&id)) {
            report.skipped = report.skipped.saturating_add(1);
            continue;
        }
        pending.push((id, item));
    }
    if report.skipped > 0 {
        tracing::info!(skipped = report.skipped, "skipping items completed in a previous run");
    }

    let total = pending.len();
    let batch_size = settings.batch_size.max(1);
    let concurrency = settings.concurrency.max(1);
    let batch_count = total.div_ceil(batch_size);
    let mut processed = 0usize;

    for (batch_idx, batch) in pending.chunks(batch_size).enumerate() {
        if batch_idx > 0 && !settings.batch_pause.is_zero() {
            tracing::info!(
                pause_ms = duration_ms(settings.batch_pause),
                "pausing between batches"
            );
            tokio::time::sleep(settings.batch_pause).await;
        }
        tracing::info!(batch = batch_idx + 1, of = batch_count, size = batch.len(), "processing batch");

        for (group_idx, group) in batch.chunks(concurrency).enumerate() {
            if group_idx > 0 && !settings.item_delay.is_zero() {
                tokio::time::sleep(settings.item_delay).await;
            }

            let results = futures::future::join_all(group.iter().map(|(id, item)| {
                let item: &I = item;
                let op = &op;
                async move {
                    retry_with_backoff(&settings.retry, || op(item))
                        .await
                        .map_err(|e| {
                            tracing::warn!(id = %id, error = %e, "item failed");
                            e.to_string()
                        })
                }
            }))
            .await;

            let mut group_failed = false;
            for ((id, _), result) in group.iter().zip(results) {
                if let Ok(outcome) = &result {
                    tracing::info!(id = %id, outcome = ?outcome, "item processed");
                }
                let ok = report.tally(id, result);
                if let Some(t) = tracker.as_mut() {
                    t.record(id, ok);
                }
                group_failed |= !ok;
            }
            processed += group.len();

            if group_failed && processed < total && !settings.failure_pause.is_zero() {
                tracing::warn!(
                    pause_ms = duration_ms(settings.failure_pause),
                    "pausing after failure"
                );
                tokio::time::sleep(settings.failure_pause).await;
            }
        }

        if let Some(t) = tracker.as_mut() {
            t.flush()?;
        }
    }

    if let Some(t) = tracker {
        report.checkpoint_cleared = t.finish()?;
    }

    tracing::info!(
        submitted = report.submitted,
        succeeded = report.succeeded(),
        failed = report.failed(),
        skipped = report.skipped,
        "batch run complete"
    );
    Ok(report)
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
#[path = "mutator_test.rs"]
mod tests;
