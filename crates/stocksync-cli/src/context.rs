//! Shared per-run state: configuration, client construction, pacing and
//! checkpoint settings derived from it.

use std::time::Duration;

use anyhow::Context;
use clap::Args;
use sha2::{Digest, Sha256};
use stocksync_batch::{BatchReport, BatchSettings, FileCheckpointStore, PageOptions, RetryPolicy, Retriable};
use stocksync_core::AppConfig;
use stocksync_shopify::{ShopifyClient, ShopifyError};
use stocksync_square::{SquareClient, SquareError};

/// Flags shared by every checkpointed command.
#[derive(Debug, Clone, Default, Args)]
pub struct CheckpointArgs {
    /// Checkpoint name; defaults to one derived from the job and its inputs
    #[arg(long)]
    pub run_id: Option<String>,
    /// Ignore and discard any existing checkpoint
    #[arg(long)]
    pub fresh: bool,
}

impl CheckpointArgs {
    pub(crate) fn resolve(&self, job: &str, inputs: &[&[u8]]) -> String {
        self.run_id.clone().unwrap_or_else(|| derive_run_id(job, inputs))
    }
}

/// `<job>-<first 12 hex chars of sha256(job, inputs)>`.
pub(crate) fn derive_run_id(job: &str, inputs: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job.as_bytes());
    for input in inputs {
        hasher.update([0u8]);
        hasher.update(input);
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{job}-{}", &digest[..12])
}

pub(crate) struct JobContext {
    pub config: AppConfig,
    pub store: FileCheckpointStore,
}

impl JobContext {
    pub(crate) fn new(config: AppConfig) -> Self {
        let store = FileCheckpointStore::new(config.checkpoint_dir.clone());
        Self { config, store }
    }

    /// Context against a mock Shopify origin with no pacing delays.
    #[cfg(test)]
    pub(crate) fn for_tests(shopify_origin: &str, checkpoint_dir: &std::path::Path) -> Self {
        Self::new(AppConfig {
            shopify_access_token: "shpat_test".to_owned(),
            shopify_shop_domain: shopify_origin.to_owned(),
            shopify_api_version: "2024-01".to_owned(),
            shopify_location_id: None,
            square_access_token: None,
            square_location_id: None,
            square_environment: stocksync_core::SquareEnvironment::Sandbox,
            log_level: "info".to_owned(),
            request_timeout_secs: 5,
            user_agent: "stocksync-test".to_owned(),
            max_retries: 0,
            retry_backoff_base_ms: 1,
            rate_limit_wait_ms: 1,
            fetch_max_retries: 0,
            page_delay_ms: 0,
            item_delay_ms: 0,
            batch_size: 5,
            batch_pause_ms: 0,
            failure_pause_ms: 0,
            checkpoint_dir: checkpoint_dir.to_path_buf(),
        })
    }

    pub(crate) fn shopify(&self) -> anyhow::Result<ShopifyClient> {
        ShopifyClient::new(&self.config).context("failed to build Shopify client")
    }

    pub(crate) fn square(&self) -> anyhow::Result<SquareClient> {
        SquareClient::new(&self.config).context("failed to build Square client")
    }

    /// `SHOPIFY_LOCATION_ID` as the numeric id REST expects.
    pub(crate) fn shopify_location_id(&self) -> anyhow::Result<u64> {
        let raw = self
            .config
            .shopify_location_id
            .as_deref()
            .context("SHOPIFY_LOCATION_ID is required for this command (see `stocksync locations`)")?;
        raw.trim()
            .parse()
            .with_context(|| format!("SHOPIFY_LOCATION_ID must be a numeric id, got {raw:?}"))
    }

    pub(crate) fn square_location_id(&self) -> anyhow::Result<&str> {
        self.config
            .square_location_id
            .as_deref()
            .context("SQUARE_LOCATION_ID is required for this command (see `stocksync locations`)")
    }

    /// Pacing and retry for mutation loops.
    pub(crate) fn batch_settings(&self) -> BatchSettings {
        let c = &self.config;
        BatchSettings {
            item_delay: Duration::from_millis(c.item_delay_ms),
            batch_size: c.batch_size,
            batch_pause: Duration::from_millis(c.batch_pause_ms),
            failure_pause: Duration::from_millis(c.failure_pause_ms),
            concurrency: 1,
            retry: self.mutation_retry(),
        }
    }

    pub(crate) fn mutation_retry(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.config.max_retries,
            Duration::from_millis(self.config.retry_backoff_base_ms),
        )
    }

    /// Pagination for reads: fixed wait on 429, optional page cap.
    pub(crate) fn page_options(&self, max_pages: Option<usize>) -> PageOptions {
        PageOptions {
            max_pages,
            page_delay: Duration::from_millis(self.config.page_delay_ms),
            retry: self.fetch_retry(),
        }
    }

    pub(crate) fn fetch_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.config.fetch_max_retries,
            Duration::from_millis(self.config.rate_limit_wait_ms),
        )
    }
}

/// Per-item failure of a job. Wraps client errors so a job can combine
/// lookups and writes, and adds the post-write verification failure.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ItemError {
    #[error(transparent)]
    Shopify(#[from] ShopifyError),

    #[error(transparent)]
    Square(#[from] SquareError),

    /// A create whose outcome is unknown; repeating it could duplicate the
    /// record.
    #[error("outcome unknown, not retried: {0}")]
    Unconfirmed(#[source] ShopifyError),

    #[error("verification failed: expected {expected}, found {actual}")]
    Verification { expected: String, actual: String },

    #[error("{0}")]
    Unexpected(String),
}

impl Retriable for ItemError {
    fn is_retriable(&self) -> bool {
        match self {
            ItemError::Shopify(e) => e.is_retriable(),
            ItemError::Square(e) => e.is_retriable(),
            ItemError::Unconfirmed(_) | ItemError::Verification { .. } | ItemError::Unexpected(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ItemError::Shopify(e) => e.retry_after(),
            ItemError::Square(e) => e.retry_after(),
            ItemError::Unconfirmed(_) | ItemError::Verification { .. } | ItemError::Unexpected(_) => None,
        }
    }
}

/// Prints the closing summary of a mutation run.
pub(crate) fn print_report(job: &str, report: &BatchReport) {
    println!(
        "{job}: {} submitted, {} updated, {} unchanged, {} not found, {} failed, {} skipped (already done)",
        report.submitted,
        report.updated,
        report.unchanged,
        report.not_found,
        report.errored,
        report.skipped,
    );
    for failure in &report.failures {
        println!("  failed {}: {}", failure.id, failure.reason);
    }
    if report.failed() > 0 {
        println!("checkpoint kept; re-run the same command to retry failed items");
    }
}
