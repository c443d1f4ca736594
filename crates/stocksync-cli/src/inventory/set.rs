use std::path::Path;

use anyhow::Context;
use stocksync_batch::{run_batch, ItemOutcome, ProgressTracker};
use stocksync_core::{read_inventory_file, InventoryRecord};
use stocksync_shopify::{legacy_id, ShopifyClient};

use super::SetMode;
use crate::context::{print_report, CheckpointArgs, ItemError, JobContext};

/// Where and how a target quantity is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Writer {
    Absolute { location_id: u64 },
    /// Without a location the variant's first level is adjusted.
    Delta { location_id: Option<u64> },
}

impl Writer {
    fn location_id(self) -> Option<u64> {
        match self {
            Writer::Absolute { location_id } => Some(location_id),
            Writer::Delta { location_id } => location_id,
        }
    }
}

/// Apply a SKU batch file to Shopify, one SKU at a time.
///
/// Progress is checkpointed per SKU under a run id derived from the file
/// contents and mode, so re-running the same command after a crash or
/// partial failure only touches SKUs that have not succeeded yet.
///
/// # Errors
///
/// Returns an error if the input cannot be read, a required location id is
/// missing, or the checkpoint cannot be written. Per-SKU failures are
/// reported, not propagated.
pub(crate) async fn run_inventory_set(
    ctx: &JobContext,
    input: &Path,
    mode: SetMode,
    dry_run: bool,
    checkpoint: &CheckpointArgs,
) -> anyhow::Result<()> {
    let raw = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let records = read_inventory_file(input)?;
    if records.is_empty() {
        println!("no records in {}", input.display());
        return Ok(());
    }

    let writer = match mode {
        SetMode::Absolute => Writer::Absolute {
            location_id: ctx.shopify_location_id()?,
        },
        SetMode::Delta => Writer::Delta {
            location_id: ctx
                .config
                .shopify_location_id
                .is_some()
                .then(|| ctx.shopify_location_id())
                .transpose()?,
        },
    };

    let client = ctx.shopify()?;
    let client = &client;
    let run_id = checkpoint.resolve("inventory-set", &[&raw, mode.as_str().as_bytes()]);
    let tracker = if dry_run {
        None
    } else {
        Some(ProgressTracker::open(&ctx.store, run_id.as_str(), checkpoint.fresh)?)
    };

    tracing::info!(
        records = records.len(),
        mode = mode.as_str(),
        dry_run,
        run_id = %run_id,
        "applying inventory batch"
    );

    let report = run_batch(
        &records,
        &ctx.batch_settings(),
        tracker,
        |record: &InventoryRecord| record.sku.clone(),
        move |record: &InventoryRecord| {
            let sku = record.sku.clone();
            let target = record.quantity;
            async move { apply_target(client, &sku, target, writer, dry_run).await }
        },
    )
    .await?;

    let label = if dry_run { "inventory set (dry-run)" } else { "inventory set" };
    print_report(label, &report);
    Ok(())
}

/// Looks the SKU up and brings its level to `target`.
///
/// The current level is re-read on every attempt, so a retried delta
/// adjustment is recomputed rather than applied twice.
async fn apply_target(
    client: &ShopifyClient,
    sku: &str,
    target: i64,
    writer: Writer,
    dry_run: bool,
) -> Result<ItemOutcome, ItemError> {
    let Some(variant) = client.find_variant_by_sku(sku).await? else {
        tracing::warn!(sku, "no variant with this SKU");
        return Ok(ItemOutcome::NotFound);
    };

    let level = variant.level_at(writer.location_id());
    let current = level.map(|l| l.available);
    if current == Some(target) {
        tracing::debug!(sku, target, "already at target");
        return Ok(ItemOutcome::Unchanged);
    }

    if dry_run {
        tracing::info!(sku, ?current, target, "dry-run: would set level");
        return Ok(ItemOutcome::Updated);
    }

    match writer {
        Writer::Absolute { location_id } => {
            let item_id = legacy_id(&variant.inventory_item.id).ok_or_else(|| {
                ItemError::Unexpected(format!(
                    "unexpected inventory item id {:?}",
                    variant.inventory_item.id
                ))
            })?;
            let level = client
                .set_inventory_level(location_id, item_id, target)
                .await?;
            if level.available != Some(target) {
                return Err(ItemError::Verification {
                    expected: target.to_string(),
                    actual: format!("{:?}", level.available),
                });
            }
        }
        Writer::Delta { .. } => {
            let Some(level) = level else {
                tracing::warn!(sku, "variant is not stocked at the location");
                return Ok(ItemOutcome::NotFound);
            };
            let result = client.adjust_inventory(level, target - level.available).await?;
            if !result.is_verified() {
                return Err(ItemError::Verification {
                    expected: result.expected.to_string(),
                    actual: result.available.to_string(),
                });
            }
        }
    }

    tracing::info!(sku, ?current, target, "level set");
    Ok(ItemOutcome::Updated)
}
