use std::path::Path;

use stocksync_batch::retry_with_backoff;
use stocksync_core::read_inventory_file;
use stocksync_shopify::ShopifyError;

use crate::context::JobContext;

#[derive(Debug, Default, PartialEq, Eq)]
struct VerifyTally {
    matched: usize,
    mismatched: usize,
    not_found: usize,
    errored: usize,
}

/// Print each SKU's current Shopify level next to its target. Read-only.
///
/// # Errors
///
/// Returns an error if the input cannot be read or the client cannot be
/// built. Lookup failures are printed and counted.
pub(crate) async fn run_inventory_verify(ctx: &JobContext, input: &Path) -> anyhow::Result<()> {
    let records = read_inventory_file(input)?;
    let client = ctx.shopify()?;
    let location_id = match ctx.config.shopify_location_id {
        Some(_) => Some(ctx.shopify_location_id()?),
        None => None,
    };
    let retry = ctx.fetch_retry();
    let item_delay = ctx.batch_settings().item_delay;

    let mut tally = VerifyTally::default();
    println!("{:<20} {:>8} {:>8}  status", "sku", "target", "current");

    for (index, record) in records.iter().enumerate() {
        if index > 0 && !item_delay.is_zero() {
            tokio::time::sleep(item_delay).await;
        }
        let lookup: Result<_, ShopifyError> =
            retry_with_backoff(&retry, || client.find_variant_by_sku(&record.sku)).await;
        match lookup {
            Ok(Some(variant)) => {
                let current = variant.level_at(location_id).map(|l| l.available);
                let status = if current == Some(record.quantity) {
                    tally.matched += 1;
                    "ok"
                } else {
                    tally.mismatched += 1;
                    "MISMATCH"
                };
                let current = current.map_or_else(|| "-".to_owned(), |q| q.to_string());
                println!("{:<20} {:>8} {:>8}  {status}", record.sku, record.quantity, current);
            }
            Ok(None) => {
                tally.not_found += 1;
                println!("{:<20} {:>8} {:>8}  NOT FOUND", record.sku, record.quantity, "-");
            }
            Err(e) => {
                tally.errored += 1;
                tracing::warn!(sku = %record.sku, error = %e, "lookup failed");
                println!("{:<20} {:>8} {:>8}  ERROR {e}", record.sku, record.quantity, "-");
            }
        }
    }

    println!(
        "verify: {} records, {} match, {} mismatch, {} not found, {} errors",
        records.len(),
        tally.matched,
        tally.mismatched,
        tally.not_found,
        tally.errored
    );
    Ok(())
}
