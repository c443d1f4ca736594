use anyhow::Context;
use stocksync_batch::{retry_with_backoff, run_batch, ItemOutcome, ProgressTracker};
use stocksync_shopify::{SaleProduct, ShopifyClient};

use crate::context::{print_report, CheckpointArgs, ItemError, JobContext};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SaleVariantRef {
    id: String,
    label: String,
    price: String,
    compare_at_price: String,
}

fn on_sale(products: &[SaleProduct]) -> Vec<SaleVariantRef> {
    products
        .iter()
        .flat_map(|product| {
            product.variants.nodes().filter_map(move |v| {
                let compare_at = v.compare_at_price.as_deref().filter(|p| !p.trim().is_empty())?;
                Some(SaleVariantRef {
                    id: v.id.clone(),
                    label: format!("{} / {}", product.title, v.title),
                    price: v.price.clone().unwrap_or_default(),
                    compare_at_price: compare_at.to_owned(),
                })
            })
        })
        .collect()
}

/// Clear the compare-at price of every variant in the collection titled
/// `title`, leaving the current price as the regular price.
///
/// # Errors
///
/// Returns an error if the collection does not exist, the lookup fails, or
/// the checkpoint cannot be written.
pub(crate) async fn run_clear_sale_prices(
    ctx: &JobContext,
    title: &str,
    dry_run: bool,
    checkpoint: &CheckpointArgs,
) -> anyhow::Result<()> {
    let client = ctx.shopify()?;
    let client = &client;

    let products = retry_with_backoff(&ctx.fetch_retry(), || {
        client.collection_sale_products(title)
    })
    .await?
    .with_context(|| format!("no collection titled {title:?}"))?;

    let variants = on_sale(&products);
    println!(
        "clear-sale-prices: {} products in {title:?}, {} variants with a compare-at price",
        products.len(),
        variants.len()
    );

    if dry_run {
        for v in &variants {
            println!("dry-run: {} {} (was {})", v.label, v.price, v.compare_at_price);
        }
        return Ok(());
    }

    let run_id = checkpoint.resolve("clear-sale-prices", &[title.as_bytes()]);
    let tracker = ProgressTracker::open(&ctx.store, run_id.as_str(), checkpoint.fresh)?;

    let report = run_batch(
        &variants,
        &ctx.batch_settings(),
        Some(tracker),
        |v: &SaleVariantRef| v.id.clone(),
        move |v: &SaleVariantRef| {
            let variant = v.clone();
            async move { clear(client, &variant).await }
        },
    )
    .await?;

    print_report("clear-sale-prices", &report);
    Ok(())
}

async fn clear(client: &ShopifyClient, variant: &SaleVariantRef) -> Result<ItemOutcome, ItemError> {
    client.clear_compare_at_price(&variant.id).await?;
    tracing::info!(variant = %variant.label, price = %variant.price, "sale price removed");
    Ok(ItemOutcome::Updated)
}
