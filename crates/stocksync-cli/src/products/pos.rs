use anyhow::bail;
use stocksync_batch::{fetch_all_pages, run_batch, ItemOutcome, ProgressTracker};
use stocksync_shopify::{Collection, Product, ShopifyClient};

use crate::context::{print_report, CheckpointArgs, ItemError, JobContext};

const GLOBAL_SCOPE: &str = "global";

/// Case-insensitive title lookup over smart and custom collections.
fn find_collection<'a>(collections: &'a [Collection], title: &str) -> Option<&'a Collection> {
    let wanted = title.trim();
    collections.iter().find(|c| c.title.trim().eq_ignore_ascii_case(wanted))
}

/// Publish every product of the collection titled `title` to all sales
/// channels, which makes it sellable from the Shopify POS.
///
/// # Errors
///
/// Returns an error if the collection does not exist, a listing fails after
/// retries, or the checkpoint cannot be written.
pub(crate) async fn run_enable_pos(
    ctx: &JobContext,
    title: &str,
    dry_run: bool,
    checkpoint: &CheckpointArgs,
) -> anyhow::Result<()> {
    let client = ctx.shopify()?;
    let client = &client;

    let collections = client.collections().await?;
    let Some(collection) = find_collection(&collections, title) else {
        let known: Vec<&str> = collections.iter().map(|c| c.title.as_str()).collect();
        bail!("no collection titled {title:?}; available: {}", known.join(", "));
    };
    let collection_id = collection.id;

    let products = fetch_all_pages(None, ctx.page_options(None), |cursor: Option<String>| async move {
        client.collection_products_page(collection_id, cursor.as_deref()).await
    })
    .await?;
    tracing::info!(collection = %collection.title, products = products.len(), "fetched collection");

    if dry_run {
        for product in &products {
            println!(
                "dry-run: would publish {} (scope {})",
                product.title,
                product.published_scope.as_deref().unwrap_or("-")
            );
        }
        return Ok(());
    }

    let run_id = checkpoint.resolve("enable-pos", &[collection_id.to_string().as_bytes()]);
    let tracker = ProgressTracker::open(&ctx.store, run_id.as_str(), checkpoint.fresh)?;

    let report = run_batch(
        &products,
        &ctx.batch_settings(),
        Some(tracker),
        |p: &Product| p.id.to_string(),
        move |p: &Product| {
            let product_id = p.id;
            let already = p.published_scope.as_deref() == Some(GLOBAL_SCOPE);
            async move { publish(client, product_id, already).await }
        },
    )
    .await?;

    print_report("enable-pos", &report);
    Ok(())
}

async fn publish(client: &ShopifyClient, product_id: u64, already: bool) -> Result<ItemOutcome, ItemError> {
    if already {
        return Ok(ItemOutcome::Unchanged);
    }
    let product = client.publish_product(product_id).await?;
    let scope = product.published_scope.unwrap_or_default();
    if scope != GLOBAL_SCOPE {
        return Err(ItemError::Verification {
            expected: GLOBAL_SCOPE.to_owned(),
            actual: scope,
        });
    }
    Ok(ItemOutcome::Updated)
}
