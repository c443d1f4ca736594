//! Square to Shopify reconciliation: `inventory sync-square` and
//! `inventory compare` share one matching pass.

use stocksync_batch::{run_batch, ItemOutcome, ProgressTracker};
use stocksync_core::{match_product, match_variant, MatchRule};
use stocksync_shopify::{Product, ShopifyClient};

use crate::catalog::{shopify_products, SquareSnapshot};
use crate::context::{print_report, CheckpointArgs, ItemError, JobContext};

/// One Shopify variant whose stock differs from its Square variation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LevelUpdate {
    pub variation_id: String,
    pub product_title: String,
    pub variant_title: String,
    pub variant_id: u64,
    pub inventory_item_id: Option<u64>,
    pub shopify_quantity: Option<i64>,
    pub square_quantity: i64,
    pub rule: MatchRule,
}

/// Checkpoint key. Carries the target quantity so a variation whose Square
/// stock moved since a finished attempt is pushed again.
pub(crate) fn update_key(update: &LevelUpdate) -> String {
    format!("{}:{}", update.variation_id, update.square_quantity)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnmatchedItem {
    pub name: String,
    pub skus: Vec<String>,
    pub total: i64,
}

#[derive(Debug, Default)]
pub(crate) struct Reconciliation {
    pub updates: Vec<LevelUpdate>,
    pub unmatched: Vec<UnmatchedItem>,
    /// `(product title, Square variation name)` with no Shopify variant.
    pub missing_variants: Vec<(String, String)>,
    pub in_sync: usize,
}

/// Matches every in-stock Square item to a Shopify product and each
/// in-stock variation to a variant of it.
pub(crate) fn reconcile(snapshot: &SquareSnapshot, products: &[Product]) -> Reconciliation {
    let mut out = Reconciliation::default();

    for item in snapshot.in_stock() {
        let (Some(data), Some(source)) = (item.item_data.as_ref(), item.to_source_item()) else {
            continue;
        };

        let Some(found) = match_product(&source, products) else {
            tracing::debug!(item = %data.name, "no Shopify match");
            out.unmatched.push(UnmatchedItem {
                name: data.name.clone(),
                skus: source.skus.clone(),
                total: data.variations.iter().map(|v| snapshot.quantity(&v.id)).sum(),
            });
            continue;
        };
        let product = found.target;

        for variation in &data.variations {
            let square_quantity = snapshot.quantity(&variation.id);
            if square_quantity <= 0 {
                continue;
            }
            let Some(vdata) = variation.item_variation_data.as_ref() else {
                continue;
            };
            let name = vdata.name.as_deref().unwrap_or_default();
            let index = match_variant(
                vdata.sku.as_deref(),
                name,
                product.variants.iter().map(|v| (v.sku.as_deref(), v.title.as_str())),
            );
            let Some(variant) = index.map(|i| &product.variants[i]) else {
                out.missing_variants.push((product.title.clone(), name.to_owned()));
                continue;
            };

            if variant.inventory_quantity == Some(square_quantity) {
                out.in_sync += 1;
                continue;
            }
            out.updates.push(LevelUpdate {
                variation_id: variation.id.clone(),
                product_title: product.title.clone(),
                variant_title: variant.title.clone(),
                variant_id: variant.id,
                inventory_item_id: variant.inventory_item_id,
                shopify_quantity: variant.inventory_quantity,
                square_quantity,
                rule: found.rule,
            });
        }
    }

    out
}

/// Set each matched Shopify variant's level at `SHOPIFY_LOCATION_ID` to the
/// Square quantity at `SQUARE_LOCATION_ID`.
///
/// # Errors
///
/// Returns an error if a location id or credential is missing, a catalog
/// read fails after retries, or the checkpoint cannot be written.
pub(crate) async fn run_sync_square(
    ctx: &JobContext,
    dry_run: bool,
    checkpoint: &CheckpointArgs,
) -> anyhow::Result<()> {
    let shopify_location = ctx.shopify_location_id()?;
    let square_location = ctx.square_location_id()?;
    let shopify = ctx.shopify()?;
    let square = ctx.square()?;

    let snapshot = SquareSnapshot::load(ctx, &square, square_location).await?;
    let products = shopify_products(ctx, &shopify, None).await?;
    let plan = reconcile(&snapshot, &products);

    println!(
        "sync-square: {} to update, {} already in sync, {} unmatched items, {} unmatched variations",
        plan.updates.len(),
        plan.in_sync,
        plan.unmatched.len(),
        plan.missing_variants.len()
    );

    if dry_run {
        for update in &plan.updates {
            println!(
                "dry-run: would set {} / {} from {:?} to {} (matched by {})",
                update.product_title,
                update.variant_title,
                update.shopify_quantity,
                update.square_quantity,
                update.rule
            );
        }
        return Ok(());
    }

    let run_id = checkpoint.resolve(
        "sync-square",
        &[square_location.as_bytes(), shopify_location.to_string().as_bytes()],
    );
    let tracker = ProgressTracker::open(&ctx.store, run_id.as_str(), checkpoint.fresh)?;
    let shopify = &shopify;

    let report = run_batch(
        &plan.updates,
        &ctx.batch_settings(),
        Some(tracker),
        update_key,
        move |u: &LevelUpdate| {
            let update = u.clone();
            async move { push_level(shopify, shopify_location, &update).await }
        },
    )
    .await?;

    print_report("sync-square", &report);
    Ok(())
}

async fn push_level(
    client: &ShopifyClient,
    location_id: u64,
    update: &LevelUpdate,
) -> Result<ItemOutcome, ItemError> {
    let inventory_item_id = match update.inventory_item_id {
        Some(id) => id,
        None => client
            .variant(update.variant_id)
            .await?
            .inventory_item_id
            .ok_or_else(|| {
                ItemError::Unexpected(format!("variant {} has no inventory item", update.variant_id))
            })?,
    };

    let level = client
        .set_inventory_level(location_id, inventory_item_id, update.square_quantity)
        .await?;
    if level.available != Some(update.square_quantity) {
        return Err(ItemError::Verification {
            expected: update.square_quantity.to_string(),
            actual: format!("{:?}", level.available),
        });
    }
    Ok(ItemOutcome::Updated)
}

/// Report what `sync-square` would change plus Square items with stock
/// that have no Shopify product at all. Read-only.
///
/// # Errors
///
/// Returns an error if a location id or credential is missing or a catalog
/// read fails after retries.
pub(crate) async fn run_compare(ctx: &JobContext) -> anyhow::Result<()> {
    let square_location = ctx.square_location_id()?;
    let shopify = ctx.shopify()?;
    let square = ctx.square()?;

    let snapshot = SquareSnapshot::load(ctx, &square, square_location).await?;
    let products = shopify_products(ctx, &shopify, None).await?;
    let plan = reconcile(&snapshot, &products);

    if !plan.unmatched.is_empty() {
        println!("Square items with stock missing from Shopify:");
        for item in &plan.unmatched {
            println!("  {} (qty {}) skus: [{}]", item.name, item.total, item.skus.join(", "));
        }
    }
    if !plan.updates.is_empty() {
        println!("Quantity mismatches:");
        for u in &plan.updates {
            let shopify_qty = u.shopify_quantity.map_or_else(|| "-".to_owned(), |q| q.to_string());
            println!(
                "  {} / {}: Square {} vs Shopify {shopify_qty}",
                u.product_title, u.variant_title, u.square_quantity
            );
        }
    }
    if !plan.missing_variants.is_empty() {
        println!("Square variations with no Shopify variant:");
        for (product, variation) in &plan.missing_variants {
            println!("  {product} / {variation}");
        }
    }

    println!(
        "compare: {} in-stock Square items, {} missing from Shopify, {} mismatched, {} in sync",
        snapshot.in_stock().count(),
        plan.unmatched.len(),
        plan.updates.len(),
        plan.in_sync
    );
    Ok(())
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
