//! Per-variant settings applied across the whole catalog.

use stocksync_batch::{run_batch, BatchSettings, ItemOutcome, ProgressTracker};
use stocksync_shopify::{Product, ShopifyClient, Variant, VariantUpdate};

use crate::catalog::shopify_products;
use crate::context::{print_report, CheckpointArgs, ItemError, JobContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VariantFix {
    /// `inventory_management = "shopify"`, overselling denied.
    Tracking,
    Tax,
}

impl VariantFix {
    fn job(self) -> &'static str {
        match self {
            VariantFix::Tracking => "enable-tracking",
            VariantFix::Tax => "enable-tax",
        }
    }

    fn is_applied(self, variant: &Variant) -> bool {
        match self {
            VariantFix::Tracking => variant.is_tracked(),
            VariantFix::Tax => variant.is_taxable(),
        }
    }

    fn update(self, variant_id: u64) -> VariantUpdate {
        match self {
            VariantFix::Tracking => VariantUpdate::enable_tracking(variant_id),
            VariantFix::Tax => VariantUpdate::enable_tax(variant_id),
        }
    }
}

/// One product's `PUT`. `updates` names every variant of the product,
/// since Shopify deletes variants left out of the array.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProductFix {
    product_id: u64,
    title: String,
    updates: Vec<VariantUpdate>,
    /// Variants that actually change.
    pending: usize,
}

fn plan(fix: VariantFix, products: &[Product]) -> Vec<ProductFix> {
    products
        .iter()
        .filter_map(|product| {
            let pending = product.variants.iter().filter(|v| !fix.is_applied(v)).count();
            if pending == 0 {
                return None;
            }
            let updates = product
                .variants
                .iter()
                .map(|v| {
                    if fix.is_applied(v) {
                        VariantUpdate::keep(v.id)
                    } else {
                        fix.update(v.id)
                    }
                })
                .collect();
            Some(ProductFix {
                product_id: product.id,
                title: product.title.clone(),
                updates,
                pending,
            })
        })
        .collect()
}

/// Updates every product with a variant lacking `fix`, then re-reads the
/// product to confirm all of its variants have it.
///
/// # Errors
///
/// Returns an error if the catalog cannot be listed or the checkpoint cannot
/// be written. Per-product failures are reported.
pub(crate) async fn run_variant_fix(
    ctx: &JobContext,
    fix: VariantFix,
    concurrency: usize,
    dry_run: bool,
    checkpoint: &CheckpointArgs,
) -> anyhow::Result<()> {
    let client = ctx.shopify()?;
    let client = &client;
    let products = shopify_products(ctx, client, None).await?;
    let fixes = plan(fix, &products);
    let variant_count: usize = fixes.iter().map(|f| f.pending).sum();
    println!(
        "{}: {} products scanned, {} products ({variant_count} variants) need updating",
        fix.job(),
        products.len(),
        fixes.len()
    );

    if dry_run {
        for f in &fixes {
            println!("dry-run: would update {} variants of {}", f.pending, f.title);
        }
        return Ok(());
    }

    let run_id = checkpoint.resolve(fix.job(), &[ctx.config.shopify_shop_domain.as_bytes()]);
    let tracker = ProgressTracker::open(&ctx.store, run_id.as_str(), checkpoint.fresh)?;
    let settings = BatchSettings {
        concurrency: concurrency.max(1),
        ..ctx.batch_settings()
    };

    let report = run_batch(
        &fixes,
        &settings,
        Some(tracker),
        |f: &ProductFix| f.product_id.to_string(),
        move |f: &ProductFix| {
            let item = f.clone();
            async move { apply_fix(client, fix, &item).await }
        },
    )
    .await?;

    print_report(fix.job(), &report);
    Ok(())
}

async fn apply_fix(client: &ShopifyClient, fix: VariantFix, item: &ProductFix) -> Result<ItemOutcome, ItemError> {
    client.update_variants(item.product_id, &item.updates).await?;

    let refreshed = client.product(item.product_id).await?;
    if refreshed.variants.len() != item.updates.len() {
        return Err(ItemError::Verification {
            expected: format!("{} variants", item.updates.len()),
            actual: format!("{} variants", refreshed.variants.len()),
        });
    }
    if !refreshed.all_variants(|v| fix.is_applied(v)) {
        let applied = refreshed.variants.iter().filter(|v| fix.is_applied(v)).count();
        return Err(ItemError::Verification {
            expected: format!("all {} variants", refreshed.variants.len()),
            actual: format!("{applied}"),
        });
    }
    tracing::info!(product = %item.title, variants = item.pending, job = fix.job(), "variants updated");
    Ok(ItemOutcome::Updated)
}
