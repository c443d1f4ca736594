//! `products import-square`: Square items with stock that have no Shopify
//! counterpart become new Shopify products.

use std::collections::HashSet;

use stocksync_batch::{run_batch, ItemOutcome, ProgressTracker, Retriable};
use stocksync_core::match_product;
use stocksync_shopify::{NewOption, NewProduct, NewVariant, ShopifyClient, ShopifyError};
use stocksync_square::CatalogObject;

use crate::catalog::{shopify_products, SquareSnapshot};
use crate::context::{print_report, CheckpointArgs, ItemError, JobContext};

const VENDOR: &str = "Square Import";
const FALLBACK_PRODUCT_TYPE: &str = "Apparel";
const IMPORT_TAGS: &str = "Square Import, POS Enabled";
const OPTION_NAME: &str = "Size";
const DEFAULT_OPTION_VALUE: &str = "Default";

#[derive(Debug, Clone)]
struct ImportItem {
    square_id: String,
    product: NewProduct,
}

/// Shopify product for one Square item. Variations without variation data
/// are skipped, and a repeated variation name keeps only its first
/// variation since Shopify rejects duplicate option values.
fn new_product(item: &CatalogObject, snapshot: &SquareSnapshot) -> Option<NewProduct> {
    let data = item.item_data.as_ref()?;

    let mut seen = HashSet::new();
    let mut variants = Vec::new();
    for variation in &data.variations {
        let Some(vdata) = variation.item_variation_data.as_ref() else {
            continue;
        };
        let option = vdata
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_OPTION_VALUE)
            .to_owned();
        if !seen.insert(option.clone()) {
            tracing::warn!(item = %data.name, option = %option, "duplicate variation name, skipped");
            continue;
        }
        let sku = vdata.sku.as_deref().map(str::trim).unwrap_or_default().to_owned();
        variants.push(NewVariant {
            option1: option,
            price: vdata
                .price_money
                .map_or_else(|| "0.00".to_owned(), |m| m.to_decimal_string()),
            barcode: sku.clone(),
            sku,
            inventory_management: "shopify".to_owned(),
            inventory_quantity: snapshot.quantity(&variation.id).max(0),
            inventory_policy: "deny".to_owned(),
            requires_shipping: true,
            taxable: true,
        });
    }
    if variants.is_empty() {
        return None;
    }

    Some(NewProduct {
        title: data.name.trim().to_owned(),
        body_html: data.description.clone().unwrap_or_default(),
        vendor: VENDOR.to_owned(),
        product_type: snapshot
            .category_name(data)
            .unwrap_or(FALLBACK_PRODUCT_TYPE)
            .to_owned(),
        tags: IMPORT_TAGS.to_owned(),
        status: "active".to_owned(),
        published: true,
        published_scope: "web".to_owned(),
        options: vec![NewOption {
            name: OPTION_NAME.to_owned(),
            values: variants.iter().map(|v| v.option1.clone()).collect(),
        }],
        variants,
    })
}

/// Create a Shopify product for every in-stock Square item at
/// `SQUARE_LOCATION_ID` that matches no existing Shopify product.
///
/// # Errors
///
/// Returns an error if a location id or credential is missing, a catalog
/// read fails after retries, or the checkpoint cannot be written.
pub(crate) async fn run_import_square(
    ctx: &JobContext,
    dry_run: bool,
    checkpoint: &CheckpointArgs,
) -> anyhow::Result<()> {
    let square_location = ctx.square_location_id()?;
    let shopify = ctx.shopify()?;
    let square = ctx.square()?;

    let snapshot = SquareSnapshot::load(ctx, &square, square_location).await?;
    let existing = shopify_products(ctx, &shopify, None).await?;

    let imports: Vec<ImportItem> = snapshot
        .in_stock()
        .filter(|item| {
            item.to_source_item()
                .is_some_and(|source| match_product(&source, &existing).is_none())
        })
        .filter_map(|item| {
            new_product(item, &snapshot).map(|product| ImportItem {
                square_id: item.id.clone(),
                product,
            })
        })
        .collect();
    println!("import-square: {} Square items to create in Shopify", imports.len());

    if dry_run {
        for item in &imports {
            let skus: Vec<&str> = item.product.variants.iter().map(|v| v.sku.as_str()).collect();
            println!(
                "dry-run: would create {} ({}) skus: [{}]",
                item.product.title,
                item.product.product_type,
                skus.join(", ")
            );
        }
        return Ok(());
    }

    let run_id = checkpoint.resolve("import-square", &[square_location.as_bytes()]);
    let tracker = ProgressTracker::open(&ctx.store, run_id.as_str(), checkpoint.fresh)?;
    let shopify = &shopify;

    let report = run_batch(
        &imports,
        &ctx.batch_settings(),
        Some(tracker),
        |i: &ImportItem| i.square_id.clone(),
        move |i: &ImportItem| {
            let product = i.product.clone();
            async move { create(shopify, &product).await }
        },
    )
    .await?;

    print_report("import-square", &report);
    Ok(())
}

/// Retried only after a 429. A timeout or 5xx may already have created the
/// product, so those fail as [`ItemError::Unconfirmed`].
async fn create(client: &ShopifyClient, product: &NewProduct) -> Result<ItemOutcome, ItemError> {
    let created = client.create_product(product).await.map_err(|e| match e {
        ShopifyError::RateLimited { .. } => ItemError::Shopify(e),
        e if e.is_retriable() => ItemError::Unconfirmed(e),
        e => ItemError::Shopify(e),
    })?;
    if created.variants.len() != product.variants.len() {
        return Err(ItemError::Verification {
            expected: format!("{} variants", product.variants.len()),
            actual: format!("{} variants", created.variants.len()),
        });
    }
    tracing::info!(product_id = created.id, title = %created.title, "product created");
    Ok(ItemOutcome::Updated)
}
