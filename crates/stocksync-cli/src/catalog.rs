//! Full-catalog reads shared by the reconciliation jobs.

use std::collections::HashMap;

use stocksync_batch::fetch_all_pages;
use stocksync_shopify::{Product, ShopifyClient};
use stocksync_square::{CatalogObject, ItemData, SquareClient};

use crate::context::JobContext;

/// Every Shopify product, following `Link` pagination.
pub(crate) async fn shopify_products(
    ctx: &JobContext,
    client: &ShopifyClient,
    max_pages: Option<usize>,
) -> anyhow::Result<Vec<Product>> {
    let products = fetch_all_pages(
        None,
        ctx.page_options(max_pages),
        |cursor: Option<String>| async move { client.products_page(None, cursor.as_deref()).await },
    )
    .await?;
    tracing::info!(count = products.len(), "fetched Shopify products");
    Ok(products)
}

/// Square catalog items with their stock at one location.
#[derive(Debug, Default)]
pub(crate) struct SquareSnapshot {
    pub items: Vec<CatalogObject>,
    categories: HashMap<String, String>,
    quantities: HashMap<String, i64>,
}

impl SquareSnapshot {
    pub(crate) async fn load(
        ctx: &JobContext,
        client: &SquareClient,
        location_id: &str,
    ) -> anyhow::Result<Self> {
        let objects = fetch_all_pages(
            None,
            ctx.page_options(None),
            |cursor: Option<String>| async move {
                client.list_catalog_page("ITEM,CATEGORY", cursor.as_deref()).await
            },
        )
        .await?;

        let mut categories = HashMap::new();
        let mut items = Vec::new();
        for object in objects {
            if let Some(category) = object.category_data.as_ref() {
                categories.insert(object.id.clone(), category.name.clone());
            } else if object.is_item() {
                items.push(object);
            }
        }

        let variation_ids: Vec<String> = items
            .iter()
            .filter_map(|o| o.item_data.as_ref())
            .flat_map(|d| d.variations.iter().map(|v| v.id.clone()))
            .collect();
        let quantities = client
            .inventory_counts(&variation_ids, location_id, ctx.fetch_retry())
            .await?;

        tracing::info!(
            items = items.len(),
            variations = variation_ids.len(),
            location_id,
            "fetched Square catalog"
        );
        Ok(Self {
            items,
            categories,
            quantities,
        })
    }

    /// Whole-unit stock of one variation; uncounted variations have none.
    pub(crate) fn quantity(&self, variation_id: &str) -> i64 {
        self.quantities.get(variation_id).copied().unwrap_or(0)
    }

    pub(crate) fn has_stock(&self, item: &CatalogObject) -> bool {
        item.item_data
            .as_ref()
            .is_some_and(|d| d.variations.iter().any(|v| self.quantity(&v.id) > 0))
    }

    pub(crate) fn in_stock(&self) -> impl Iterator<Item = &CatalogObject> {
        self.items.iter().filter(|item| self.has_stock(item))
    }

    pub(crate) fn category_name(&self, data: &ItemData) -> Option<&str> {
        data.category_id()
            .and_then(|id| self.categories.get(id))
            .map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        items: Vec<CatalogObject>,
        categories: HashMap<String, String>,
        quantities: HashMap<String, i64>,
    ) -> Self {
        Self {
            items,
            categories,
            quantities,
        }
    }
}
