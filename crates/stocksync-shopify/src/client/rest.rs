//! Admin REST endpoints.

use serde_json::json;
use stocksync_batch::Page;

use super::ShopifyClient;
use crate::error::ShopifyError;
use crate::pagination::extract_next_cursor;
use crate::types::{
    Collection, CustomCollectionsResponse, InventoryLevel, InventoryLevelResponse, Location,
    LocationsResponse, NewProduct, Product, ProductResponse, ProductsResponse,
    SmartCollectionsResponse, Variant, VariantResponse, VariantUpdate,
};

/// Largest page size the REST API accepts.
pub const MAX_PAGE_SIZE: u32 = 250;

impl ShopifyClient {
    /// Fetches one page of `GET /products.json`.
    ///
    /// `status` (e.g. `"active"`) only applies to the first page: Shopify
    /// rejects filters alongside `page_info`, the cursor already encodes them.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError`] on transport failure, non-2xx status, or an
    /// unparsable body.
    pub async fn products_page(
        &self,
        status: Option<&str>,
        page_info: Option<&str>,
    ) -> Result<Page<Product>, ShopifyError> {
        let mut query: Vec<(&str, String)> = vec![("limit", MAX_PAGE_SIZE.to_string())];
        match (page_info, status) {
            (Some(cursor), _) => query.push(("page_info", cursor.to_owned())),
            (None, Some(status)) => query.push(("status", status.to_owned())),
            (None, None) => {}
        }
        let (body, link): (ProductsResponse, _) = self
            .send(self.get("products.json").query(&query), "products page")
            .await?;
        Ok(Page::new(body.products, extract_next_cursor(link.as_deref())))
    }

    /// # Errors
    ///
    /// Returns [`ShopifyError::NotFound`] for unknown ids, or any other
    /// [`ShopifyError`] on failure.
    pub async fn product(&self, product_id: u64) -> Result<Product, ShopifyError> {
        let (body, _): (ProductResponse, _) = self
            .send(
                self.get(&format!("products/{product_id}.json")),
                &format!("product {product_id}"),
            )
            .await?;
        Ok(body.product)
    }

    /// Updates a product's variants in one `PUT /products/{id}.json`.
    ///
    /// Shopify treats the `variants` array as the complete variant set and
    /// deletes any variant whose id is missing from it, so callers must list
    /// every variant of the product. An entry with only an `id` keeps that
    /// variant as it is.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::UnexpectedStatus`] (422) when Shopify rejects
    /// the update, or any other [`ShopifyError`] on failure.
    pub async fn update_variants(
        &self,
        product_id: u64,
        variants: &[VariantUpdate],
    ) -> Result<Product, ShopifyError> {
        let payload = json!({
            "product": {
                "id": product_id,
                "variants": variants,
            }
        });
        let (body, _): (ProductResponse, _) = self
            .send(
                self.put(&format!("products/{product_id}.json")).json(&payload),
                &format!("update variants of product {product_id}"),
            )
            .await?;
        Ok(body.product)
    }

    /// Makes a product visible on every sales channel, POS included.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError`] on failure.
    pub async fn publish_product(&self, product_id: u64) -> Result<Product, ShopifyError> {
        let payload = json!({
            "product": {
                "id": product_id,
                "published": true,
                "published_scope": "global",
            }
        });
        let (body, _): (ProductResponse, _) = self
            .send(
                self.put(&format!("products/{product_id}.json")).json(&payload),
                &format!("publish product {product_id}"),
            )
            .await?;
        Ok(body.product)
    }

    /// # Errors
    ///
    /// Returns [`ShopifyError`] on failure; 422 when Shopify rejects the
    /// product (e.g. duplicate option values).
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ShopifyError> {
        let (body, _): (ProductResponse, _) = self
            .send(
                self.post("products.json").json(&json!({ "product": product })),
                &format!("create product {:?}", product.title),
            )
            .await?;
        Ok(body.product)
    }

    /// # Errors
    ///
    /// Returns [`ShopifyError::NotFound`] for unknown ids, or any other
    /// [`ShopifyError`] on failure.
    pub async fn variant(&self, variant_id: u64) -> Result<Variant, ShopifyError> {
        let (body, _): (VariantResponse, _) = self
            .send(
                self.get(&format!("variants/{variant_id}.json")),
                &format!("variant {variant_id}"),
            )
            .await?;
        Ok(body.variant)
    }

    /// Sets the absolute available quantity of an inventory item at a
    /// location. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError`] on failure; 422 when the item is not stocked
    /// at the location or not tracked.
    pub async fn set_inventory_level(
        &self,
        location_id: u64,
        inventory_item_id: u64,
        available: i64,
    ) -> Result<InventoryLevel, ShopifyError> {
        let payload = json!({
            "location_id": location_id,
            "inventory_item_id": inventory_item_id,
            "available": available,
        });
        let (body, _): (InventoryLevelResponse, _) = self
            .send(
                self.post("inventory_levels/set.json").json(&payload),
                &format!("set inventory item {inventory_item_id}"),
            )
            .await?;
        Ok(body.inventory_level)
    }

    /// Smart and custom collections together.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError`] if either listing fails.
    pub async fn collections(&self) -> Result<Vec<Collection>, ShopifyError> {
        let limit = [("limit", MAX_PAGE_SIZE.to_string())];
        let (smart, _): (SmartCollectionsResponse, _) = self
            .send(self.get("smart_collections.json").query(&limit), "smart collections")
            .await?;
        let (custom, _): (CustomCollectionsResponse, _) = self
            .send(self.get("custom_collections.json").query(&limit), "custom collections")
            .await?;
        let mut all = smart.smart_collections;
        all.extend(custom.custom_collections);
        Ok(all)
    }

    /// One page of the products in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError`] on failure.
    pub async fn collection_products_page(
        &self,
        collection_id: u64,
        page_info: Option<&str>,
    ) -> Result<Page<Product>, ShopifyError> {
        let mut query: Vec<(&str, String)> = vec![("limit", MAX_PAGE_SIZE.to_string())];
        if let Some(cursor) = page_info {
            query.push(("page_info", cursor.to_owned()));
        }
        let (body, link): (ProductsResponse, _) = self
            .send(
                self.get(&format!("collections/{collection_id}/products.json")).query(&query),
                &format!("products of collection {collection_id}"),
            )
            .await?;
        Ok(Page::new(body.products, extract_next_cursor(link.as_deref())))
    }

    /// # Errors
    ///
    /// Returns [`ShopifyError`] on failure.
    pub async fn locations(&self) -> Result<Vec<Location>, ShopifyError> {
        let (body, _): (LocationsResponse, _) = self.send(self.get("locations.json"), "locations").await?;
        Ok(body.locations)
    }
}
