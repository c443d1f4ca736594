//! Admin GraphQL operations.
//!
//! Queries are plain strings with `$variables`; responses decode into the
//! typed nodes in [`crate::types`]. A top-level `THROTTLED` error maps to
//! [`ShopifyError::RateLimited`] so it backs off like an HTTP 429.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use stocksync_batch::Page;
use stocksync_core::ProductStatus;

use super::ShopifyClient;
use crate::error::ShopifyError;
use crate::types::{
    Connection, GraphQlResponse, InventoryLevelNode, SaleProduct, SkuVariant, StockedProduct,
    UserError,
};

const PRODUCTS_WITH_INVENTORY: &str = r"
query ProductsWithInventory($first: Int!, $after: String) {
  products(first: $first, after: $after) {
    edges {
      node {
        id
        title
        tags
        status
        variants(first: 100) {
          edges { node { id inventoryQuantity } }
        }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}";

const VARIANT_BY_SKU: &str = r"
query VariantBySku($query: String!) {
  productVariants(first: 5, query: $query) {
    edges {
      node {
        id
        sku
        inventoryItem {
          id
          inventoryLevels(first: 10) {
            edges { node { id available location { id } } }
          }
        }
      }
    }
  }
}";

const ADJUST_QUANTITY: &str = r"
mutation AdjustQuantity($input: InventoryAdjustQuantityInput!) {
  inventoryAdjustQuantity(input: $input) {
    inventoryLevel { id available }
    userErrors { field message }
  }
}";

const PRODUCT_UPDATE: &str = r"
mutation ProductUpdate($input: ProductInput!) {
  productUpdate(input: $input) {
    product { id }
    userErrors { field message }
  }
}";

const VARIANT_UPDATE: &str = r"
mutation VariantUpdate($input: ProductVariantInput!) {
  productVariantUpdate(input: $input) {
    productVariant { id compareAtPrice }
    userErrors { field message }
  }
}";

const COLLECTION_SALE_PRODUCTS: &str = r"
query CollectionSaleProducts($query: String!) {
  collections(first: 1, query: $query) {
    edges {
      node {
        products(first: 250) {
          edges {
            node {
              id
              title
              variants(first: 100) {
                edges { node { id title price compareAtPrice } }
              }
            }
          }
        }
      }
    }
  }
}";

/// Outcome of a delta adjustment, as reported back by Shopify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetQuantityResult {
    pub previous: i64,
    pub expected: i64,
    pub available: i64,
}

impl SetQuantityResult {
    /// `true` when Shopify's reported level matches `previous + delta`.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.available == self.expected
    }
}

#[derive(Deserialize)]
struct ProductsData {
    products: Connection<StockedProduct>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantsData {
    product_variants: Connection<SkuVariant>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdjustData {
    inventory_adjust_quantity: AdjustPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdjustPayload {
    inventory_level: Option<AdjustedLevel>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize)]
struct AdjustedLevel {
    available: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductUpdateData {
    product_update: MutationPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantUpdateData {
    product_variant_update: MutationPayload,
}

/// Shared shape of mutation payloads whose result body is not needed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationPayload {
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize)]
struct CollectionsData {
    collections: Connection<CollectionNode>,
}

#[derive(Deserialize)]
struct CollectionNode {
    products: Connection<SaleProduct>,
}

fn check_user_errors(operation: &str, errors: &[UserError]) -> Result<(), ShopifyError> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(ShopifyError::UserErrors {
        operation: operation.to_owned(),
        messages: errors.iter().map(ToString::to_string).collect(),
    })
}

/// Escapes a value for use inside a quoted search-syntax term.
fn quote_search_term(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl ShopifyClient {
    /// Runs one GraphQL document and returns its `data`.
    ///
    /// # Errors
    ///
    /// - [`ShopifyError::RateLimited`] on HTTP 429 or a `THROTTLED` error
    /// - [`ShopifyError::GraphQl`] on any other top-level error, or when the
    ///   response carries no `data`
    /// - transport and decoding errors as for REST calls
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, ShopifyError> {
        let request = self
            .post("graphql.json")
            .json(&json!({ "query": query, "variables": variables }));
        let (response, _): (GraphQlResponse<T>, _) = self.send(request, operation).await?;

        if !response.errors.is_empty() {
            let throttled = response.errors.iter().any(|e| {
                e.extensions
                    .as_ref()
                    .and_then(|x| x.code.as_deref())
                    .is_some_and(|code| code == "THROTTLED")
            });
            if throttled {
                tracing::debug!(operation, "GraphQL request throttled");
                return Err(ShopifyError::RateLimited {
                    retry_after_secs: None,
                });
            }
            return Err(ShopifyError::GraphQl {
                messages: response.errors.into_iter().map(|e| e.message).collect(),
            });
        }

        response.data.ok_or_else(|| ShopifyError::GraphQl {
            messages: vec![format!("{operation}: response carried no data")],
        })
    }

    /// One page of products with their variant quantities.
    ///
    /// # Errors
    ///
    /// See [`ShopifyClient::graphql`].
    pub async fn products_with_inventory_page(
        &self,
        after: Option<&str>,
        first: u32,
    ) -> Result<Page<StockedProduct>, ShopifyError> {
        let data: ProductsData = self
            .graphql(
                "ProductsWithInventory",
                PRODUCTS_WITH_INVENTORY,
                json!({ "first": first, "after": after }),
            )
            .await?;
        let next = data.products.page_info.next_cursor();
        Ok(Page::new(data.products.into_nodes(), next))
    }

    /// The variant whose SKU equals `sku` exactly, with its inventory levels.
    ///
    /// Shopify's `sku:` search is a prefix match, so results are filtered
    /// again here.
    ///
    /// # Errors
    ///
    /// See [`ShopifyClient::graphql`].
    pub async fn find_variant_by_sku(&self, sku: &str) -> Result<Option<SkuVariant>, ShopifyError> {
        let data: VariantsData = self
            .graphql(
                "VariantBySku",
                VARIANT_BY_SKU,
                json!({ "query": format!("sku:{}", quote_search_term(sku)) }),
            )
            .await?;
        Ok(data
            .product_variants
            .into_nodes()
            .into_iter()
            .find(|v| v.sku.as_deref().is_some_and(|s| s.trim() == sku.trim())))
    }

    /// Adjusts `level` by `delta` and reports the level Shopify ends up with.
    ///
    /// # Errors
    ///
    /// [`ShopifyError::UserErrors`] when Shopify rejects the adjustment, or
    /// see [`ShopifyClient::graphql`].
    pub async fn adjust_inventory(
        &self,
        level: &InventoryLevelNode,
        delta: i64,
    ) -> Result<SetQuantityResult, ShopifyError> {
        let data: AdjustData = self
            .graphql(
                "inventoryAdjustQuantity",
                ADJUST_QUANTITY,
                json!({ "input": { "inventoryLevelId": level.id, "availableDelta": delta } }),
            )
            .await?;
        let payload = data.inventory_adjust_quantity;
        check_user_errors("inventoryAdjustQuantity", &payload.user_errors)?;
        let available = payload
            .inventory_level
            .map(|l| l.available)
            .ok_or_else(|| ShopifyError::GraphQl {
                messages: vec!["inventoryAdjustQuantity returned no inventory level".to_owned()],
            })?;
        Ok(SetQuantityResult {
            previous: level.available,
            expected: level.available + delta,
            available,
        })
    }

    /// Replaces a product's tags and/or status. `None` fields are untouched.
    ///
    /// # Errors
    ///
    /// [`ShopifyError::UserErrors`] when Shopify rejects the update, or see
    /// [`ShopifyClient::graphql`].
    pub async fn update_product(
        &self,
        product_id: &str,
        tags: Option<&[String]>,
        status: Option<ProductStatus>,
    ) -> Result<(), ShopifyError> {
        let mut input = json!({ "id": product_id });
        if let Some(tags) = tags {
            input["tags"] = json!(tags);
        }
        if let Some(status) = status {
            input["status"] = json!(status.as_str());
        }
        let data: ProductUpdateData = self
            .graphql("productUpdate", PRODUCT_UPDATE, json!({ "input": input }))
            .await?;
        check_user_errors("productUpdate", &data.product_update.user_errors)
    }

    /// Removes the sale price of one variant.
    ///
    /// # Errors
    ///
    /// [`ShopifyError::UserErrors`] when Shopify rejects the update, or see
    /// [`ShopifyClient::graphql`].
    pub async fn clear_compare_at_price(&self, variant_id: &str) -> Result<(), ShopifyError> {
        let data: VariantUpdateData = self
            .graphql(
                "productVariantUpdate",
                VARIANT_UPDATE,
                json!({ "input": { "id": variant_id, "compareAtPrice": null } }),
            )
            .await?;
        check_user_errors(
            "productVariantUpdate",
            &data.product_variant_update.user_errors,
        )
    }

    /// Products of the first collection titled `title`, or `None` when no
    /// collection matches.
    ///
    /// # Errors
    ///
    /// See [`ShopifyClient::graphql`].
    pub async fn collection_sale_products(
        &self,
        title: &str,
    ) -> Result<Option<Vec<SaleProduct>>, ShopifyError> {
        let data: CollectionsData = self
            .graphql(
                "CollectionSaleProducts",
                COLLECTION_SALE_PRODUCTS,
                json!({ "query": format!("title:{}", quote_search_term(title)) }),
            )
            .await?;
        Ok(data
            .collections
            .into_nodes()
            .into_iter()
            .next()
            .map(|c| c.products.into_nodes()))
    }
}
