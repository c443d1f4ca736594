//! Admin API shapes, REST and GraphQL.
//!
//! Only the fields the sync jobs read or write are modelled. REST payloads
//! use numeric ids and snake_case; GraphQL payloads use `gid://` ids and
//! camelCase. [`legacy_id`] converts a GraphQL id into its REST form.

use serde::{Deserialize, Serialize};
use stocksync_core::{MatchTarget, ProductStatus};

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
pub struct ProductResponse {
    pub product: Product,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: u64,
    pub title: String,
    /// `"active"`, `"draft"` or `"archived"`.
    #[serde(default)]
    pub status: Option<String>,
    /// Comma-separated, e.g. `"Sale, Last Piece"`.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub published_scope: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Product {
    #[must_use]
    pub fn all_variants(&self, pred: impl Fn(&Variant) -> bool) -> bool {
        self.variants.iter().all(pred)
    }
}

impl MatchTarget for Product {
    fn title(&self) -> &str {
        &self.title
    }

    fn skus(&self) -> Vec<&str> {
        self.variants
            .iter()
            .filter_map(|v| v.sku.as_deref())
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    fn variant_titles(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.title.as_str()).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct VariantResponse {
    pub variant: Variant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variant {
    pub id: u64,
    #[serde(default)]
    pub product_id: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    /// `null` when the variant is not on sale.
    #[serde(default)]
    pub compare_at_price: Option<String>,
    #[serde(default)]
    pub inventory_item_id: Option<u64>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
    /// `"shopify"` when Shopify tracks stock for the variant.
    #[serde(default)]
    pub inventory_management: Option<String>,
    #[serde(default)]
    pub taxable: Option<bool>,
}

impl Variant {
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.inventory_management.as_deref() == Some("shopify")
    }

    #[must_use]
    pub fn is_taxable(&self) -> bool {
        self.taxable == Some(true)
    }
}

/// Partial variant update sent inside `PUT /products/{id}.json`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct VariantUpdate {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_management: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxable: Option<bool>,
}

impl VariantUpdate {
    /// An entry that only names the variant, leaving it untouched.
    #[must_use]
    pub fn keep(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Shopify-tracked stock that refuses overselling.
    #[must_use]
    pub fn enable_tracking(id: u64) -> Self {
        Self {
            id,
            inventory_management: Some("shopify".to_owned()),
            inventory_policy: Some("deny".to_owned()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn enable_tax(id: u64) -> Self {
        Self {
            id,
            taxable: Some(true),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub title: String,
    pub body_html: String,
    pub vendor: String,
    pub product_type: String,
    /// Comma-separated, as REST expects.
    pub tags: String,
    pub status: String,
    pub published: bool,
    pub published_scope: String,
    pub options: Vec<NewOption>,
    pub variants: Vec<NewVariant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewOption {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVariant {
    pub option1: String,
    pub price: String,
    pub sku: String,
    pub barcode: String,
    pub inventory_management: String,
    /// Initial stock; only honoured on creation.
    pub inventory_quantity: i64,
    pub inventory_policy: String,
    pub requires_shipping: bool,
    pub taxable: bool,
}

#[derive(Debug, Deserialize)]
pub struct LocationsResponse {
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SmartCollectionsResponse {
    pub smart_collections: Vec<Collection>,
}

#[derive(Debug, Deserialize)]
pub struct CustomCollectionsResponse {
    pub custom_collections: Vec<Collection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct InventoryLevelResponse {
    pub inventory_level: InventoryLevel,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InventoryLevel {
    pub inventory_item_id: u64,
    pub location_id: u64,
    #[serde(default)]
    pub available: Option<i64>,
}

// ---------------------------------------------------------------------------
// GraphQL
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlErrorEntry {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Cursor to request next, or `None` on the last page.
    #[must_use]
    pub fn next_cursor(&self) -> Option<String> {
        if self.has_next_page {
            self.end_cursor.clone()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    #[serde(default)]
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }

    #[must_use]
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockedProduct {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: ProductStatus,
    pub variants: Connection<StockedVariant>,
}

impl StockedProduct {
    pub fn quantities(&self) -> impl Iterator<Item = i64> + '_ {
        self.variants.nodes().map(|v| v.inventory_quantity.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockedVariant {
    pub id: String,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuVariant {
    pub id: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub inventory_item: InventoryItemNode,
}

impl SkuVariant {
    /// Level at `location_id` (REST numeric id), or the first level when no
    /// location is given.
    #[must_use]
    pub fn level_at(&self, location_id: Option<u64>) -> Option<&InventoryLevelNode> {
        let mut levels = self.inventory_item.inventory_levels.nodes();
        match location_id {
            Some(wanted) => levels.find(|l| legacy_id(&l.location.id) == Some(wanted)),
            None => levels.next(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemNode {
    pub id: String,
    pub inventory_levels: Connection<InventoryLevelNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLevelNode {
    pub id: String,
    pub available: i64,
    pub location: NodeRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleProduct {
    pub id: String,
    pub title: String,
    pub variants: Connection<SaleVariant>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleVariant {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub compare_at_price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) if !field.is_empty() => write!(f, "{}: {}", field.join("."), self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Numeric id at the end of a `gid://shopify/Type/123` id.
#[must_use]
pub fn legacy_id(gid: &str) -> Option<u64> {
    gid.rsplit('/').next()?.parse().ok()
}
