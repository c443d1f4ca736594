//! Square API response types.
//!
//! Only the catalog, inventory and location fields the sync jobs read are
//! modelled. Square returns inventory quantities as decimal strings
//! (`"3"`, `"2.5"`); [`InventoryCount::whole_quantity`] converts them.

use serde::{Deserialize, Serialize};
use stocksync_core::SourceItem;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// `GET /v2/catalog/list`.
#[derive(Debug, Deserialize)]
pub struct CatalogListResponse {
    #[serde(default)]
    pub objects: Vec<CatalogObject>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogObject {
    pub id: String,
    /// `"ITEM"`, `"CATEGORY"`, ...
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub item_data: Option<ItemData>,
    #[serde(default)]
    pub category_data: Option<CategoryData>,
}

impl CatalogObject {
    #[must_use]
    pub fn is_item(&self) -> bool {
        self.object_type == "ITEM" && !self.is_deleted && self.item_data.is_some()
    }

    /// Matcher input for an item: name, non-empty SKUs and variation names.
    #[must_use]
    pub fn to_source_item(&self) -> Option<SourceItem> {
        let data = self.item_data.as_ref()?;
        let variations = data.variations.iter().filter_map(|v| v.item_variation_data.as_ref());
        Some(SourceItem {
            name: data.name.clone(),
            skus: variations
                .clone()
                .filter_map(|v| v.sku.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            variant_names: variations.filter_map(|v| v.name.clone()).collect(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub reporting_category: Option<ObjectRef>,
    #[serde(default)]
    pub variations: Vec<CatalogVariation>,
}

impl ItemData {
    /// Reporting category when set, else the legacy single category.
    #[must_use]
    pub fn category_id(&self) -> Option<&str> {
        self.reporting_category
            .as_ref()
            .map(|c| c.id.as_str())
            .or(self.category_id.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryData {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogVariation {
    pub id: String,
    #[serde(default)]
    pub item_variation_data: Option<VariationData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariationData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price_money: Option<Money>,
}

/// Amount in the smallest currency unit (cents).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: i64,
}

impl Money {
    /// `1999` becomes `"19.99"`.
    #[must_use]
    pub fn to_decimal_string(self) -> String {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Body of `POST /v2/inventory/counts/batch-retrieve`.
#[derive(Debug, Serialize)]
pub struct BatchRetrieveCountsRequest<'a> {
    pub catalog_object_ids: &'a [String],
    pub location_ids: Vec<&'a str>,
    pub states: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRetrieveCountsResponse {
    #[serde(default)]
    pub counts: Vec<InventoryCount>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryCount {
    pub catalog_object_id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    pub quantity: String,
}

impl InventoryCount {
    /// Quantity truncated to a whole unit; unparsable values count as 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn whole_quantity(&self) -> i64 {
        let raw = self.quantity.trim();
        raw.parse::<i64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().filter(|q| q.is_finite()).map(|q| q.trunc() as i64))
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LocationsResponse {
    #[serde(default)]
    pub locations: Vec<SquareLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SquareLocation {
    pub id: String,
    pub name: String,
    /// `"ACTIVE"` or `"INACTIVE"`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub address_line_1: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// `{"errors": [...]}` body of a failed request.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEntry {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorEntry {
    pub(crate) fn describe(&self) -> String {
        match (&self.code, &self.detail) {
            (Some(code), Some(detail)) => format!("{code}: {detail}"),
            (Some(code), None) => code.clone(),
            (None, Some(detail)) => detail.clone(),
            (None, None) => "unknown error".to_owned(),
        }
    }
}
