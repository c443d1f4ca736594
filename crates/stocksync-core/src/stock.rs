//! Product visibility and "Last Piece" tagging driven by total stock.

use serde::{Deserialize, Serialize};

/// Shopify product status as exposed by the GraphQL Admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Active,
    Draft,
    Archived,
}

impl ProductStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Active => "ACTIVE",
            ProductStatus::Draft => "DRAFT",
            ProductStatus::Archived => "ARCHIVED",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for the low-stock job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowStockPolicy {
    pub tag: String,
    /// Totals in `1..=threshold` get the tag.
    pub threshold: i64,
}

impl Default for LowStockPolicy {
    fn default() -> Self {
        Self {
            tag: "Last Piece".to_string(),
            threshold: 2,
        }
    }
}

/// What to change on one product. `None` fields mean "leave as is".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LowStockDecision {
    pub total: i64,
    pub new_status: Option<ProductStatus>,
    /// Full replacement tag list, present only when tags change.
    pub new_tags: Option<Vec<String>>,
}

impl LowStockDecision {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.new_status.is_none() && self.new_tags.is_none()
    }

    #[must_use]
    pub fn adds_tag(&self, policy: &LowStockPolicy) -> bool {
        self.new_tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| *t == policy.tag))
    }
}

impl LowStockPolicy {
    /// Decides status and tag changes from the summed variant quantities.
    ///
    /// A product with a total of exactly zero is drafted whatever its current
    /// status, and a drafted product with stock is re-activated. A negative
    /// total leaves the status alone.
    #[must_use]
    pub fn evaluate(
        &self,
        quantities: impl IntoIterator<Item = i64>,
        status: ProductStatus,
        tags: &[String],
    ) -> LowStockDecision {
        let total = quantities.into_iter().fold(0_i64, i64::saturating_add);

        let new_status = match status {
            ProductStatus::Draft if total > 0 => Some(ProductStatus::Active),
            ProductStatus::Active | ProductStatus::Archived if total == 0 => Some(ProductStatus::Draft),
            _ => None,
        };

        let has_tag = tags.iter().any(|t| *t == self.tag);
        let wants_tag = total > 0 && total <= self.threshold;
        let new_tags = match (wants_tag, has_tag) {
            (true, false) => {
                let mut next = tags.to_vec();
                next.push(self.tag.clone());
                Some(next)
            }
            (false, true) => Some(tags.iter().filter(|t| **t != self.tag).cloned().collect()),
            _ => None,
        };

        LowStockDecision {
            total,
            new_status,
            new_tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn zero_stock_drafts_and_does_not_tag() {
        let policy = LowStockPolicy::default();
        let d = policy.evaluate([0, 0], ProductStatus::Active, &tags(&["Outerwear"]));
        assert_eq!(d.total, 0);
        assert_eq!(d.new_status, Some(ProductStatus::Draft));
        assert!(d.new_tags.is_none());
    }

    #[test]
    fn zero_stock_removes_existing_tag() {
        let policy = LowStockPolicy::default();
        let d = policy.evaluate([0], ProductStatus::Draft, &tags(&["Last Piece", "Sale"]));
        assert!(d.new_status.is_none());
        assert_eq!(d.new_tags, Some(tags(&["Sale"])));
    }

    #[test]
    fn one_or_two_left_adds_tag() {
        let policy = LowStockPolicy::default();
        for qty in [1, 2] {
            let d = policy.evaluate([qty], ProductStatus::Active, &[]);
            assert_eq!(d.new_tags, Some(tags(&["Last Piece"])), "qty {qty}");
            assert!(d.adds_tag(&policy));
        }
    }

    #[test]
    fn above_threshold_has_no_tag() {
        let policy = LowStockPolicy::default();
        let d = policy.evaluate([2, 1], ProductStatus::Active, &tags(&["Last Piece"]));
        assert_eq!(d.total, 3);
        assert_eq!(d.new_tags, Some(Vec::new()));
        assert!(!d.adds_tag(&policy));

        let d = policy.evaluate([5], ProductStatus::Active, &[]);
        assert!(d.is_noop());
    }

    #[test]
    fn drafted_product_with_stock_is_reactivated() {
        let policy = LowStockPolicy::default();
        let d = policy.evaluate([1], ProductStatus::Draft, &tags(&["Last Piece"]));
        assert_eq!(d.new_status, Some(ProductStatus::Active));
        assert!(d.new_tags.is_none());
    }

    #[test]
    fn negative_total_keeps_status_and_drops_tag() {
        let policy = LowStockPolicy::default();
        let d = policy.evaluate([-1, 0], ProductStatus::Active, &tags(&["Last Piece"]));
        assert_eq!(d.total, -1);
        assert!(d.new_status.is_none());
        assert_eq!(d.new_tags, Some(Vec::new()));

        let d = policy.evaluate([-3], ProductStatus::Draft, &[]);
        assert!(d.is_noop());
    }

    #[test]
    fn archived_product_without_stock_is_drafted() {
        let policy = LowStockPolicy::default();
        let d = policy.evaluate([0], ProductStatus::Archived, &[]);
        assert_eq!(d.new_status, Some(ProductStatus::Draft));

        let d = policy.evaluate([4], ProductStatus::Archived, &[]);
        assert!(d.is_noop());
    }

    #[test]
    fn status_serializes_in_graphql_enum_form() {
        assert_eq!(serde_json::to_string(&ProductStatus::Draft).unwrap(), "\"DRAFT\"");
        let parsed: ProductStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(parsed, ProductStatus::Active);
    }
}
