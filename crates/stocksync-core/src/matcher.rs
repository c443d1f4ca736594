//! Heuristic association of a Square catalog item with a Shopify product.
//!
//! Rules are tried in a fixed priority order and the first candidate that
//! satisfies the highest-priority rule wins:
//!
//! 1. [`MatchRule::Sku`]: any source SKU equals any candidate variant SKU.
//! 2. [`MatchRule::ExactTitle`]: titles equal, ignoring case.
//! 3. [`MatchRule::NormalizedTitle`]: lowercase alphanumeric-only titles are
//!    equal, or one contains the other.
//! 4. [`MatchRule::VariantNames`]: sorted variant-name lists are equal.
//!
//! There is no scoring: ties inside a rule resolve to the earliest candidate.

use std::sync::OnceLock;

use regex::Regex;

/// Anything a source item can be matched against.
pub trait MatchTarget {
    /// Product title.
    fn title(&self) -> &str;
    /// Non-empty SKUs of every variant.
    fn skus(&self) -> Vec<&str>;
    /// Display names of every variant.
    fn variant_titles(&self) -> Vec<&str>;
}

/// The item being looked up, typically built from a Square catalog item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceItem {
    pub name: String,
    pub skus: Vec<String>,
    pub variant_names: Vec<String>,
}

/// Which rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Sku,
    ExactTitle,
    NormalizedTitle,
    VariantNames,
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRule::Sku => write!(f, "sku"),
            MatchRule::ExactTitle => write!(f, "exact title"),
            MatchRule::NormalizedTitle => write!(f, "similar title"),
            MatchRule::VariantNames => write!(f, "variant names"),
        }
    }
}

/// A candidate chosen by [`match_product`].
#[derive(Debug)]
pub struct MatchResult<'a, T> {
    pub target: &'a T,
    pub index: usize,
    pub rule: MatchRule,
}

/// Finds the first candidate matching `source`, trying each rule in priority
/// order across the whole candidate list before falling back to the next.
#[must_use]
pub fn match_product<'a, T: MatchTarget>(
    source: &SourceItem,
    candidates: &'a [T],
) -> Option<MatchResult<'a, T>> {
    let found = |rule: MatchRule, pred: &dyn Fn(&T) -> bool| {
        candidates
            .iter()
            .position(pred)
            .map(|index| MatchResult {
                target: &candidates[index],
                index,
                rule,
            })
    };

    let source_skus: Vec<&str> = source
        .skus
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if !source_skus.is_empty() {
        let by_sku = found(MatchRule::Sku, &|c: &T| {
            c.skus().iter().any(|sku| source_skus.contains(&sku.trim()))
        });
        if by_sku.is_some() {
            return by_sku;
        }
    }

    let lowered = source.name.to_lowercase();
    let by_title = found(MatchRule::ExactTitle, &|c: &T| {
        c.title().to_lowercase() == lowered
    });
    if by_title.is_some() {
        return by_title;
    }

    let normalized = normalize_title(&source.name);
    // An empty normalized title is contained in every string; skip the rule
    // rather than match everything.
    if !normalized.is_empty() {
        let by_similar = found(MatchRule::NormalizedTitle, &|c: &T| {
            let other = normalize_title(c.title());
            !other.is_empty()
                && (other == normalized
                    || other.contains(normalized.as_str())
                    || normalized.contains(other.as_str()))
        });
        if by_similar.is_some() {
            return by_similar;
        }
    }

    let source_names = sorted_names(source.variant_names.iter().map(String::as_str));
    if !source_names.is_empty() {
        return found(MatchRule::VariantNames, &|c: &T| {
            sorted_names(c.variant_titles().into_iter()) == source_names
        });
    }

    None
}

/// Picks the variant of a matched product that corresponds to one source
/// variation: SKU equality first, then exact variant-title equality.
///
/// `variants` yields `(sku, title)` pairs in the product's variant order.
#[must_use]
pub fn match_variant<'v, I>(source_sku: Option<&str>, source_name: &str, variants: I) -> Option<usize>
where
    I: IntoIterator<Item = (Option<&'v str>, &'v str)>,
{
    let variants: Vec<(Option<&str>, &str)> = variants.into_iter().collect();
    let source_sku = source_sku.map(str::trim).filter(|s| !s.is_empty());

    if let Some(sku) = source_sku {
        if let Some(idx) = variants
            .iter()
            .position(|(candidate, _)| candidate.map(str::trim) == Some(sku))
        {
            return Some(idx);
        }
    }

    variants.iter().position(|(_, title)| *title == source_name)
}

/// Lowercases and strips everything outside `[a-z0-9]`.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9]").expect("valid regex"));
    re.replace_all(&title.to_lowercase(), "").into_owned()
}

fn sorted_names<'s>(names: impl Iterator<Item = &'s str>) -> Vec<&'s str> {
    let mut names: Vec<&str> = names.collect();
    names.sort_unstable();
    names
}
