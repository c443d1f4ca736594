//! Batch input: `(sku, quantity)` records.
//!
//! Two on-disk shapes are accepted:
//!
//! ```text
//! 158616P	1
//! Y328465	3
//! ```
//!
//! (one `SKU<TAB>QTY` pair per line) and a JSON object mapping SKU to quantity:
//!
//! ```json
//! { "158616P": 1, "Y328465": 3 }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Desired absolute stock level for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub sku: String,
    pub quantity: i64,
}

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON inventory map in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parses tab-delimited `SKU<TAB>QTY` lines.
///
/// Blank lines and lines whose SKU is empty are skipped. A missing or
/// unparsable quantity becomes `0`. When a SKU appears more than once the
/// last quantity wins, at the position of its first appearance.
#[must_use]
pub fn parse_inventory_tsv(raw: &str) -> Vec<InventoryRecord> {
    let parsed = raw.lines().filter_map(|line| {
        if line.trim().is_empty() {
            return None;
        }
        let mut fields = line.split('\t');
        let sku = fields.next().map(str::trim).unwrap_or_default();
        if sku.is_empty() {
            return None;
        }
        let raw_qty = fields.next().map(str::trim).unwrap_or_default();
        Some(InventoryRecord {
            sku: sku.to_owned(),
            quantity: parse_quantity(sku, raw_qty),
        })
    });
    dedupe_keep_last(parsed)
}

/// Parses a JSON object of `{ "SKU": quantity }`.
///
/// Quantities may be JSON numbers or numeric strings; anything else becomes
/// `0`. Output is ordered by SKU.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if `raw` is not a JSON object.
pub fn parse_inventory_json(raw: &str) -> Result<Vec<InventoryRecord>, serde_json::Error> {
    let map: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw)?;
    let records = map
        .into_iter()
        .filter(|(sku, _)| !sku.trim().is_empty())
        .map(|(sku, value)| {
            let sku = sku.trim().to_owned();
            let quantity = match &value {
                serde_json::Value::Number(n) => n.as_i64().unwrap_or_else(|| {
                    tracing::warn!(sku = %sku, value = %n, "non-integer quantity, using 0");
                    0
                }),
                serde_json::Value::String(s) => parse_quantity(&sku, s.trim()),
                other => {
                    tracing::warn!(sku = %sku, value = %other, "unsupported quantity value, using 0");
                    0
                }
            };
            InventoryRecord { sku, quantity }
        })
        .collect();
    Ok(records)
}

/// Reads a batch input file. `.json` files are parsed as a SKU map, anything
/// else as tab-delimited lines.
///
/// # Errors
///
/// Returns [`RecordsError::Io`] if the file cannot be read, or
/// [`RecordsError::Json`] if a `.json` file is not a SKU map.
pub fn read_inventory_file(path: &Path) -> Result<Vec<InventoryRecord>, RecordsError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RecordsError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        parse_inventory_json(&raw).map_err(|source| RecordsError::Json {
            path: path.display().to_string(),
            source,
        })
    } else {
        Ok(parse_inventory_tsv(&raw))
    }
}

fn parse_quantity(sku: &str, raw: &str) -> i64 {
    if raw.is_empty() {
        return 0;
    }
    raw.parse::<i64>().unwrap_or_else(|_| {
        tracing::warn!(sku, raw, "unparsable quantity, using 0");
        0
    })
}

fn dedupe_keep_last(records: impl Iterator<Item = InventoryRecord>) -> Vec<InventoryRecord> {
    let mut out: Vec<InventoryRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        if let Some(&pos) = index.get(&record.sku) {
            out[pos].quantity = record.quantity;
        } else {
            index.insert(record.sku.clone(), out.len());
            out.push(record);
        }
    }
    out
}
