//! Core data models used throughout the catalog.
//!
//! These types represent the raw import records read from JSON files, the
//! validated products that flow into the store, and the per-run import
//! bookkeeping.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Composite uniqueness key of a product: `(name, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey {
    pub name: String,
    pub kind: String,
}

impl ProductKey {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.name, self.kind)
    }
}

/// One element of an import file, before validation.
///
/// The product name is read from `product`, falling back to `name` when
/// `product` is absent. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawImportRecord {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub price: Option<PriceField>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

/// Prices normally arrive as currency strings, but bare JSON numbers are
/// accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceField {
    Text(String),
    Number(serde_json::Number),
}

impl RawImportRecord {
    /// `product`, or `name` when `product` is missing or blank.
    pub fn product_name(&self) -> Option<&str> {
        non_blank(&self.product).or_else(|| non_blank(&self.name))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// A validated product ready to be inserted. Produced by the record
/// validator and by the create/update API.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub kind: String,
    pub price: Decimal,
    pub quantity: i64,
    pub industry: String,
    pub origin: String,
}

impl NewProduct {
    pub fn key(&self) -> ProductKey {
        ProductKey::new(self.name.clone(), self.kind.clone())
    }
}

/// A product row as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub price: Decimal,
    pub quantity: i64,
    pub industry: String,
    pub origin: String,
}

impl Product {
    pub fn key(&self) -> ProductKey {
        ProductKey::new(self.name.clone(), self.kind.clone())
    }
}

/// Per-file import result, used for logging.
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub filename: String,
    pub records_found: usize,
    pub records_valid: usize,
    pub records_rejected: usize,
    pub rejections: Vec<String>,
    /// Set when the file contributed nothing because of a file-level failure.
    pub failure: Option<String>,
}

/// Result of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub total_saved: usize,
    pub files_found: usize,
    pub files_failed: usize,
    pub records_valid: usize,
    pub records_rejected: usize,
    pub duplicates_skipped: usize,
    /// Persistence stopped early under the `abort` chunk policy.
    pub aborted: bool,
}

impl ImportSummary {
    pub fn empty() -> Self {
        Self::default()
    }
}
