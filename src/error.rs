//! Error taxonomy for the import pipeline and the product store.
//!
//! Record-level errors ([`RecordError`]) are skip-and-log, file-level
//! errors ([`FileError`]) drop one file, and [`StoreError`] covers the
//! persistence backend. None of these ever escape an import run.

use thiserror::Error;

/// Failure to turn a currency string into a decimal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("price is missing")]
    MissingPrice,
    #[error("invalid price format: '{0}'")]
    InvalidPriceFormat(String),
}

/// Required fields of a product, named as they appear in the JSON body.
/// Import files carry the name under `product`, API requests under `name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Product,
    Name,
    Type,
    Price,
    Quantity,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Product => "product",
            Field::Name => "name",
            Field::Type => "type",
            Field::Price => "price",
            Field::Quantity => "quantity",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single import record was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("field '{0}' is required")]
    MissingField(Field),
    #[error("invalid price format '{0}', expected something like '$0.00'")]
    InvalidPriceFormat(String),
    #[error("price must be greater than zero, got {0}")]
    NonPositivePrice(String),
    #[error("quantity must not be negative, got {0}")]
    NegativeQuantity(i64),
    #[error("field '{field}' exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("record is not a valid product object: {0}")]
    MalformedRecord(String),
}

/// A failure that prevents reading a whole file as a list of records.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("failed to read {file}: {source}")]
    Unreadable {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {file}: {source}")]
    InvalidJson {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{file}: root must be an array or an object with a 'data' array")]
    UnrecognizedShape { file: String },
    #[error("{file}: timed out after {secs}s")]
    TimedOut { file: String, secs: u64 },
    #[error("{file}: aborted at record #{index}: {reason}")]
    AbortedOnInvalidRecord {
        file: String,
        index: usize,
        reason: RecordError,
    },
}

/// Errors raised by a [`ProductStore`](crate::store::ProductStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("product not found: id={0}")]
    NotFound(i64),
    #[error("product already exists: {0}")]
    Duplicate(String),
    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map a sqlx error, turning UNIQUE violations into [`StoreError::Duplicate`].
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}
