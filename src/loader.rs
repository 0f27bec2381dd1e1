//! Single-file loading: read, detect shape, validate each record.
//!
//! Two root shapes are accepted:
//!
//! ```json
//! [ { "product": "...", "type": "...", "price": "$1.99", "quantity": 3 } ]
//! { "data": [ ... ] }
//! ```
//!
//! Record-level problems are logged and skipped (or, under
//! [`InvalidRecordPolicy::AbortFile`], drop the whole file). File-level
//! problems surface as [`FileError`] and never touch sibling files.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::InvalidRecordPolicy;
use crate::discovery::ImportFile;
use crate::error::{FileError, RecordError};
use crate::models::{ImportOutcome, NewProduct, RawImportRecord};
use crate::validate::{validate, RecordContext};

/// Valid products read from one file, plus its bookkeeping.
#[derive(Debug, Default)]
pub struct FileLoad {
    pub products: Vec<NewProduct>,
    pub outcome: ImportOutcome,
}

impl FileLoad {
    /// An empty result for a file that failed as a whole.
    pub fn failed(filename: &str, err: &FileError) -> Self {
        error!(file = %filename, error = %err, "import file failed, skipping it");
        FileLoad {
            products: Vec::new(),
            outcome: ImportOutcome {
                filename: filename.to_string(),
                failure: Some(err.to_string()),
                ..ImportOutcome::default()
            },
        }
    }
}

/// Load one file. Never fails: file-level errors are logged and yield an
/// empty [`FileLoad`].
pub async fn load_file(file: &ImportFile, policy: InvalidRecordPolicy) -> FileLoad {
    debug!(file = %file.filename, "loading import file");

    let bytes = match tokio::fs::read(&file.path).await {
        Ok(b) => b,
        Err(source) => {
            let err = FileError::Unreadable {
                file: file.filename.clone(),
                source,
            };
            return FileLoad::failed(&file.filename, &err);
        }
    };

    match parse_file(&file.filename, &bytes, policy) {
        Ok(load) => {
            info!(
                file = %file.filename,
                found = load.outcome.records_found,
                valid = load.outcome.records_valid,
                rejected = load.outcome.records_rejected,
                "import file processed"
            );
            load
        }
        Err(err) => FileLoad::failed(&file.filename, &err),
    }
}

/// Parse and validate the contents of one file.
pub fn parse_file(
    filename: &str,
    bytes: &[u8],
    policy: InvalidRecordPolicy,
) -> Result<FileLoad, FileError> {
    let elements = extract_records(filename, bytes)?;

    let mut load = FileLoad {
        products: Vec::with_capacity(elements.len()),
        outcome: ImportOutcome {
            filename: filename.to_string(),
            records_found: elements.len(),
            ..ImportOutcome::default()
        },
    };

    for (i, element) in elements.into_iter().enumerate() {
        let ctx = RecordContext {
            filename,
            index: i + 1,
        };
        let label = ctx.describe(record_name(&element));

        let result = serde_json::from_value::<RawImportRecord>(element)
            .map_err(|e| RecordError::MalformedRecord(e.to_string()))
            .and_then(|raw| validate(&raw, &ctx));

        match result {
            Ok(product) => {
                load.outcome.records_valid += 1;
                load.products.push(product);
            }
            Err(reason) => {
                if policy == InvalidRecordPolicy::AbortFile {
                    return Err(FileError::AbortedOnInvalidRecord {
                        file: filename.to_string(),
                        index: ctx.index,
                        reason,
                    });
                }
                warn!(file = %filename, index = ctx.index, record = %label, reason = %reason, "record rejected");
                load.outcome.records_rejected += 1;
                load.outcome.rejections.push(format!("{}: {}", label, reason));
            }
        }
    }

    Ok(load)
}

/// Pull the record list out of either accepted root shape.
fn extract_records(filename: &str, bytes: &[u8]) -> Result<Vec<Value>, FileError> {
    let root: Value = serde_json::from_slice(bytes).map_err(|source| FileError::InvalidJson {
        file: filename.to_string(),
        source,
    })?;

    match root {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(FileError::UnrecognizedShape {
                file: filename.to_string(),
            }),
        },
        _ => Err(FileError::UnrecognizedShape {
            file: filename.to_string(),
        }),
    }
}

fn record_name(element: &Value) -> Option<&str> {
    element
        .get("product")
        .or_else(|| element.get("name"))
        .and_then(Value::as_str)
}
