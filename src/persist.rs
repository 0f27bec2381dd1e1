//! Deduplication and chunked bulk persistence.
//!
//! [`save_unique`] drops records whose `(name, type)` key appears earlier
//! in the batch or already exists in the store, then inserts the rest in
//! sequential chunks of `batch_size`.

use std::collections::HashSet;

use tracing::{debug, error, info};

use crate::config::ChunkFailurePolicy;
use crate::error::StoreError;
use crate::models::{NewProduct, ProductKey};
use crate::store::ProductStore;

/// Counters from one [`save_unique`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub inserted: usize,
    /// Dropped because an earlier record in the same batch had the key.
    pub duplicates_in_batch: usize,
    /// Dropped because the store already held the key.
    pub already_stored: usize,
    pub chunks_failed: usize,
    /// Set when a chunk failure stopped the remaining chunks.
    pub aborted: bool,
}

impl SaveReport {
    pub fn duplicates_skipped(&self) -> usize {
        self.duplicates_in_batch + self.already_stored
    }
}

/// Keep the first record for each key, preserving order.
pub fn dedup_in_batch(records: Vec<NewProduct>) -> (Vec<NewProduct>, usize) {
    let mut seen: HashSet<ProductKey> = HashSet::with_capacity(records.len());
    let before = records.len();
    let unique: Vec<NewProduct> = records
        .into_iter()
        .filter(|p| seen.insert(p.key()))
        .collect();
    let dropped = before - unique.len();
    (unique, dropped)
}

/// Persist `records`, skipping duplicates.
///
/// Only the existence lookup can fail the whole call. Chunk failures are
/// logged and handled per `on_failure`; whatever was inserted before an
/// abort is still reported.
pub async fn save_unique(
    store: &dyn ProductStore,
    records: Vec<NewProduct>,
    batch_size: usize,
    on_failure: ChunkFailurePolicy,
) -> Result<SaveReport, StoreError> {
    let mut report = SaveReport::default();
    if records.is_empty() {
        info!("no valid records to save");
        return Ok(report);
    }

    let (unique, in_batch) = dedup_in_batch(records);
    report.duplicates_in_batch = in_batch;

    let keys: Vec<ProductKey> = unique.iter().map(NewProduct::key).collect();
    let existing = store.existing_keys(&keys).await?;

    let fresh: Vec<NewProduct> = unique
        .into_iter()
        .filter(|p| !existing.contains(&p.key()))
        .collect();
    report.already_stored = keys.len() - fresh.len();

    info!(
        unique = keys.len(),
        in_batch_duplicates = report.duplicates_in_batch,
        already_stored = report.already_stored,
        to_insert = fresh.len(),
        "deduplication finished"
    );

    if fresh.is_empty() {
        return Ok(report);
    }

    let batch_size = batch_size.max(1);
    let total_chunks = fresh.len().div_ceil(batch_size);

    for (i, chunk) in fresh.chunks(batch_size).enumerate() {
        let chunk_no = i + 1;
        match store.insert_many(chunk).await {
            Ok(rows) => {
                report.inserted += rows.len();
                debug!(
                    chunk = chunk_no,
                    total = total_chunks,
                    size = chunk.len(),
                    "chunk saved"
                );
            }
            Err(err) => {
                report.chunks_failed += 1;
                error!(
                    chunk = chunk_no,
                    total = total_chunks,
                    size = chunk.len(),
                    error = %err,
                    "failed to save chunk"
                );
                if on_failure == ChunkFailurePolicy::Abort {
                    report.aborted = true;
                    break;
                }
            }
        }
    }

    info!(
        inserted = report.inserted,
        chunks = total_chunks,
        failed = report.chunks_failed,
        "bulk persistence finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProductStore;
    use rust_decimal::Decimal;

    fn product(name: &str, kind: &str, cents: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            kind: kind.to_string(),
            price: Decimal::new(cents, 2),
            quantity: 1,
            industry: String::new(),
            origin: String::new(),
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let (unique, dropped) = dedup_in_batch(vec![
            product("A", "T", 100),
            product("A", "U", 100),
            product("A", "T", 999),
        ]);
        assert_eq!(dropped, 1);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].price, Decimal::new(100, 2));
    }

    #[tokio::test]
    async fn skips_keys_already_stored() {
        let store = InMemoryProductStore::new();
        store.create(&product("A", "T", 100)).await.unwrap();

        let report = save_unique(
            &store,
            vec![product("A", "T", 500), product("B", "T", 100)],
            100,
            ChunkFailurePolicy::Continue,
        )
        .await
        .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.already_stored, 1);
        assert_eq!(store.len(), 2);
        // The stored row is untouched.
        assert_eq!(store.all()[0].price, Decimal::new(100, 2));
    }

    #[tokio::test]
    async fn second_save_inserts_nothing() {
        let store = InMemoryProductStore::new();
        let batch = || (0..30).map(|i| product(&format!("P{i}"), "T", 100)).collect::<Vec<_>>();

        let first = save_unique(&store, batch(), 7, ChunkFailurePolicy::Continue)
            .await
            .unwrap();
        let second = save_unique(&store, batch(), 7, ChunkFailurePolicy::Continue)
            .await
            .unwrap();

        assert_eq!(first.inserted, 30);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates_skipped(), 30);
        assert_eq!(store.len(), 30);
    }

    #[tokio::test]
    async fn empty_input_is_a_noop() {
        let store = InMemoryProductStore::new();
        let report = save_unique(&store, Vec::new(), 100, ChunkFailurePolicy::Continue)
            .await
            .unwrap();
        assert_eq!(report, SaveReport::default());
    }
}
