//! Import pipeline tests against the library API.

use async_trait::async_trait;
use product_catalog::config::{ChunkFailurePolicy, ImportConfig};
use product_catalog::error::StoreError;
use product_catalog::import::run_import;
use product_catalog::models::{NewProduct, Product, ProductKey};
use product_catalog::persist::save_unique;
use product_catalog::store::{InMemoryProductStore, Page, ProductQuery, ProductStore};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Wraps the in-memory store and records every call the pipeline makes.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryProductStore,
    insert_sizes: Mutex<Vec<usize>>,
    lookups: Mutex<usize>,
    /// 1-based `insert_many` call numbers that fail.
    fail_calls: Vec<usize>,
}

impl RecordingStore {
    fn insert_sizes(&self) -> Vec<usize> {
        self.insert_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductStore for RecordingStore {
    async fn existing_keys(&self, keys: &[ProductKey]) -> Result<HashSet<ProductKey>, StoreError> {
        *self.lookups.lock().unwrap() += 1;
        self.inner.existing_keys(keys).await
    }

    async fn insert_many(&self, products: &[NewProduct]) -> Result<Vec<Product>, StoreError> {
        let call = {
            let mut sizes = self.insert_sizes.lock().unwrap();
            sizes.push(products.len());
            sizes.len()
        };
        if self.fail_calls.contains(&call) {
            return Err(StoreError::Corrupt(format!("injected failure on call {call}")));
        }
        self.inner.insert_many(products).await
    }

    async fn get(&self, id: i64) -> Result<Option<Product>, StoreError> {
        self.inner.get(id).await
    }

    async fn create(&self, product: &NewProduct) -> Result<Product, StoreError> {
        self.inner.create(product).await
    }

    async fn update(&self, id: i64, product: &NewProduct) -> Result<Product, StoreError> {
        self.inner.update(id, product).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn exists_by_key(
        &self,
        key: &ProductKey,
        excluding_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        self.inner.exists_by_key(key, excluding_id).await
    }

    async fn search(&self, query: &ProductQuery) -> Result<Page<Product>, StoreError> {
        self.inner.search(query).await
    }
}

fn import_config(root: &Path) -> ImportConfig {
    ImportConfig {
        root: root.to_path_buf(),
        max_concurrency: Some(4),
        ..ImportConfig::default()
    }
}

fn record_json(name: &str, kind: &str, price: &str, quantity: i64) -> String {
    format!(
        r#"{{"product":"{}","type":"{}","price":"{}","quantity":{}}}"#,
        name, kind, price, quantity
    )
}

fn write_file(dir: &Path, name: &str, records: &[String]) {
    fs::write(dir.join(name), format!("[{}]", records.join(","))).unwrap();
}

fn product(i: usize) -> NewProduct {
    NewProduct {
        name: format!("Product {i}"),
        kind: "Tipo A".to_string(),
        price: Decimal::new(1999, 2),
        quantity: 1,
        industry: String::new(),
        origin: String::new(),
    }
}

#[tokio::test]
async fn end_to_end_single_record() {
    let tmp = TempDir::new().unwrap();
    write_file(
        tmp.path(),
        "data_1.json",
        &[record_json("Produto Teste 1", "Tipo A", "$19.99", 100)],
    );

    let store = Arc::new(InMemoryProductStore::new());
    let summary = run_import(&import_config(tmp.path()), store.clone()).await;
    assert_eq!(summary.total_saved, 1);

    let rows = store.all();
    assert_eq!(rows.len(), 1);
    let p = &rows[0];
    assert_eq!(p.name, "Produto Teste 1");
    assert_eq!(p.kind, "Tipo A");
    assert_eq!(p.price, Decimal::new(1999, 2));
    assert_eq!(p.quantity, 100);
    assert_eq!(p.industry, "");
    assert_eq!(p.origin, "");
}

#[tokio::test]
async fn malformed_price_skips_only_that_record() {
    let tmp = TempDir::new().unwrap();
    write_file(
        tmp.path(),
        "data_1.json",
        &[
            record_json("Good", "T", "$5.00", 1),
            record_json("Bad", "T", "abc", 1),
        ],
    );

    let store = Arc::new(InMemoryProductStore::new());
    let summary = run_import(&import_config(tmp.path()), store.clone()).await;
    assert_eq!(summary.total_saved, 1);
    assert_eq!(summary.records_rejected, 1);
    assert_eq!(store.all()[0].name, "Good");
}

#[tokio::test]
async fn second_run_inserts_nothing() {
    let tmp = TempDir::new().unwrap();
    let records: Vec<String> = (0..20)
        .map(|i| record_json(&format!("P{i}"), "T", "$1.00", i))
        .collect();
    write_file(tmp.path(), "data_1.json", &records);

    let store = Arc::new(InMemoryProductStore::new());
    let cfg = import_config(tmp.path());
    assert_eq!(run_import(&cfg, store.clone()).await.total_saved, 20);

    let second = run_import(&cfg, store.clone()).await;
    assert_eq!(second.total_saved, 0);
    assert_eq!(second.duplicates_skipped, 20);
    assert_eq!(store.len(), 20);
}

#[tokio::test]
async fn same_key_twice_keeps_exactly_one() {
    let tmp = TempDir::new().unwrap();
    write_file(
        tmp.path(),
        "data_1.json",
        &[
            record_json("Dup", "T", "$1.00", 1),
            record_json("Dup", "T", "$2.00", 2),
        ],
    );
    write_file(tmp.path(), "data_2.json", &[record_json("Dup", "T", "$3.00", 3)]);

    let store = Arc::new(InMemoryProductStore::new());
    let summary = run_import(&import_config(tmp.path()), store.clone()).await;
    assert_eq!(summary.total_saved, 1);
    assert_eq!(summary.duplicates_skipped, 2);
    // Records are flattened in discovery order, so the first one wins.
    assert_eq!(store.all()[0].price, Decimal::new(100, 2));
}

#[tokio::test]
async fn existing_rows_are_not_touched() {
    let tmp = TempDir::new().unwrap();
    write_file(
        tmp.path(),
        "data_1.json",
        &[
            record_json("Existing", "T", "$99.00", 9),
            record_json("Fresh", "T", "$1.00", 1),
        ],
    );

    let store = Arc::new(InMemoryProductStore::new());
    let mut existing = product(0);
    existing.name = "Existing".to_string();
    existing.kind = "T".to_string();
    store.create(&existing).await.unwrap();

    let summary = run_import(&import_config(tmp.path()), store.clone()).await;
    assert_eq!(summary.total_saved, 1);

    let rows = store.all();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].price, Decimal::new(1999, 2));
}

#[tokio::test]
async fn structural_failure_does_not_abort_siblings() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("data_1.json"), "{ not json").unwrap();
    fs::write(tmp.path().join("data_2.json"), r#"{"items":[]}"#).unwrap();
    write_file(tmp.path(), "data_3.json", &[record_json("Ok", "T", "$1.00", 1)]);

    let store = Arc::new(InMemoryProductStore::new());
    let summary = run_import(&import_config(tmp.path()), store.clone()).await;
    assert_eq!(summary.files_found, 3);
    assert_eq!(summary.files_failed, 2);
    assert_eq!(summary.total_saved, 1);
}

#[tokio::test]
async fn many_files_load_concurrently() {
    let tmp = TempDir::new().unwrap();
    for f in 0..12 {
        let records: Vec<String> = (0..25)
            .map(|i| record_json(&format!("F{f}-P{i}"), "T", "R$2,50", 1))
            .collect();
        write_file(tmp.path(), &format!("data_{f}.json"), &records);
    }

    let store = Arc::new(RecordingStore::default());
    let summary = run_import(&import_config(tmp.path()), store.clone()).await;
    assert_eq!(summary.total_saved, 300);
    assert_eq!(*store.lookups.lock().unwrap(), 1);
    assert_eq!(store.insert_sizes(), vec![100, 100, 100]);
}

#[tokio::test]
async fn two_hundred_fifty_records_make_three_inserts() {
    let store = RecordingStore::default();
    let records: Vec<NewProduct> = (0..250).map(product).collect();

    let report = save_unique(&store, records, 100, ChunkFailurePolicy::Continue)
        .await
        .unwrap();

    assert_eq!(report.inserted, 250);
    assert_eq!(store.insert_sizes(), vec![100, 100, 50]);
    assert_eq!(*store.lookups.lock().unwrap(), 1);
}

#[tokio::test]
async fn failed_chunk_continues_by_default() {
    let store = RecordingStore {
        fail_calls: vec![2],
        ..RecordingStore::default()
    };
    let records: Vec<NewProduct> = (0..250).map(product).collect();

    let report = save_unique(&store, records, 100, ChunkFailurePolicy::Continue)
        .await
        .unwrap();

    assert_eq!(report.inserted, 150);
    assert_eq!(report.chunks_failed, 1);
    assert_eq!(store.insert_sizes(), vec![100, 100, 50]);
}

#[tokio::test]
async fn failed_chunk_can_abort_the_rest() {
    let store = RecordingStore {
        fail_calls: vec![2],
        ..RecordingStore::default()
    };
    let records: Vec<NewProduct> = (0..250).map(product).collect();

    let report = save_unique(&store, records, 100, ChunkFailurePolicy::Abort)
        .await
        .unwrap();

    assert!(report.aborted);
    assert_eq!(report.inserted, 100);
    assert_eq!(store.insert_sizes(), vec![100, 100]);
}

#[tokio::test]
async fn aborted_run_reports_committed_rows() {
    let tmp = TempDir::new().unwrap();
    let records: Vec<String> = (0..250)
        .map(|i| record_json(&format!("P{i}"), "T", "$1.00", 1))
        .collect();
    write_file(tmp.path(), "data_1.json", &records);

    let store = Arc::new(RecordingStore {
        fail_calls: vec![2],
        ..RecordingStore::default()
    });
    let config = ImportConfig {
        on_chunk_failure: ChunkFailurePolicy::Abort,
        ..import_config(tmp.path())
    };
    let summary = run_import(&config, store.clone()).await;

    assert!(summary.aborted);
    assert_eq!(summary.total_saved, 100);
    assert_eq!(summary.records_valid, 250);
    assert_eq!(store.insert_sizes(), vec![100, 100]);
    assert_eq!(store.inner.all().len(), 100);
}

#[tokio::test]
async fn discovery_failure_returns_zero() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryProductStore::new());
    let summary = run_import(&import_config(&tmp.path().join("missing")), store.clone()).await;
    assert_eq!(summary.total_saved, 0);
    assert!(store.is_empty());
}
