//! Product storage abstraction.
//!
//! The [`ProductStore`] trait covers everything the import pipeline and
//! the REST API need from persistence: a batched existence check, bulk
//! insert, and the single-row CRUD and search operations.
//!
//! Implementations must be `Send + Sync` and enforce `(name, type)`
//! uniqueness themselves, reporting violations as
//! [`StoreError::Duplicate`].

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

use crate::error::StoreError;
use crate::models::{NewProduct, Product, ProductKey};

pub use memory::InMemoryProductStore;
pub use sqlite::SqliteProductStore;

/// Column a product listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Id,
    #[default]
    Name,
    Type,
    Price,
    Quantity,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(SortField::Id),
            "name" => Some(SortField::Name),
            "type" => Some(SortField::Type),
            "price" => Some(SortField::Price),
            "quantity" => Some(SortField::Quantity),
            _ => None,
        }
    }
}

/// Filter, ordering and paging for [`ProductStore::search`].
#[derive(Debug, Clone)]
pub struct ProductQuery {
    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: SortField,
    pub descending: bool,
    /// 0-based page index.
    pub page: u32,
    pub size: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            name: None,
            min_price: None,
            max_price: None,
            sort: SortField::Name,
            descending: false,
            page: 0,
            size: 10,
        }
    }
}

impl ProductQuery {
    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, query: &ProductQuery, total_elements: i64) -> Self {
        let size = query.size.max(1) as i64;
        let total_pages = (total_elements + size - 1) / size;
        Self {
            content,
            page_number: query.page,
            page_size: query.size,
            total_elements,
            total_pages,
            last: (query.page as i64 + 1) >= total_pages,
        }
    }
}

/// Abstract product storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`existing_keys`](ProductStore::existing_keys) | Which of these keys are already stored |
/// | [`insert_many`](ProductStore::insert_many) | Bulk insert, returns rows with ids |
/// | [`get`](ProductStore::get) | Point lookup by id |
/// | [`create`](ProductStore::create) | Insert one row |
/// | [`update`](ProductStore::update) | Replace one row's fields |
/// | [`delete`](ProductStore::delete) | Remove one row |
/// | [`exists_by_key`](ProductStore::exists_by_key) | Uniqueness probe, optionally ignoring one id |
/// | [`search`](ProductStore::search) | Filtered, sorted, paginated listing |
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Return the subset of `keys` that already exist. One logical call
    /// regardless of how many keys are passed.
    async fn existing_keys(&self, keys: &[ProductKey]) -> Result<HashSet<ProductKey>, StoreError>;

    /// Insert all products as one write. Either every row is inserted or
    /// none is.
    async fn insert_many(&self, products: &[NewProduct]) -> Result<Vec<Product>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Product>, StoreError>;

    async fn create(&self, product: &NewProduct) -> Result<Product, StoreError>;

    async fn update(&self, id: i64, product: &NewProduct) -> Result<Product, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn exists_by_key(
        &self,
        key: &ProductKey,
        excluding_id: Option<i64>,
    ) -> Result<bool, StoreError>;

    async fn search(&self, query: &ProductQuery) -> Result<Page<Product>, StoreError>;
}
