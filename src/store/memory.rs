//! In-memory [`ProductStore`] implementation, used by tests.
//!
//! Rows live in a `BTreeMap` behind `std::sync::RwLock`. Uniqueness of
//! `(name, type)` is checked on every write, mirroring the SQLite
//! constraint.

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{NewProduct, Product, ProductKey};

use super::{Page, ProductQuery, ProductStore, SortField};

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, Product>,
}

impl Inner {
    fn key_taken(&self, key: &ProductKey, excluding_id: Option<i64>) -> bool {
        self.rows
            .values()
            .any(|p| Some(p.id) != excluding_id && p.name == key.name && p.kind == key.kind)
    }

    fn push(&mut self, product: &NewProduct) -> Product {
        self.next_id += 1;
        let row = to_row(self.next_id, product);
        self.rows.insert(row.id, row.clone());
        row
    }
}

/// In-memory product store.
pub struct InMemoryProductStore {
    inner: RwLock<Inner>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Snapshot of every stored row, ordered by id.
    pub fn all(&self) -> Vec<Product> {
        self.read().rows.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryProductStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_row(id: i64, p: &NewProduct) -> Product {
    Product {
        id,
        name: p.name.clone(),
        kind: p.kind.clone(),
        price: p.price,
        quantity: p.quantity,
        industry: p.industry.clone(),
        origin: p.origin.clone(),
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn existing_keys(&self, keys: &[ProductKey]) -> Result<HashSet<ProductKey>, StoreError> {
        let inner = self.read();
        let stored: HashSet<ProductKey> = inner.rows.values().map(Product::key).collect();
        Ok(keys.iter().filter(|k| stored.contains(*k)).cloned().collect())
    }

    async fn insert_many(&self, products: &[NewProduct]) -> Result<Vec<Product>, StoreError> {
        let mut inner = self.write();

        let mut seen = HashSet::new();
        for p in products {
            let key = p.key();
            if inner.key_taken(&key, None) || !seen.insert(key.clone()) {
                return Err(StoreError::Duplicate(key.to_string()));
            }
        }

        Ok(products.iter().map(|p| inner.push(p)).collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self.read().rows.get(&id).cloned())
    }

    async fn create(&self, product: &NewProduct) -> Result<Product, StoreError> {
        let mut inner = self.write();
        let key = product.key();
        if inner.key_taken(&key, None) {
            return Err(StoreError::Duplicate(key.to_string()));
        }
        Ok(inner.push(product))
    }

    async fn update(&self, id: i64, product: &NewProduct) -> Result<Product, StoreError> {
        let mut inner = self.write();
        if !inner.rows.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        let key = product.key();
        if inner.key_taken(&key, Some(id)) {
            return Err(StoreError::Duplicate(key.to_string()));
        }
        let row = to_row(id, product);
        inner.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        match self.write().rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn exists_by_key(
        &self,
        key: &ProductKey,
        excluding_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        Ok(self.read().key_taken(key, excluding_id))
    }

    async fn search(&self, query: &ProductQuery) -> Result<Page<Product>, StoreError> {
        let needle = query.name.as_ref().map(|n| n.to_lowercase());
        let mut matches: Vec<Product> = self
            .read()
            .rows
            .values()
            .filter(|p| match &needle {
                Some(n) => p.name.to_lowercase().contains(n),
                None => true,
            })
            .filter(|p| query.min_price.map_or(true, |min| p.price >= min))
            .filter(|p| query.max_price.map_or(true, |max| p.price <= max))
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            let ord = match query.sort {
                SortField::Id => a.id.cmp(&b.id),
                SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortField::Type => a.kind.cmp(&b.kind),
                SortField::Price => a.price.cmp(&b.price),
                SortField::Quantity => a.quantity.cmp(&b.quantity),
            }
            .then(a.id.cmp(&b.id));
            if query.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        let total = matches.len() as i64;
        let content = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.size as usize)
            .collect();

        Ok(Page::new(content, query, total))
    }
}
