//! Product CRUD and search on top of a [`ProductStore`].

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::error::{Field, RecordError, StoreError};
use crate::models::{NewProduct, Product};
use crate::store::{Page, ProductQuery, ProductStore, SortField};
use crate::validate::{check_len, INDUSTRY_MAX, NAME_MAX, ORIGIN_MAX, TYPE_MAX};

pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Error, Debug)]
pub enum ProductError {
    #[error(transparent)]
    Invalid(#[from] RecordError),
    #[error("{0}")]
    BadQuery(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Body of `POST` and `PUT /api/v1/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

impl ProductRequest {
    pub fn validate(self) -> Result<NewProduct, RecordError> {
        let name = required(self.name, Field::Name)?;
        let kind = required(self.kind, Field::Type)?;
        let price = self.price.ok_or(RecordError::MissingField(Field::Price))?;
        if price <= Decimal::ZERO {
            return Err(RecordError::NonPositivePrice(price.to_string()));
        }
        let quantity = self
            .quantity
            .ok_or(RecordError::MissingField(Field::Quantity))?;
        if quantity < 0 {
            return Err(RecordError::NegativeQuantity(quantity));
        }
        let industry = self.industry.unwrap_or_default().trim().to_string();
        let origin = self.origin.unwrap_or_default().trim().to_string();

        check_len("name", &name, NAME_MAX)?;
        check_len("type", &kind, TYPE_MAX)?;
        check_len("industry", &industry, INDUSTRY_MAX)?;
        check_len("origin", &origin, ORIGIN_MAX)?;

        Ok(NewProduct {
            name,
            kind,
            price,
            quantity,
            industry,
            origin,
        })
    }
}

fn required(value: Option<String>, field: Field) -> Result<String, RecordError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(RecordError::MissingField(field)),
    }
}

/// Query string of `GET /api/v1/products`.
///
/// `sort` takes `field` or `field,asc|desc`, e.g. `price,desc`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

impl SearchParams {
    pub fn into_query(self) -> Result<ProductQuery, ProductError> {
        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ProductError::BadQuery(format!(
                "size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ProductError::BadQuery(
                    "min_price must not exceed max_price".to_string(),
                ));
            }
        }

        let (sort, descending) = match self.sort.as_deref().map(str::trim) {
            None | Some("") => (SortField::Name, false),
            Some(raw) => {
                let mut parts = raw.splitn(2, ',');
                let field = parts.next().unwrap_or("").trim();
                let field = SortField::parse(field).ok_or_else(|| {
                    ProductError::BadQuery(format!("cannot sort by '{}'", field))
                })?;
                let descending = match parts.next().map(|d| d.trim().to_ascii_lowercase()) {
                    None => false,
                    Some(d) if d == "asc" => false,
                    Some(d) if d == "desc" => true,
                    Some(d) => {
                        return Err(ProductError::BadQuery(format!(
                            "sort direction must be asc or desc, got '{}'",
                            d
                        )))
                    }
                };
                (field, descending)
            }
        };

        Ok(ProductQuery {
            name: self.name.filter(|n| !n.trim().is_empty()),
            min_price: self.min_price,
            max_price: self.max_price,
            sort,
            descending,
            page: self.page.unwrap_or(0),
            size,
        })
    }
}

pub async fn search(
    store: &dyn ProductStore,
    params: SearchParams,
) -> Result<Page<Product>, ProductError> {
    let query = params.into_query()?;
    Ok(store.search(&query).await?)
}

pub async fn get(store: &dyn ProductStore, id: i64) -> Result<Product, ProductError> {
    store
        .get(id)
        .await?
        .ok_or(ProductError::Store(StoreError::NotFound(id)))
}

pub async fn create(store: &dyn ProductStore, req: ProductRequest) -> Result<Product, ProductError> {
    let product = req.validate()?;
    let key = product.key();
    if store.exists_by_key(&key, None).await? {
        return Err(StoreError::Duplicate(key.to_string()).into());
    }
    let created = store.create(&product).await?;
    info!(id = created.id, product = %key, "product created");
    Ok(created)
}

pub async fn update(
    store: &dyn ProductStore,
    id: i64,
    req: ProductRequest,
) -> Result<Product, ProductError> {
    let product = req.validate()?;
    if store.get(id).await?.is_none() {
        return Err(StoreError::NotFound(id).into());
    }
    let key = product.key();
    if store.exists_by_key(&key, Some(id)).await? {
        return Err(StoreError::Duplicate(key.to_string()).into());
    }
    let updated = store.update(id, &product).await?;
    info!(id, product = %key, "product updated");
    Ok(updated)
}

pub async fn delete(store: &dyn ProductStore, id: i64) -> Result<(), ProductError> {
    store.delete(id).await?;
    info!(id, "product deleted");
    Ok(())
}
