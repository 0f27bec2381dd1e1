//! SQLite-backed [`ProductStore`].
//!
//! Prices are stored as decimal text and parsed back into [`Decimal`];
//! price filters and ordering cast to REAL inside SQLite.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::StoreError;
use crate::models::{NewProduct, Product, ProductKey};

use super::{Page, ProductQuery, ProductStore, SortField};

/// Keys per existence statement (two bound parameters each).
const KEY_LOOKUP_CHUNK: usize = 400;
/// Rows per INSERT statement (eight bound parameters each).
const INSERT_STATEMENT_ROWS: usize = 500;

const PRODUCT_COLUMNS: &str = "id, name, type, price, quantity, industry, origin";

pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_product(row: &SqliteRow) -> Result<Product, StoreError> {
    let price_text: String = row.try_get("price")?;
    let price = Decimal::from_str(&price_text)
        .map_err(|_| StoreError::Corrupt(format!("price '{}'", price_text)))?;
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: row.try_get("type")?,
        price,
        quantity: row.try_get("quantity")?,
        industry: row.try_get("industry")?,
        origin: row.try_get("origin")?,
    })
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::Id => "id",
        SortField::Name => "name COLLATE NOCASE",
        SortField::Type => "type",
        SortField::Price => "CAST(price AS REAL)",
        SortField::Quantity => "quantity",
    }
}

/// Make `%`, `_` and `\` match literally in a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ProductQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(name) = query.name.as_ref().filter(|n| !n.trim().is_empty()) {
        qb.push(" AND lower(name) LIKE ")
            .push_bind(format!("%{}%", escape_like(&name.trim().to_lowercase())))
            .push(" ESCAPE '\\'");
    }
    if let Some(min) = query.min_price {
        qb.push(" AND CAST(price AS REAL) >= CAST(")
            .push_bind(min.to_string())
            .push(" AS REAL)");
    }
    if let Some(max) = query.max_price {
        qb.push(" AND CAST(price AS REAL) <= CAST(")
            .push_bind(max.to_string())
            .push(" AS REAL)");
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn existing_keys(&self, keys: &[ProductKey]) -> Result<HashSet<ProductKey>, StoreError> {
        let mut found = HashSet::new();

        for chunk in keys.chunks(KEY_LOOKUP_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT name, type FROM products WHERE (name, type) IN (");
            qb.push_values(chunk, |mut b, key| {
                b.push_bind(key.name.clone()).push_bind(key.kind.clone());
            });
            qb.push(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in rows {
                found.insert(ProductKey::new(
                    row.try_get::<String, _>("name")?,
                    row.try_get::<String, _>("type")?,
                ));
            }
        }

        Ok(found)
    }

    async fn insert_many(&self, products: &[NewProduct]) -> Result<Vec<Product>, StoreError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(products.len());

        for chunk in products.chunks(INSERT_STATEMENT_ROWS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO products (name, type, price, quantity, industry, origin, created_at, updated_at) ",
            );
            qb.push_values(chunk, |mut b, p| {
                b.push_bind(p.name.clone())
                    .push_bind(p.kind.clone())
                    .push_bind(p.price.to_string())
                    .push_bind(p.quantity)
                    .push_bind(p.industry.clone())
                    .push_bind(p.origin.clone())
                    .push_bind(now)
                    .push_bind(now);
            });
            qb.push(" RETURNING ").push(PRODUCT_COLUMNS);

            let rows = qb
                .build()
                .fetch_all(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
            for row in &rows {
                inserted.push(row_to_product(row)?);
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn create(&self, product: &NewProduct) -> Result<Product, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (name, type, price, quantity, industry, origin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&product.name)
        .bind(&product.kind)
        .bind(product.price.to_string())
        .bind(product.quantity)
        .bind(&product.industry)
        .bind(&product.origin)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row_to_product(&row)
    }

    async fn update(&self, id: i64, product: &NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET name = ?, type = ?, price = ?, quantity = ?, industry = ?, origin = ?, updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&product.name)
        .bind(&product.kind)
        .bind(product.price.to_string())
        .bind(product.quantity)
        .bind(&product.industry)
        .bind(&product.origin)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        match row {
            Some(row) => row_to_product(&row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn exists_by_key(
        &self,
        key: &ProductKey,
        excluding_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE name = ? AND type = ? AND (? IS NULL OR id <> ?))",
        )
        .bind(&key.name)
        .bind(&key.kind)
        .bind(excluding_id)
        .bind(excluding_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn search(&self, query: &ProductQuery) -> Result<Page<Product>, StoreError> {
        let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        qb.push(PRODUCT_COLUMNS).push(" FROM products");
        push_filters(&mut qb, query);
        qb.push(" ORDER BY ")
            .push(sort_column(query.sort))
            .push(if query.descending { " DESC" } else { " ASC" })
            .push(", id ASC LIMIT ")
            .push_bind(query.size as i64)
            .push(" OFFSET ")
            .push_bind(query.offset());

        let rows = qb.build().fetch_all(&self.pool).await?;
        let content = rows
            .iter()
            .map(row_to_product)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(content, query, total))
    }
}
