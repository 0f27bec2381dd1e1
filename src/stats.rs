//! Catalog statistics.
//!
//! Summarises what is stored: product and user counts, distinct types,
//! total stock, and a per-industry breakdown. Used by `catalog stats` to
//! check that imports landed.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Per-industry breakdown row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndustryStats {
    /// Empty string for products without an industry.
    pub industry: String,
    pub products: i64,
    pub units: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStats {
    pub products: i64,
    pub distinct_types: i64,
    pub total_units: i64,
    pub users: i64,
    pub by_industry: Vec<IndustryStats>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<CatalogStats> {
    let totals = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS products,
            COUNT(DISTINCT type) AS distinct_types,
            COALESCE(SUM(quantity), 0) AS total_units
        FROM products
        "#,
    )
    .fetch_one(pool)
    .await?;

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT industry, COUNT(*) AS products, COALESCE(SUM(quantity), 0) AS units
        FROM products
        GROUP BY industry
        ORDER BY products DESC, industry ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_industry = rows
        .iter()
        .map(|row| IndustryStats {
            industry: row.get("industry"),
            products: row.get("products"),
            units: row.get("units"),
        })
        .collect();

    Ok(CatalogStats {
        products: totals.get("products"),
        distinct_types: totals.get("distinct_types"),
        total_units: totals.get("total_units"),
        users,
        by_industry,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Product Catalog — Database Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Products:    {}", stats.products);
    println!("  Types:       {}", stats.distinct_types);
    println!("  Stock units: {}", stats.total_units);
    println!("  Users:       {}", stats.users);

    if !stats.by_industry.is_empty() {
        println!();
        println!("  By industry:");
        println!("  {:<32} {:>8} {:>10}", "INDUSTRY", "PRODUCTS", "UNITS");
        println!("  {}", "-".repeat(52));
        for s in &stats.by_industry {
            let label = if s.industry.is_empty() {
                "(none)"
            } else {
                s.industry.as_str()
            };
            println!("  {:<32} {:>8} {:>10}", label, s.products, s.units);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProduct;
    use crate::store::{ProductStore, SqliteProductStore};
    use rust_decimal::Decimal;

    fn product(name: &str, kind: &str, quantity: i64, industry: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            kind: kind.to_string(),
            price: Decimal::new(100, 2),
            quantity,
            industry: industry.to_string(),
            origin: String::new(),
        }
    }

    #[tokio::test]
    async fn counts_and_breakdown() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        crate::migrate::apply(&pool).await.unwrap();

        let empty = collect_stats(&pool).await.unwrap();
        assert_eq!(empty.products, 0);
        assert_eq!(empty.total_units, 0);
        assert!(empty.by_industry.is_empty());

        let store = SqliteProductStore::new(pool.clone());
        store
            .insert_many(&[
                product("A", "T1", 10, "Beauty"),
                product("B", "T1", 5, "Beauty"),
                product("C", "T2", 1, ""),
            ])
            .await
            .unwrap();

        let stats = collect_stats(&pool).await.unwrap();
        assert_eq!(stats.products, 3);
        assert_eq!(stats.distinct_types, 2);
        assert_eq!(stats.total_units, 16);
        assert_eq!(
            stats.by_industry[0],
            IndustryStats {
                industry: "Beauty".to_string(),
                products: 2,
                units: 15
            }
        );
    }

    #[test]
    fn bytes_format() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
