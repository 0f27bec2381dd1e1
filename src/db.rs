//! SQLite connection pools.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Open the catalog database at `[db].path`, creating it and its parent
/// directory when missing.
///
/// WAL lets the API keep reading while the startup import writes; the
/// busy timeout covers the short window where both want the write lock.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db.max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    Ok(pool)
}

/// Single-connection in-memory database, used by tests.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}
