//! Import orchestration.
//!
//! Coordinates one import run: discovery → concurrent per-file loading →
//! join → dedup → chunked persistence. Each file is loaded on its own
//! tokio task, bounded by a semaphore and an optional per-file timeout.
//! Nothing in here propagates an error to the caller. A run that fails
//! before persistence is a zero [`ImportSummary`]; a run stopped by a
//! failed chunk keeps the count of rows already committed.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{Config, ImportConfig, InvalidRecordPolicy};
use crate::db;
use crate::discovery::{discover_files, ImportFile};
use crate::error::FileError;
use crate::loader::{load_file, FileLoad};
use crate::models::{ImportSummary, NewProduct};
use crate::persist::save_unique;
use crate::store::{ProductStore, SqliteProductStore};

/// Run one import against `store`.
pub async fn run_import(config: &ImportConfig, store: Arc<dyn ProductStore>) -> ImportSummary {
    info!(root = %config.root.display(), "starting product import");

    let files = match discover_files(config) {
        Ok(files) => files,
        Err(err) => {
            error!(error = %err, "failed to resolve import files");
            return ImportSummary::empty();
        }
    };

    if files.is_empty() {
        warn!(root = %config.root.display(), "no import files found");
        return ImportSummary::empty();
    }

    let mut summary = ImportSummary {
        files_found: files.len(),
        ..ImportSummary::default()
    };

    let loads = load_all(config, files).await;

    let mut records: Vec<NewProduct> = Vec::new();
    for load in loads {
        if load.outcome.failure.is_some() {
            summary.files_failed += 1;
        }
        summary.records_valid += load.outcome.records_valid;
        summary.records_rejected += load.outcome.records_rejected;
        records.extend(load.products);
    }

    info!(
        files = summary.files_found,
        failed = summary.files_failed,
        valid = summary.records_valid,
        rejected = summary.records_rejected,
        "all import files loaded"
    );

    match save_unique(
        store.as_ref(),
        records,
        config.batch_size,
        config.on_chunk_failure,
    )
    .await
    {
        Ok(report) => {
            summary.total_saved = report.inserted;
            summary.duplicates_skipped = report.duplicates_skipped();
            if report.aborted {
                error!(
                    inserted = report.inserted,
                    "import aborted after a failed chunk"
                );
                summary.aborted = true;
                return summary;
            }
        }
        Err(err) => {
            error!(error = %err, "import failed while persisting products");
            return ImportSummary::empty();
        }
    }

    info!(total_saved = summary.total_saved, "product import finished");
    summary
}

/// Load every file concurrently and return the results in discovery order.
async fn load_all(config: &ImportConfig, files: Vec<ImportFile>) -> Vec<FileLoad> {
    load_all_with(config, files, |file, policy| async move {
        load_file(&file, policy).await
    })
    .await
}

async fn load_all_with<F, Fut>(config: &ImportConfig, files: Vec<ImportFile>, loader: F) -> Vec<FileLoad>
where
    F: Fn(ImportFile, InvalidRecordPolicy) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = FileLoad> + Send + 'static,
{
    let limit = config.worker_limit();
    let semaphore = Arc::new(Semaphore::new(limit));
    let timeout = config.file_timeout();
    let policy = config.on_invalid_record;

    info!(files = files.len(), workers = limit, "loading import files");

    let handles: Vec<(String, JoinHandle<FileLoad>)> = files
        .into_iter()
        .map(|file| {
            let semaphore = Arc::clone(&semaphore);
            let loader = loader.clone();
            let name = file.filename.clone();
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed.
                    Err(_) => return FileLoad::default(),
                };
                let filename = file.filename.clone();
                match timeout {
                    Some(limit) => match tokio::time::timeout(limit, loader(file, policy)).await {
                        Ok(load) => load,
                        Err(_) => {
                            let err = FileError::TimedOut {
                                file: filename.clone(),
                                secs: limit.as_secs(),
                            };
                            FileLoad::failed(&filename, &err)
                        }
                    },
                    None => loader(file, policy).await,
                }
            });
            (name, handle)
        })
        .collect();

    let mut loads = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        match handle.await {
            Ok(load) => loads.push(load),
            Err(join_err) => {
                error!(file = %name, error = %join_err, "import task panicked");
                let mut load = FileLoad::default();
                load.outcome.filename = name;
                load.outcome.failure = Some(join_err.to_string());
                loads.push(load);
            }
        }
    }
    loads
}

/// Fire-and-forget import used at server startup.
pub fn spawn_background_import(
    config: ImportConfig,
    store: Arc<dyn ProductStore>,
) -> JoinHandle<ImportSummary> {
    tokio::spawn(async move { run_import(&config, store).await })
}

/// `catalog import`: run the pipeline in the foreground and print a summary.
pub async fn run_import_command(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        let files = discover_files(&config.import)?;
        let loads = load_all(&config.import, files).await;

        println!("import (dry-run)");
        println!("  files found: {}", loads.len());
        for load in &loads {
            match &load.outcome.failure {
                Some(reason) => println!("  {}: failed ({})", load.outcome.filename, reason),
                None => println!(
                    "  {}: {} valid, {} rejected",
                    load.outcome.filename, load.outcome.records_valid, load.outcome.records_rejected
                ),
            }
        }
        let valid: usize = loads.iter().map(|l| l.outcome.records_valid).sum();
        println!("  valid records: {}", valid);
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let store: Arc<dyn ProductStore> = Arc::new(SqliteProductStore::new(pool.clone()));
    let summary = run_import(&config.import, store).await;

    println!("import");
    println!("  files found: {}", summary.files_found);
    println!("  files failed: {}", summary.files_failed);
    println!("  valid records: {}", summary.records_valid);
    println!("  rejected records: {}", summary.records_rejected);
    println!("  duplicates skipped: {}", summary.duplicates_skipped);
    println!("  inserted: {}", summary.total_saved);
    println!("{}", if summary.aborted { "aborted" } else { "ok" });

    pool.close().await;
    Ok(())
}
