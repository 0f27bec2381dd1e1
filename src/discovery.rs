//! Import file discovery.
//!
//! Walks `[import].root` and keeps every regular file whose path relative
//! to the root matches an include glob and no exclude glob.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::ImportConfig;

/// A file selected for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub path: PathBuf,
    /// Path relative to the import root, used in log lines.
    pub filename: String,
}

pub fn discover_files(config: &ImportConfig) -> Result<Vec<ImportFile>> {
    let root = &config.root;
    if !root.is_dir() {
        bail!("Import root does not exist or is not a directory: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(ImportFile {
            path: path.to_path_buf(),
            filename: rel_str,
        });
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
