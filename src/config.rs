use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[auth].jwt_secret`.
pub const JWT_SECRET_ENV: &str = "CATALOG_JWT_SECRET";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Base64-encoded HMAC key used to sign access tokens.
    pub jwt_secret: String,
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: i64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_expiration_secs() -> i64 {
    86_400
}
fn default_issuer() -> String {
    "product-catalog".to_string()
}
fn default_audience() -> String {
    "product-catalog-api".to_string()
}

impl AuthConfig {
    /// Decoded signing key bytes.
    pub fn secret_bytes(&self) -> Result<Vec<u8>> {
        general_purpose::STANDARD
            .decode(self.jwt_secret.trim())
            .context("auth.jwt_secret must be valid base64")
    }
}

/// What the file loader does with a record that fails validation.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRecordPolicy {
    /// Log the record and keep going with the rest of the file.
    #[default]
    Skip,
    /// Discard the whole file on the first invalid record.
    AbortFile,
}

/// What bulk persistence does when one insert chunk fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkFailurePolicy {
    #[default]
    Continue,
    Abort,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_import_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Run the importer in the background when `catalog serve` starts.
    #[serde(default = "default_true")]
    pub on_startup: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Explicit worker ceiling. Falls back to cores × `concurrency_multiplier`.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default = "default_concurrency_multiplier")]
    pub concurrency_multiplier: usize,
    /// Upper bound for loading a single file. `0` disables the bound.
    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,
    #[serde(default)]
    pub on_invalid_record: InvalidRecordPolicy,
    #[serde(default)]
    pub on_chunk_failure: ChunkFailurePolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            root: default_import_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            on_startup: true,
            batch_size: default_batch_size(),
            max_concurrency: None,
            concurrency_multiplier: default_concurrency_multiplier(),
            file_timeout_secs: default_file_timeout_secs(),
            on_invalid_record: InvalidRecordPolicy::default(),
            on_chunk_failure: ChunkFailurePolicy::default(),
        }
    }
}

fn default_import_root() -> PathBuf {
    PathBuf::from("data")
}
fn default_include_globs() -> Vec<String> {
    vec!["data_*.json".to_string(), "**/data_*.json".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_batch_size() -> usize {
    100
}
fn default_concurrency_multiplier() -> usize {
    2
}
fn default_file_timeout_secs() -> u64 {
    30
}

impl ImportConfig {
    /// Number of files loaded at the same time.
    pub fn worker_limit(&self) -> usize {
        if let Some(n) = self.max_concurrency {
            return n.max(1);
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cores * self.concurrency_multiplier).max(1)
    }

    pub fn file_timeout(&self) -> Option<std::time::Duration> {
        if self.file_timeout_secs == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.file_timeout_secs))
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info,sqlx=warn".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
        if !secret.trim().is_empty() {
            config.auth.jwt_secret = secret;
        }
    }

    // Validate auth
    let key = config.auth.secret_bytes()?;
    if key.len() < 32 {
        anyhow::bail!("auth.jwt_secret must decode to at least 32 bytes");
    }
    if config.auth.expiration_secs <= 0 {
        anyhow::bail!("auth.expiration_secs must be > 0");
    }

    // Validate import
    if config.import.batch_size == 0 {
        anyhow::bail!("import.batch_size must be > 0");
    }
    if config.import.concurrency_multiplier == 0 {
        anyhow::bail!("import.concurrency_multiplier must be >= 1");
    }
    if config.import.include_globs.is_empty() {
        anyhow::bail!("import.include_globs must list at least one pattern");
    }

    match config.logging.format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("Unknown logging format: '{}'. Must be text or json.", other),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    fn minimal(extra: &str) -> String {
        format!(
            r#"
[db]
path = "catalog.sqlite"

[server]
bind = "127.0.0.1:8080"

[auth]
jwt_secret = "{}"
{}
"#,
            SECRET, extra
        )
    }

    #[test]
    fn defaults_apply() {
        let cfg = parse_config(&minimal("")).unwrap();
        assert_eq!(cfg.import.batch_size, 100);
        assert_eq!(cfg.import.root, PathBuf::from("data"));
        assert_eq!(cfg.import.on_invalid_record, InvalidRecordPolicy::Skip);
        assert_eq!(cfg.import.on_chunk_failure, ChunkFailurePolicy::Continue);
        assert!(cfg.import.on_startup);
        assert!(cfg.import.worker_limit() >= 2);
        assert_eq!(cfg.auth.expiration_secs, 86_400);
    }

    #[test]
    fn policies_parse() {
        let cfg = parse_config(&minimal(
            "[import]\non_invalid_record = \"abort_file\"\non_chunk_failure = \"abort\"\nmax_concurrency = 3",
        ))
        .unwrap();
        assert_eq!(cfg.import.on_invalid_record, InvalidRecordPolicy::AbortFile);
        assert_eq!(cfg.import.on_chunk_failure, ChunkFailurePolicy::Abort);
        assert_eq!(cfg.import.worker_limit(), 3);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = parse_config(&minimal("[import]\nbatch_size = 0")).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn rejects_short_secret() {
        let content = minimal("").replace(SECRET, "c2hvcnQ=");
        assert!(parse_config(&content).is_err());
    }
}
