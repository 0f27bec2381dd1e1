//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over `[logging] level`. Log lines go to stderr so
//! command summaries on stdout stay clean.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

