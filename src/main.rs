//! # Product Catalog CLI (`catalog`)
//!
//! The `catalog` binary initializes the database, runs the JSON batch
//! importer, serves the REST API, and manages users.
//!
//! ## Usage
//!
//! ```bash
//! catalog --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog init` | Create the SQLite database and run schema migrations |
//! | `catalog import` | Import `data_*.json` files in the foreground |
//! | `catalog serve` | Start the HTTP server (and the startup import) |
//! | `catalog stats` | Print catalog statistics |
//! | `catalog user add` | Create a user account |
//!
//! ## Examples
//!
//! ```bash
//! catalog init
//! catalog import --dry-run
//! catalog user add admin admin@example.com --password changeme --role ADMIN
//! catalog serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use product_catalog::{config, import, logging, migrate, server, stats, users};

/// Product Catalog: a REST product service with a concurrent JSON importer.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/catalog.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "catalog", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run more than once.
    Init,

    /// Import product files from `[import].root`.
    Import {
        /// Parse and validate only; nothing is written.
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the HTTP server.
    Serve,

    /// Show product and user counts.
    Stats,

    /// Manage user accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user.
    Add {
        username: String,
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "")]
        full_name: String,

        /// Repeatable; defaults to USER.
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { dry_run } => {
            import::run_import_command(&cfg, dry_run).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::User {
            action:
                UserAction::Add {
                    username,
                    email,
                    password,
                    full_name,
                    roles,
                },
        } => {
            let pool = product_catalog::db::connect(&cfg).await?;
            migrate::apply(&pool).await?;
            let repo = users::UserRepository::new(pool.clone());
            let user = users::register(
                &repo,
                users::RegisterRequest {
                    username,
                    full_name,
                    email,
                    password,
                    roles,
                },
            )
            .await?;
            println!("user {} created (roles: {})", user.username, user.roles.join(","));
            pool.close().await;
        }
    }

    Ok(())
}
