//! # Product Catalog
//!
//! A product catalog REST service with JWT authentication and a concurrent
//! JSON batch importer.
//!
//! At startup the importer discovers `data_*.json` files, loads and
//! validates them on parallel tokio tasks, removes duplicates by
//! `(name, type)` both within the batch and against the store, and inserts
//! the rest in fixed-size chunks. The HTTP listener does not wait for it.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Discovery  │──▶│ Loader ×N    │──▶│ Dedup +      │──▶│  SQLite  │
//! │ walk+globs │   │ parse+valid. │   │ chunked save │   │ products │
//! └────────────┘   └──────────────┘   └──────────────┘   └────┬─────┘
//!                                                             │
//!                                   ┌─────────────────────────┤
//!                                   ▼                         ▼
//!                              ┌──────────┐             ┌──────────┐
//!                              │   CLI    │             │   HTTP   │
//!                              │(catalog) │             │ JWT+CRUD │
//!                              └──────────┘             └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! catalog init                  # create database
//! catalog import                # import data/data_*.json
//! catalog user add alice alice@example.com --password secret1
//! catalog serve                 # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`price`] | Currency string parsing |
//! | [`validate`] | Import record validation |
//! | [`discovery`] | Import file discovery |
//! | [`loader`] | Per-file parsing and validation |
//! | [`persist`] | Deduplication and chunked inserts |
//! | [`import`] | Import orchestration |
//! | [`store`] | Product storage backends |
//! | [`products`] | Product CRUD and search |
//! | [`auth`] | Tokens, password hashing, auth middleware |
//! | [`users`] | Accounts, registration and login |
//! | [`server`] | HTTP server |
//! | [`stats`] | Catalog statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing subscriber setup |

pub mod auth;
pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod import;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod persist;
pub mod price;
pub mod products;
pub mod server;
pub mod stats;
pub mod store;
pub mod users;
pub mod validate;
