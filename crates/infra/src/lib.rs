//! # Tradeflow Infrastructure
//!
//! Adapters for the ports defined in `tradeflow-core`:
//! - SQLite persistence for every repository and the unit of work
//! - Layered configuration loading (environment + TOML/JSON file)
//! - `tracing` subscriber setup
//! - JSON exchange-rate file import
//!
//! All I/O lives here; `tradeflow-core` never sees SQL.

pub mod config;
pub mod database;
pub mod errors;
pub mod observability;
pub mod rates;

use std::sync::Arc;

use tradeflow_core::Stores;
use tradeflow_domain::{DatabaseConfig, Result};

pub use config::ConfigLoader;
pub use database::{DbManager, SqliteStore, SCHEMA_VERSION};
pub use errors::InfraError;
pub use observability::{init_tracing, LoggingGuard};
pub use rates::{import_rate_file, parse_rate_file, read_rate_file};

/// Open the configured database, bring its schema up to date and wire every
/// port to it.
pub fn open_store(config: &DatabaseConfig) -> Result<(Arc<SqliteStore>, Stores)> {
    let db = DbManager::from_config(config)?;
    db.run_migrations()?;
    let store = Arc::new(SqliteStore::new(Arc::new(db)));
    let stores = Stores::from_single(Arc::clone(&store));
    Ok((store, stores))
}
