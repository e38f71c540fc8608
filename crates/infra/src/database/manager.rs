//! Database connection manager backed by the shared SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::params;
use tracing::info;
use tradeflow_common::storage::{HealthStatus, SqliteConnection, SqlitePool, SqlitePoolConfig};
use tradeflow_domain::{DatabaseConfig, Result, TradeflowError};

use crate::errors::{storage_error, InfraError};

/// Version recorded in `schema_version` by [`DbManager::run_migrations`].
pub const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps a [`SqlitePool`].
pub struct DbManager {
    pool: Arc<SqlitePool>,
    path: PathBuf,
}

impl DbManager {
    /// Open the database at `db_path` with the pool settings of `config`.
    pub fn new<P: AsRef<Path>>(db_path: P, config: &DatabaseConfig) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let pool_config = SqlitePoolConfig::new(config.pool_size, config.busy_timeout_ms);
        let pool = SqlitePool::new(&path, pool_config).map_err(storage_error)?;

        info!(
            db_path = %path.display(),
            max_connections = pool.metrics().max_pool_size(),
            "sqlite pool initialised"
        );

        Ok(Self { pool: Arc::new(pool), path })
    }

    /// Open the database named by `config.path`.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&config.path, config)
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get_connection().map_err(storage_error)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)?;
        info!(version = SCHEMA_VERSION, "schema up to date");
        Ok(())
    }

    /// Highest applied schema version, `None` on an uninitialised file.
    pub fn schema_version(&self) -> Result<Option<i32>> {
        let conn = self.get_connection()?;
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
                params![],
                |row| row.get(0),
            )
            .map_err(map_sql_error)?;
        if !exists {
            return Ok(None);
        }
        conn.query_row("SELECT MAX(version) FROM schema_version", params![], |row| row.get(0))
            .map_err(map_sql_error)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the database answers a probe query.
    pub fn health_check(&self) -> Result<HealthStatus> {
        let status = self.pool.health_check();
        if status.healthy {
            Ok(status)
        } else {
            Err(TradeflowError::storage(
                status.message.unwrap_or_else(|| "database unhealthy".to_string()),
            ))
        }
    }
}

fn create_schema(conn: &SqliteConnection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn map_sql_error(err: rusqlite::Error) -> TradeflowError {
    TradeflowError::from(InfraError::from(err))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn manager(dir: &TempDir) -> DbManager {
        let config = DatabaseConfig { pool_size: 2, ..DatabaseConfig::default() };
        DbManager::new(dir.path().join("test.db"), &config).expect("manager created")
    }

    #[test]
    fn migrations_create_schema_version() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = manager(&temp_dir);
        assert_eq!(manager.schema_version().unwrap(), None);

        manager.run_migrations().expect("migrations run");
        assert_eq!(manager.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn migrations_are_idempotent() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = manager(&temp_dir);
        manager.run_migrations().expect("first run");
        manager.run_migrations().expect("second run");

        let conn = manager.get_connection().unwrap();
        let rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn health_check_succeeds_for_valid_database() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = manager(&temp_dir);
        manager.run_migrations().expect("migrations run");

        let health = manager.health_check().expect("health check passed");
        assert_eq!(health.max_connections, 2);
    }

    #[test]
    fn missing_directory_is_a_storage_error() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let path = temp_dir.path().join("missing").join("test.db");
        let err = DbManager::new(path, &DatabaseConfig::default()).err().unwrap();
        assert_eq!(err.kind(), "storage_error");
    }
}
