//! SQLite connection pool

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::config::SqlitePoolConfig;
use super::connection::SqliteConnection;
use super::pragmas::apply_connection_pragmas;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::metrics::{HealthStatus, StorageMetrics};

/// r2d2 pool of SQLite connections with pragmas applied on open.
#[derive(Debug)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlitePoolConfig,
    metrics: Arc<StorageMetrics>,
    path: PathBuf,
}

impl SqlitePool {
    /// Open (or create) the database file at `path` and build the pool.
    ///
    /// One connection is checked out before returning so a bad path or a
    /// corrupt file fails here instead of on first use.
    #[instrument(fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(path: &Path, config: SqlitePoolConfig) -> StorageResult<Self> {
        info!("creating sqlite connection pool");

        let metrics = Arc::new(StorageMetrics::new(config.max_size));
        let pool_config = config.clone();
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("failed to create connection pool: {e}");
                StorageError::Connection(format!("Failed to create pool: {e}"))
            })?;

        pool.get()
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {e}")))?;

        info!(max_connections = config.max_size, "sqlite pool ready");
        Ok(Self { pool, config, metrics, path: path.to_path_buf() })
    }

    /// Check out a connection, recording acquisition latency.
    pub fn get_connection(&self) -> StorageResult<SqliteConnection> {
        let start = Instant::now();
        match self.pool.get() {
            Ok(conn) => {
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                self.metrics.record_connection_acquired(duration_ms);
                debug!("connection acquired in {}ms", duration_ms);
                Ok(SqliteConnection::new(conn, Arc::clone(&self.metrics)))
            }
            Err(e) => {
                if e.to_string().to_lowercase().contains("timed out") {
                    self.metrics.record_connection_timeout();
                    warn!("connection timeout after {:?}", self.config.connection_timeout);
                    Err(StorageError::Timeout(self.config.connection_timeout.as_secs()))
                } else {
                    self.metrics.record_connection_error();
                    warn!("connection error: {e}");
                    Err(StorageError::Connection(format!("Failed to get connection: {e}")))
                }
            }
        }
    }

    pub fn health_check(&self) -> HealthStatus {
        let state = self.pool.state();
        match self.pool.get() {
            Ok(conn) => match conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
                Ok(_) => HealthStatus::healthy(
                    state.connections as usize,
                    state.idle_connections as usize,
                    self.config.max_size as usize,
                ),
                Err(e) => HealthStatus::unhealthy(format!("Probe query failed: {e}")),
            },
            Err(e) => HealthStatus::unhealthy(format!("Pool unhealthy: {e}")),
        }
    }

    pub fn metrics(&self) -> &Arc<StorageMetrics> {
        &self.metrics
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
