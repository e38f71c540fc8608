//! Pooled connection wrapper

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, instrument};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::metrics::StorageMetrics;

/// A connection checked out of a [`super::SqlitePool`]. Returned to the pool
/// on drop.
pub struct SqliteConnection {
    inner: PooledConnection<SqliteConnectionManager>,
    metrics: Arc<StorageMetrics>,
}

impl SqliteConnection {
    pub(crate) fn new(
        inner: PooledConnection<SqliteConnectionManager>,
        metrics: Arc<StorageMetrics>,
    ) -> Self {
        Self { inner, metrics }
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise. Taking the write
    /// lock up front means a busy database fails at `BEGIN` rather than
    /// half-way through the batch.
    #[instrument(skip_all)]
    pub fn write_transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StorageResult<T>,
    {
        let metrics = Arc::clone(&self.metrics);
        let tx = self
            .inner
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        let result = match f(&tx) {
            Ok(value) => tx.commit().map(|()| value).map_err(StorageError::from),
            Err(err) => Err(err),
        };

        metrics.record_transaction(result.is_ok());
        if let Err(err) = &result {
            debug!(error = %err, "write transaction rolled back");
        }
        result
    }
}

impl Deref for SqliteConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for SqliteConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::storage::sqlite::{SqlitePool, SqlitePoolConfig};

    fn pool(dir: &TempDir) -> SqlitePool {
        SqlitePool::new(&dir.path().join("conn.db"), SqlitePoolConfig::default()).unwrap()
    }

    #[test]
    fn committed_transaction_is_visible() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir);
        let mut conn = pool.get_connection().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

        conn.write_transaction(|tx| {
            tx.execute("INSERT INTO t (id) VALUES (1)", [])?;
            Ok(())
        })
        .unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
        assert_eq!(pool.metrics().snapshot().transactions_committed, 1);
    }

    #[test]
    fn failed_closure_rolls_back() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir);
        let mut conn = pool.get_connection().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

        let result: StorageResult<()> = conn.write_transaction(|tx| {
            tx.execute("INSERT INTO t (id) VALUES (1)", [])?;
            Err(StorageError::Query("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
        assert_eq!(pool.metrics().snapshot().transactions_rolled_back, 1);
    }
}
