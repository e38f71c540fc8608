//! Integration tests for the pooled SQLite storage layer.

use std::sync::Arc;

use tempfile::TempDir;
use tradeflow_common::storage::{SqlitePool, SqlitePoolConfig, StorageError};
use tradeflow_common::ErrorClassification;

fn open(dir: &TempDir) -> SqlitePool {
    SqlitePool::new(&dir.path().join("integration.db"), SqlitePoolConfig::new(4, 2000)).unwrap()
}

#[test]
fn unique_violation_surfaces_as_constraint_error() {
    let dir = TempDir::new().unwrap();
    let pool = open(&dir);
    let mut conn = pool.get_connection().unwrap();
    conn.execute_batch("CREATE TABLE ids (id TEXT PRIMARY KEY)").unwrap();

    conn.write_transaction(|tx| {
        tx.execute("INSERT INTO ids (id) VALUES ('Q202503001')", [])?;
        Ok(())
    })
    .unwrap();

    let err = conn
        .write_transaction(|tx| {
            tx.execute("INSERT INTO ids (id) VALUES ('Q202503001')", [])?;
            Ok(())
        })
        .unwrap_err();
    assert!(err.is_constraint_violation());
    assert!(!err.is_retryable());
}

#[test]
fn rolled_back_batch_leaves_no_partial_rows() {
    let dir = TempDir::new().unwrap();
    let pool = open(&dir);
    let mut conn = pool.get_connection().unwrap();
    conn.execute_batch("CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount INTEGER NOT NULL)")
        .unwrap();

    let result: Result<(), StorageError> = conn.write_transaction(|tx| {
        tx.execute("INSERT INTO ledger (amount) VALUES (100)", [])?;
        tx.execute("INSERT INTO ledger (amount) VALUES (NULL)", [])?;
        Ok(())
    });
    assert!(result.is_err());

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledger", [], |row| row.get(0)).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn data_survives_pool_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let pool = open(&dir);
        let conn = pool.get_connection().unwrap();
        conn.execute_batch("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT); INSERT INTO kv VALUES ('a', 'b');")
            .unwrap();
    }

    let pool = Arc::new(open(&dir));
    let conn = pool.get_connection().unwrap();
    let value: String = conn.query_row("SELECT v FROM kv WHERE k = 'a'", [], |row| row.get(0)).unwrap();
    assert_eq!(value, "b");
}
