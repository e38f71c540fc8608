//! Pooled SQLite storage primitives
//!
//! Connection pooling, per-connection pragmas and transaction helpers shared
//! by the persistence adapters.

pub mod error;
pub mod metrics;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use metrics::{HealthStatus, PoolMetrics, StorageMetrics};
pub use sqlite::{apply_connection_pragmas, SqliteConnection, SqlitePool, SqlitePoolConfig};
