//! SQLite pool configuration

use std::time::Duration;

/// r2d2 and pragma settings for a [`super::SqlitePool`]
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,

    /// How long to wait for a free connection
    pub connection_timeout: Duration,

    /// SQLite busy handler timeout
    pub busy_timeout: Duration,

    pub enable_wal: bool,

    pub enable_foreign_keys: bool,
}

impl SqlitePoolConfig {
    pub fn new(max_size: u32, busy_timeout_ms: u64) -> Self {
        Self {
            max_size: max_size.max(1),
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            ..Self::default()
        }
    }
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}
