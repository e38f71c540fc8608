//! Storage metrics tracking
//!
//! Atomic counters for pool acquisition and transaction outcomes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Pool and transaction counters
#[derive(Debug)]
pub struct StorageMetrics {
    connections_acquired: AtomicU64,
    connections_timeout: AtomicU64,
    connections_error: AtomicU64,
    total_connection_time_ms: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    max_pool_size: u32,
}

impl StorageMetrics {
    pub fn new(max_pool_size: u32) -> Self {
        Self {
            connections_acquired: AtomicU64::new(0),
            connections_timeout: AtomicU64::new(0),
            connections_error: AtomicU64::new(0),
            total_connection_time_ms: AtomicU64::new(0),
            transactions_committed: AtomicU64::new(0),
            transactions_rolled_back: AtomicU64::new(0),
            max_pool_size,
        }
    }

    pub fn record_connection_acquired(&self, duration_ms: u64) {
        self.connections_acquired.fetch_add(1, Ordering::Relaxed);
        self.total_connection_time_ms.fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn record_connection_timeout(&self) {
        self.connections_timeout.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_error(&self) {
        self.connections_error.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a write transaction.
    pub fn record_transaction(&self, committed: bool) {
        if committed {
            self.transactions_committed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn avg_connection_time_ms(&self) -> u64 {
        let total = self.total_connection_time_ms.load(Ordering::Relaxed);
        let count = self.connections_acquired.load(Ordering::Relaxed);
        if count == 0 {
            0
        } else {
            total / count
        }
    }

    pub fn max_pool_size(&self) -> u32 {
        self.max_pool_size
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> PoolMetrics {
        PoolMetrics {
            connections_acquired: self.connections_acquired.load(Ordering::Relaxed),
            connections_timeout: self.connections_timeout.load(Ordering::Relaxed),
            connections_error: self.connections_error.load(Ordering::Relaxed),
            avg_acquisition_time_ms: self.avg_connection_time_ms(),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot returned by [`StorageMetrics::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMetrics {
    pub connections_acquired: u64,
    pub connections_timeout: u64,
    pub connections_error: u64,
    pub avg_acquisition_time_ms: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
}

/// Result of a pool health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub connections: usize,
    pub idle_connections: usize,
    pub max_connections: usize,
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn healthy(connections: usize, idle_connections: usize, max_connections: usize) -> Self {
        Self { healthy: true, connections, idle_connections, max_connections, message: None }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            connections: 0,
            idle_connections: 0,
            max_connections: 0,
            message: Some(message.into()),
        }
    }
}
