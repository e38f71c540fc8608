//! Per-aggregate exclusive locks
//!
//! Commands lock the aggregate root they mutate (one quotation, one workflow,
//! one approval request, one invoice) for the duration of the command.
//! Unrelated aggregates never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
pub struct AggregateLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AggregateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lock named `key` until the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(key.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        debug!(lock = key, "aggregate lock acquired");
        guard
    }

    /// Drop lock entries nobody is holding or waiting on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Lock names for the aggregate roots.
pub mod keys {
    pub fn quotation(id: &str) -> String {
        format!("quotation:{id}")
    }

    pub fn workflow(id: &str) -> String {
        format!("workflow:{id}")
    }

    pub fn approval(id: &str) -> String {
        format!("approval:{id}")
    }

    pub fn invoice(id: &str) -> String {
        format!("invoice:{id}")
    }

    pub fn purchase_order(id: &str) -> String {
        format!("purchase_order:{id}")
    }

    /// Guards "one pending request per target".
    pub fn approval_target(target_ref: &str) -> String {
        format!("approval-target:{target_ref}")
    }

    /// Purchase order and invoice raised by one workflow.
    pub fn workflow_documents(workflow_id: &str) -> String {
        format!("workflow-docs:{workflow_id}")
    }

    pub fn product_code(code: &str) -> String {
        format!("product-code:{code}")
    }

    pub fn effects(source_id: &str) -> String {
        format!("effects:{source_id}")
    }

    pub fn id_family(scope: &str) -> String {
        format!("ids:{scope}")
    }

    pub fn reference(kind: &str, id: &str) -> String {
        format!("reference:{kind}:{id}")
    }
}
