//! On-hand stock per product
//!
//! Stock only moves through effects: receiving credits it, shipping debits
//! it. Levels may go negative when goods ship before they are received.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use tradeflow_domain::{EntityKind, InventoryLevel, Result};

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::store::{InventoryRepository, Write, WriteBatch};

pub struct InventoryService {
    repo: Arc<dyn InventoryRepository>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
}

impl InventoryService {
    pub fn new(repo: Arc<dyn InventoryRepository>, audit: Arc<AuditLog>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, audit, clock }
    }

    /// Writes moving `delta` units of `product_ref`, attributed to `source_id`.
    pub async fn prepare_adjust(
        &self,
        product_ref: &str,
        delta: Decimal,
        source_id: &str,
        actor: &str,
    ) -> Result<WriteBatch> {
        let verb = if delta.is_sign_negative() { "debited" } else { "credited" };
        let mut batch = WriteBatch::new().with(Write::StockAdjustment {
            product_ref: product_ref.to_string(),
            delta,
            at: self.clock.now(),
        });
        let snapshot = json!({ "product_ref": product_ref, "delta": delta, "source_id": source_id });
        let draft = EventDraft::new(actor, EntityKind::Inventory, product_ref, verb).after(&snapshot)?;
        self.audit.record(&mut batch, draft).await?;
        Ok(batch)
    }

    /// Units on hand; zero for a product never stocked.
    pub async fn on_hand(&self, product_ref: &str) -> Result<Decimal> {
        Ok(self.repo.stock_level(product_ref).await?.map_or(Decimal::ZERO, |l| l.on_hand))
    }

    pub async fn levels(&self) -> Result<Vec<InventoryLevel>> {
        self.repo.stock_levels().await
    }
}
