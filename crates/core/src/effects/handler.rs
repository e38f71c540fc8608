//! Effect handler seam

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tradeflow_domain::{EffectKind, EffectRecord, Result};

use super::handlers::{BuiltinHandler, BUILTIN_KINDS};
use crate::cashflow::CashLedger;
use crate::clock::Clock;
use crate::inventory::InventoryService;
use crate::invoice::InvoiceService;
use crate::procurement::PurchaseOrderService;
use crate::quotation::QuotationService;
use crate::sales::SalesLedger;
use crate::store::{Stores, WriteBatch};
use crate::workflow::WorkflowService;

/// Services an effect handler may build writes with.
#[derive(Clone)]
pub struct EffectContext {
    pub stores: Stores,
    pub quotations: Arc<QuotationService>,
    pub workflows: Arc<WorkflowService>,
    pub invoices: Arc<InvoiceService>,
    pub purchasing: Arc<PurchaseOrderService>,
    pub inventory: Arc<InventoryService>,
    pub cash: Arc<CashLedger>,
    pub sales: Arc<SalesLedger>,
    pub clock: Arc<dyn Clock>,
}

/// Applies one kind of effect.
///
/// `apply` returns the writes of the effect without committing them; the
/// dispatcher commits them together with the effect's completion so an
/// effect is either fully applied and marked done, or neither.
#[async_trait]
pub trait EffectHandler: Send + Sync {
    /// Aggregate lock held while the effect is applied.
    fn lock_key(&self, record: &EffectRecord) -> Option<String>;

    async fn apply(&self, ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch>;
}

/// Handler per effect kind.
#[derive(Clone)]
pub struct EffectHandlerRegistry {
    handlers: HashMap<EffectKind, Arc<dyn EffectHandler>>,
}

impl EffectHandlerRegistry {
    /// Registry with the built-in handler for every kind.
    pub fn builtin() -> Self {
        let handlers = BUILTIN_KINDS
            .into_iter()
            .map(|kind| (kind, Arc::new(BuiltinHandler::new(kind)) as Arc<dyn EffectHandler>))
            .collect();
        Self { handlers }
    }

    /// Replace the handler of `kind`.
    pub fn with_handler(mut self, kind: EffectKind, handler: Arc<dyn EffectHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn get(&self, kind: EffectKind) -> Option<Arc<dyn EffectHandler>> {
        self.handlers.get(&kind).cloned()
    }
}

impl Default for EffectHandlerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
