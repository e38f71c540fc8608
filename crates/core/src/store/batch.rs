//! Writes collected by a command and committed as one transaction

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tradeflow_domain::{
    ApprovalRequest, CashTransaction, EffectRecord, Event, ExchangeRate, Invoice, PurchaseOrder,
    Quotation, ReferenceKind, ReferenceRecord, RegisteredProductCode, SalesForecast, SalesRecord,
    SalesTarget, Workflow,
};

/// One durable write.
///
/// Aggregates are upserted by id. Ledger rows (`Cash`, `Event`) are insert
/// only; `Sales`, `PlanEffect` and `ProductCode` are insert-or-ignore on
/// their natural keys so replays are harmless.
#[derive(Debug, Clone)]
pub enum Write {
    Quotation(Quotation),
    PurchaseOrder(PurchaseOrder),
    Invoice(Invoice),
    Workflow(Workflow),
    Approval(ApprovalRequest),
    Reference(ReferenceRecord),
    DeleteReference { kind: ReferenceKind, id: String },
    StockAdjustment { product_ref: String, delta: Decimal, at: DateTime<Utc> },
    Cash(CashTransaction),
    Sales(SalesRecord),
    SalesForecast(SalesForecast),
    SalesTarget(SalesTarget),
    /// Insert a planned effect unless its key already exists.
    PlanEffect(EffectRecord),
    /// Overwrite the status of an existing effect.
    Effect(EffectRecord),
    ProductCode(RegisteredProductCode),
    ExchangeRate(ExchangeRate),
    Event(Event),
}

#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    pub fn with(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    pub fn append(&mut self, other: WriteBatch) {
        self.writes.extend(other.writes);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Write> {
        self.writes.iter()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.writes.iter().filter_map(|w| match w {
            Write::Event(event) => Some(event),
            _ => None,
        })
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

impl IntoIterator for WriteBatch {
    type Item = Write;
    type IntoIter = std::vec::IntoIter<Write>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

impl Extend<Write> for WriteBatch {
    fn extend<T: IntoIterator<Item = Write>>(&mut self, iter: T) {
        self.writes.extend(iter);
    }
}
