//! Repository and unit-of-work port traits

use async_trait::async_trait;
use chrono::NaiveDate;
use tradeflow_domain::{
    ApprovalFilter, ApprovalRequest, CashFilter, CashTransaction, Currency, EffectRecord,
    EffectStatus, EntityKind, Event, ExchangeRate, InventoryLevel, Invoice, InvoiceFilter,
    PurchaseOrder, Quotation, QuotationFilter, ReferenceFilter, ReferenceKind, ReferenceRecord,
    RegisteredProductCode, Result, SalesFilter, SalesForecast, SalesRecord, SalesTarget,
    Workflow, WorkflowFilter, YearMonth,
};

use super::batch::WriteBatch;

/// Applies a batch of writes atomically: all of them or none.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn get_quotation(&self, id: &str) -> Result<Option<Quotation>>;
    async fn list_quotations(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>>;
}

#[async_trait]
pub trait PurchaseOrderRepository: Send + Sync {
    async fn get_purchase_order(&self, id: &str) -> Result<Option<PurchaseOrder>>;
    async fn find_purchase_order_by_workflow(&self, workflow_id: &str) -> Result<Option<PurchaseOrder>>;
    async fn list_purchase_orders(&self, quotation_ref: Option<&str>) -> Result<Vec<PurchaseOrder>>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>>;
    async fn find_invoice_by_workflow(&self, workflow_id: &str) -> Result<Option<Invoice>>;
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>>;
    /// The non-cancelled workflow of a quotation, if any.
    async fn find_active_workflow(&self, quotation_ref: &str) -> Result<Option<Workflow>>;
    async fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>>;
    async fn find_pending_approval(&self, target_ref: &str) -> Result<Option<ApprovalRequest>>;
    async fn list_approvals(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>>;
}

#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    async fn get_reference(&self, kind: ReferenceKind, id: &str) -> Result<Option<ReferenceRecord>>;
    async fn list_reference(
        &self,
        kind: ReferenceKind,
        filter: &ReferenceFilter,
    ) -> Result<Vec<ReferenceRecord>>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn stock_level(&self, product_ref: &str) -> Result<Option<InventoryLevel>>;
    async fn stock_levels(&self) -> Result<Vec<InventoryLevel>>;
}

#[async_trait]
pub trait CashLedgerRepository: Send + Sync {
    async fn get_cash(&self, id: &str) -> Result<Option<CashTransaction>>;
    async fn list_cash(&self, filter: &CashFilter) -> Result<Vec<CashTransaction>>;
}

#[async_trait]
pub trait SalesRepository: Send + Sync {
    async fn list_sales(&self, filter: &SalesFilter) -> Result<Vec<SalesRecord>>;
    async fn list_forecasts(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesForecast>>;
    async fn list_targets(&self, year_month: YearMonth) -> Result<Vec<SalesTarget>>;
}

#[async_trait]
pub trait EffectRepository: Send + Sync {
    /// Effects planned for one source, in ordinal order.
    async fn effects_for_source(&self, source_id: &str) -> Result<Vec<EffectRecord>>;
    async fn effects_with_status(&self, status: EffectStatus) -> Result<Vec<EffectRecord>>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Events of one entity in ascending `seq` order.
    async fn history(&self, kind: EntityKind, id: &str) -> Result<Vec<Event>>;
    /// The latest `limit` events, newest last.
    async fn recent(&self, limit: usize) -> Result<Vec<Event>>;
    /// Reserve `size` sequence numbers; returns the first one. Blocks never
    /// overlap, even across restarts.
    async fn reserve_seq_block(&self, size: u32) -> Result<u64>;
}

#[async_trait]
pub trait SequenceRepository: Send + Sync {
    /// Increment and return the counter named `scope`; the first call
    /// returns 1.
    async fn next_counter(&self, scope: &str) -> Result<u32>;
}

#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Latest rate dated on or before `date`.
    async fn rate_on_or_before(&self, currency: Currency, date: NaiveDate) -> Result<Option<ExchangeRate>>;
    async fn rates_between(
        &self,
        currency: Currency,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExchangeRate>>;
}

#[async_trait]
pub trait ProductCodeRepository: Send + Sync {
    async fn get_product_code(&self, code: &str) -> Result<Option<RegisteredProductCode>>;
    async fn list_product_codes(&self, family: Option<&str>) -> Result<Vec<RegisteredProductCode>>;
}
