//! Command and query facade
//!
//! [`BusinessEngine`] wires every service from one [`Stores`] bundle and an
//! [`EngineConfig`], and is the only type the transport layers talk to.
//! Commands that plan effects dispatch them once the aggregate lock of the
//! command is released; a failing effect surfaces as `PartialEffectFailure`
//! while the command itself stays committed.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};
use tradeflow_domain::{
    ApprovalFilter, ApprovalRequest, ApprovalType, CashFilter, CashPosting, CashSummary,
    CashTransaction, CompletionStats, Currency, Decision, DeleteMode, EffectKind, EffectRecord,
    EffectReport, Employee, EngineConfig, EntityKind, Event, ExchangeRate, InventoryLevel,
    Invoice, InvoiceFilter, Money, MonthlyCashPoint, NewApprovalRequest, PaymentMethod, Period,
    Priority, ProductCode, PurchaseOrder, Quotation, QuotationFilter, QuotationPayload,
    ReferenceFilter, ReferenceKind, ReferenceRecord, RegisteredProductCode, Result, SalesFilter,
    SalesForecast, SalesRecord, SalesRollup, SalesTarget, StageBucket, StockLevel, TargetRow,
    ThresholdSource, Workflow, WorkflowFilter, YearMonth,
};

use crate::approval::{ApprovalService, Decided, DefaultRoutingPolicy, RoutingPolicy};
use crate::audit::AuditLog;
use crate::auth::Authenticator;
use crate::cashflow::CashLedger;
use crate::catalog::ProductCatalog;
use crate::clock::{Clock, SystemClock};
use crate::currency::RateService;
use crate::effects::{EffectContext, EffectDispatcher, EffectHandler, EffectHandlerRegistry};
use crate::ids::IdService;
use crate::inventory::InventoryService;
use crate::invoice::{InvoiceService, PaymentRecorded};
use crate::locks::AggregateLocks;
use crate::procurement::PurchaseOrderService;
use crate::projections::Projections;
use crate::quotation::QuotationService;
use crate::reference::{ReferenceCache, ReferenceCacheConfig, ReferenceService};
use crate::sales::SalesLedger;
use crate::store::Stores;
use crate::workflow::{Transitioned, WorkflowService};

/// Builder for [`BusinessEngine`].
pub struct EngineBuilder {
    stores: Stores,
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    routing: Option<Arc<dyn RoutingPolicy>>,
    handlers: Vec<(EffectKind, Arc<dyn EffectHandler>)>,
}

impl EngineBuilder {
    pub fn new(stores: Stores, config: EngineConfig) -> Self {
        Self { stores, config, clock: None, routing: None, handlers: Vec::new() }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the default approver routing.
    pub fn routing_policy(mut self, policy: Arc<dyn RoutingPolicy>) -> Self {
        self.routing = Some(policy);
        self
    }

    /// Replace the built-in handler of one effect kind.
    pub fn effect_handler(mut self, kind: EffectKind, handler: Arc<dyn EffectHandler>) -> Self {
        self.handlers.push((kind, handler));
        self
    }

    pub fn build(self) -> BusinessEngine {
        let Self { stores, config, clock, routing, handlers } = self;
        let config = Arc::new(config);
        let clock: Arc<dyn Clock> = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let locks = Arc::new(AggregateLocks::new());

        let audit = Arc::new(AuditLog::new(stores.events.clone(), clock.clone(), config.event_block_size));
        let ids = Arc::new(IdService::new(stores.sequences.clone(), locks.clone()));
        let rates = Arc::new(RateService::new(stores.rates.clone(), stores.uow.clone(), audit.clone()));
        let cache = ReferenceCache::new(ReferenceCacheConfig::new(
            config.reference_cache_ttl_secs,
            config.reference_cache_capacity,
        ));
        let reference = Arc::new(ReferenceService::new(
            stores.reference.clone(),
            stores.uow.clone(),
            cache,
            ids.clone(),
            audit.clone(),
            locks.clone(),
            clock.clone(),
        ));
        let routing = routing.unwrap_or_else(|| {
            Arc::new(DefaultRoutingPolicy::new(config.approval.clone(), reference.clone()))
        });

        let cash = Arc::new(CashLedger::new(
            stores.cash.clone(),
            stores.uow.clone(),
            rates.clone(),
            ids.clone(),
            audit.clone(),
            clock.clone(),
            config.local_currency,
        ));
        let sales = Arc::new(SalesLedger::new(
            stores.sales.clone(),
            stores.quotations.clone(),
            stores.invoices.clone(),
            stores.uow.clone(),
            rates.clone(),
            ids.clone(),
            audit.clone(),
            clock.clone(),
            config.local_currency,
        ));
        let quotations = Arc::new(QuotationService::new(
            stores.clone(),
            reference.clone(),
            rates.clone(),
            ids.clone(),
            audit.clone(),
            locks.clone(),
            clock.clone(),
            config.default_tax_rate,
        ));
        let approvals = Arc::new(ApprovalService::new(
            stores.clone(),
            routing,
            rates.clone(),
            ids.clone(),
            audit.clone(),
            locks.clone(),
            clock.clone(),
            config.sales_recognition,
        ));
        let workflows = Arc::new(WorkflowService::new(
            stores.clone(),
            ids.clone(),
            audit.clone(),
            locks.clone(),
            clock.clone(),
            config.sales_recognition,
        ));
        let invoices = Arc::new(InvoiceService::new(
            stores.clone(),
            reference.clone(),
            ids.clone(),
            audit.clone(),
            locks.clone(),
            clock.clone(),
            config.default_payment_terms_days,
            config.sales_recognition,
        ));
        let purchasing = Arc::new(PurchaseOrderService::new(
            stores.clone(),
            reference.clone(),
            rates.clone(),
            cash.clone(),
            ids.clone(),
            audit.clone(),
            clock.clone(),
            config.clone(),
        ));
        let inventory = Arc::new(InventoryService::new(stores.inventory.clone(), audit.clone(), clock.clone()));
        let catalog = Arc::new(ProductCatalog::new(
            config.product_codes.clone(),
            stores.product_codes.clone(),
            stores.uow.clone(),
            audit.clone(),
            locks.clone(),
            clock.clone(),
        ));
        let auth = Arc::new(Authenticator::new(stores.reference.clone()));
        let projections = Arc::new(Projections::new(stores.clone(), config.stale_approval_days));

        let registry = handlers
            .into_iter()
            .fold(EffectHandlerRegistry::builtin(), |registry, (kind, handler)| {
                registry.with_handler(kind, handler)
            });
        let ctx = EffectContext {
            stores,
            quotations: quotations.clone(),
            workflows: workflows.clone(),
            invoices: invoices.clone(),
            purchasing: purchasing.clone(),
            inventory: inventory.clone(),
            cash: cash.clone(),
            sales: sales.clone(),
            clock: clock.clone(),
        };
        let dispatcher = Arc::new(EffectDispatcher::new(ctx, registry, audit.clone(), locks));

        info!(
            local_currency = %config.local_currency,
            recognition = ?config.sales_recognition,
            "business engine ready"
        );
        BusinessEngine {
            config,
            clock,
            audit,
            rates,
            reference,
            quotations,
            approvals,
            workflows,
            invoices,
            purchasing,
            inventory,
            cash,
            sales,
            catalog,
            auth,
            projections,
            dispatcher,
        }
    }
}

/// Every command and query of the engine.
pub struct BusinessEngine {
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    audit: Arc<AuditLog>,
    rates: Arc<RateService>,
    reference: Arc<ReferenceService>,
    quotations: Arc<QuotationService>,
    approvals: Arc<ApprovalService>,
    workflows: Arc<WorkflowService>,
    invoices: Arc<InvoiceService>,
    purchasing: Arc<PurchaseOrderService>,
    inventory: Arc<InventoryService>,
    cash: Arc<CashLedger>,
    sales: Arc<SalesLedger>,
    catalog: Arc<ProductCatalog>,
    auth: Arc<Authenticator>,
    projections: Arc<Projections>,
    dispatcher: Arc<EffectDispatcher>,
}

impl BusinessEngine {
    pub fn builder(stores: Stores, config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(stores, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    async fn dispatch_if(&self, planned: bool, source_id: &str) -> Result<()> {
        if planned {
            self.dispatcher.dispatch(source_id).await?;
        } else {
            debug!(source_id, "no effects planned");
        }
        Ok(())
    }

    // Reference data
    // ------------------------------------------------------------------

    pub async fn put_reference(&self, record: ReferenceRecord, actor: &str) -> Result<ReferenceRecord> {
        self.reference.put(record, actor).await
    }

    pub async fn delete_reference(&self, kind: ReferenceKind, id: &str, mode: DeleteMode, actor: &str) -> Result<()> {
        self.reference.delete(kind, id, mode, actor).await
    }

    pub async fn get_reference(&self, kind: ReferenceKind, id: &str) -> Result<ReferenceRecord> {
        self.reference.get(kind, id).await.map(|r| r.redacted())
    }

    pub async fn list_reference(&self, kind: ReferenceKind, filter: &ReferenceFilter) -> Result<Vec<ReferenceRecord>> {
        let records = self.reference.list(kind, filter).await?;
        Ok(records.iter().map(ReferenceRecord::redacted).collect())
    }

    pub async fn set_password(&self, employee_id: &str, password: &str, actor: &str) -> Result<()> {
        self.reference.set_password(employee_id, password, actor).await
    }

    pub async fn authenticate(&self, employee_id: &str, password: &str) -> Result<Employee> {
        self.auth.authenticate(employee_id, password).await
    }

    // Exchange rates
    // ------------------------------------------------------------------

    pub async fn record_rate(&self, rate: ExchangeRate, actor: &str) -> Result<ExchangeRate> {
        self.rates.record_rate(rate, actor).await
    }

    pub async fn import_rates(&self, rates: Vec<ExchangeRate>, actor: &str) -> Result<usize> {
        self.rates.import(rates, actor).await
    }

    pub async fn convert(&self, amount: Decimal, from: Currency, to: Currency, date: NaiveDate) -> Result<Decimal> {
        self.rates.convert(amount, from, to, date).await
    }

    // Quotations
    // ------------------------------------------------------------------

    pub async fn draft_quotation(&self, payload: QuotationPayload, actor: &str) -> Result<Quotation> {
        self.quotations.draft(payload, actor).await
    }

    pub async fn submit_quotation(&self, payload: QuotationPayload, actor: &str) -> Result<Quotation> {
        self.quotations.submit(payload, actor).await
    }

    pub async fn submit_draft_quotation(&self, id: &str, actor: &str) -> Result<Quotation> {
        self.quotations.submit_draft(id, actor).await
    }

    pub async fn supersede_quotation(&self, old_id: &str, payload: QuotationPayload, actor: &str) -> Result<Quotation> {
        self.quotations.supersede(old_id, payload, actor).await
    }

    /// Approve the quotation's pending request on behalf of `approver`,
    /// opening the request first when there is none.
    pub async fn approve_quotation(&self, id: &str, approver: &str, note: Option<String>) -> Result<Decided> {
        self.decide_quotation(id, approver, Decision::Approve, note).await
    }

    pub async fn reject_quotation(&self, id: &str, approver: &str, reason: &str) -> Result<Decided> {
        self.decide_quotation(id, approver, Decision::Reject, Some(reason.trim().to_string())).await
    }

    async fn decide_quotation(
        &self,
        id: &str,
        approver: &str,
        decision: Decision,
        note: Option<String>,
    ) -> Result<Decided> {
        let request = match self.approvals.find_pending(id).await? {
            Some(request) => request,
            None => {
                let quotation = self.quotations.get(id).await?;
                self.approvals
                    .submit(NewApprovalRequest {
                        request_type: ApprovalType::Quotation,
                        target_ref: quotation.id.clone(),
                        requester_ref: quotation.created_by.clone(),
                        amount: Some(quotation.total_money()),
                        priority: Priority::Normal,
                    })
                    .await?
            }
        };
        self.decide_approval(&request.id, approver, decision, note).await
    }

    pub async fn get_quotation(&self, id: &str) -> Result<Quotation> {
        self.quotations.get(id).await
    }

    pub async fn list_quotations(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>> {
        self.quotations.list(filter).await
    }

    // Approvals
    // ------------------------------------------------------------------

    pub async fn submit_approval(&self, request: NewApprovalRequest) -> Result<ApprovalRequest> {
        self.approvals.submit(request).await
    }

    pub async fn decide_approval(
        &self,
        id: &str,
        approver: &str,
        decision: Decision,
        note: Option<String>,
    ) -> Result<Decided> {
        let decided = self.approvals.decide(id, approver, decision, note).await?;
        self.dispatch_if(decided.planned_effects, &decided.request.id).await?;
        Ok(decided)
    }

    pub async fn cancel_approval(&self, id: &str, actor: &str, reason: &str) -> Result<ApprovalRequest> {
        self.approvals.cancel(id, actor, reason).await
    }

    pub async fn get_approval(&self, id: &str) -> Result<ApprovalRequest> {
        self.approvals.get(id).await
    }

    pub async fn list_approvals(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>> {
        self.approvals.list(filter).await
    }

    // Workflows
    // ------------------------------------------------------------------

    pub async fn start_workflow_without_approval(
        &self,
        quotation_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<Workflow> {
        self.workflows.start_without_approval(quotation_id, actor, reason).await
    }

    pub async fn advance_workflow(&self, id: &str, actor: &str, note: Option<String>) -> Result<Transitioned> {
        let transitioned = self.workflows.advance(id, actor, note).await?;
        self.dispatch_if(transitioned.planned_effects, id).await?;
        Ok(transitioned)
    }

    pub async fn skip_workflow_stage(&self, id: &str, actor: &str, reason: &str) -> Result<Transitioned> {
        let transitioned = self.workflows.skip(id, actor, reason).await?;
        self.dispatch_if(transitioned.planned_effects, id).await?;
        Ok(transitioned)
    }

    pub async fn rewind_workflow(&self, id: &str, actor: &str, reason: &str) -> Result<Workflow> {
        self.workflows.rewind(id, actor, reason).await
    }

    pub async fn cancel_workflow(&self, id: &str, actor: &str, reason: &str) -> Result<Workflow> {
        self.workflows.cancel(id, actor, reason).await
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Workflow> {
        self.workflows.get(id).await
    }

    pub async fn workflow_for_quotation(&self, quotation_id: &str) -> Result<Workflow> {
        self.workflows.find_by_quotation(quotation_id).await
    }

    pub async fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>> {
        self.workflows.list(filter).await
    }

    // Invoices and purchase orders
    // ------------------------------------------------------------------

    pub async fn record_payment(
        &self,
        invoice_id: &str,
        amount: Money,
        date: NaiveDate,
        method: PaymentMethod,
        actor: &str,
    ) -> Result<PaymentRecorded> {
        self.record_payment_with_reference(invoice_id, amount, date, method, None, actor).await
    }

    /// Record a payment keyed by a caller reference. Repeating the call with
    /// the same reference and details returns the first payment unchanged.
    pub async fn record_payment_with_reference(
        &self,
        invoice_id: &str,
        amount: Money,
        date: NaiveDate,
        method: PaymentMethod,
        reference: Option<&str>,
        actor: &str,
    ) -> Result<PaymentRecorded> {
        let recorded = self.invoices.record_payment(invoice_id, amount, date, method, reference, actor).await?;
        self.dispatch_if(recorded.planned_effects, &recorded.payment.id).await?;
        Ok(recorded)
    }

    pub async fn sweep_overdue_invoices(&self, as_of: NaiveDate, actor: &str) -> Result<Vec<Invoice>> {
        self.invoices.sweep_overdue(as_of, actor).await
    }

    pub async fn get_invoice(&self, id: &str) -> Result<Invoice> {
        self.invoices.get(id).await
    }

    pub async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        self.invoices.list(filter).await
    }

    pub async fn get_purchase_order(&self, id: &str) -> Result<PurchaseOrder> {
        self.purchasing.get(id).await
    }

    pub async fn list_purchase_orders(&self, quotation_ref: Option<&str>) -> Result<Vec<PurchaseOrder>> {
        self.purchasing.list(quotation_ref).await
    }

    pub async fn stock_levels(&self) -> Result<Vec<InventoryLevel>> {
        self.inventory.levels().await
    }

    pub async fn on_hand(&self, product_ref: &str) -> Result<Decimal> {
        self.inventory.on_hand(product_ref).await
    }

    // Effects
    // ------------------------------------------------------------------

    pub async fn retry_effects(&self, source_id: &str) -> Result<EffectReport> {
        self.dispatcher.retry(source_id).await
    }

    pub async fn effects_for(&self, source_id: &str) -> Result<Vec<EffectRecord>> {
        self.dispatcher.effects_for(source_id).await
    }

    pub async fn unfinished_effects(&self) -> Result<Vec<EffectRecord>> {
        self.dispatcher.unfinished().await
    }

    // Cash flow
    // ------------------------------------------------------------------

    pub async fn post_cash(&self, posting: CashPosting, actor: &str) -> Result<CashTransaction> {
        self.cash.post(posting, actor).await
    }

    pub async fn post_cash_correction(&self, original_id: &str, reason: &str, actor: &str) -> Result<CashTransaction> {
        self.cash.post_correction(original_id, reason, actor).await
    }

    pub async fn list_cash(&self, filter: &CashFilter) -> Result<Vec<CashTransaction>> {
        self.cash.list(filter).await
    }

    pub async fn cash_summary(&self, period: &Period) -> Result<CashSummary> {
        self.cash.summary(period).await
    }

    pub async fn monthly_cash(&self, year: i32) -> Result<Vec<MonthlyCashPoint>> {
        self.cash.monthly_series(year).await
    }

    // Sales
    // ------------------------------------------------------------------

    pub async fn sales_by_month(&self, year_month: YearMonth) -> Result<SalesRollup> {
        self.sales.by_month(year_month).await
    }

    pub async fn sales_by_customer(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesRollup>> {
        self.sales.by_customer(year_month).await
    }

    pub async fn sales_by_product(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesRollup>> {
        self.sales.by_product(year_month).await
    }

    pub async fn list_sales(&self, filter: &SalesFilter) -> Result<Vec<SalesRecord>> {
        self.sales.list(filter).await
    }

    pub async fn sales_forecasts(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesForecast>> {
        self.sales.forecasts(year_month).await
    }

    pub async fn set_sales_target(&self, target: SalesTarget, actor: &str) -> Result<SalesTarget> {
        self.sales.set_target(target, actor).await
    }

    pub async fn target_vs_actual(&self, year_month: YearMonth) -> Result<Vec<TargetRow>> {
        self.sales.target_vs_actual(year_month).await
    }

    // Events and projections
    // ------------------------------------------------------------------

    pub async fn event_history(&self, kind: EntityKind, id: &str) -> Result<Vec<Event>> {
        self.audit.history(kind, id).await
    }

    pub async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.audit.recent(limit).await
    }

    pub async fn workflows_by_stage(&self) -> Result<Vec<StageBucket>> {
        self.projections.workflows_by_stage().await
    }

    pub async fn list_pending_approvals(&self, approver_ref: &str) -> Result<Vec<ApprovalRequest>> {
        self.projections.pending_approvals_for(approver_ref).await
    }

    pub async fn stale_approvals(&self, as_of: NaiveDate) -> Result<Vec<ApprovalRequest>> {
        self.projections.stale_approvals(as_of).await
    }

    pub async fn list_overdue_invoices(&self, as_of: NaiveDate) -> Result<Vec<Invoice>> {
        self.projections.overdue_invoices(as_of).await
    }

    pub async fn low_stock(&self, source: ThresholdSource) -> Result<Vec<StockLevel>> {
        self.projections.low_stock(source).await
    }

    pub async fn completion_stats(&self, period: &Period) -> Result<CompletionStats> {
        self.projections.completion_stats(period).await
    }

    // Product codes
    // ------------------------------------------------------------------

    pub fn parse_product_code(&self, code: &str) -> Result<ProductCode> {
        self.catalog.parse(code)
    }

    pub fn build_product_code(&self, family: &str, values: &[&str]) -> Result<ProductCode> {
        self.catalog.build(family, values)
    }

    pub async fn register_product_code(&self, code: &str, actor: &str) -> Result<RegisteredProductCode> {
        self.catalog.register(code, actor).await
    }

    pub async fn list_product_codes(&self, family: Option<&str>) -> Result<Vec<RegisteredProductCode>> {
        self.catalog.list(family).await
    }
}
