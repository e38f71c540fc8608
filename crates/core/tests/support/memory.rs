//! In-memory implementation of every core port.
//!
//! A commit applies its batch to a copy of the state and swaps it in only
//! when every write succeeded, so a failing batch leaves nothing behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tradeflow_core::store::{
    ApprovalRepository, CashLedgerRepository, EffectRepository, EventRepository,
    InventoryRepository, InvoiceRepository, ProductCodeRepository, PurchaseOrderRepository,
    QuotationRepository, RateRepository, ReferenceRepository, SalesRepository,
    SequenceRepository, UnitOfWork, Write, WriteBatch, WorkflowRepository,
};
use tradeflow_domain::{
    ApprovalFilter, ApprovalRequest, CashFilter, CashTransaction, Currency, EffectKey,
    EffectRecord, EffectStatus, EntityKind, Event, ExchangeRate, InventoryLevel, Invoice,
    InvoiceFilter, PurchaseOrder, Quotation, QuotationFilter, ReferenceFilter, ReferenceKind,
    ReferenceRecord, RegisteredProductCode, Result, SalesFilter, SalesForecast, SalesRecord,
    SalesSourceKind, SalesTarget, TargetDimension, TradeflowError, Workflow, WorkflowFilter,
    YearMonth,
};

#[derive(Debug, Clone, Default)]
struct State {
    quotations: BTreeMap<String, Quotation>,
    purchase_orders: BTreeMap<String, PurchaseOrder>,
    invoices: BTreeMap<String, Invoice>,
    workflows: BTreeMap<String, Workflow>,
    approvals: BTreeMap<String, ApprovalRequest>,
    reference: BTreeMap<(ReferenceKind, String), ReferenceRecord>,
    stock: BTreeMap<String, InventoryLevel>,
    cash: Vec<CashTransaction>,
    sales: Vec<SalesRecord>,
    forecasts: BTreeMap<String, SalesForecast>,
    targets: BTreeMap<(YearMonth, TargetDimension, String), SalesTarget>,
    effects: BTreeMap<EffectKey, EffectRecord>,
    product_codes: BTreeMap<String, RegisteredProductCode>,
    rates: BTreeMap<(Currency, NaiveDate), ExchangeRate>,
    events: Vec<Event>,
    counters: HashMap<String, u32>,
    next_seq: u64,
}

impl State {
    fn apply(&mut self, write: Write) -> Result<()> {
        match write {
            Write::Quotation(q) => {
                self.quotations.insert(q.id.clone(), q);
            }
            Write::PurchaseOrder(po) => {
                self.purchase_orders.insert(po.id.clone(), po);
            }
            Write::Invoice(invoice) => {
                self.invoices.insert(invoice.id.clone(), invoice);
            }
            Write::Workflow(workflow) => {
                self.workflows.insert(workflow.id.clone(), workflow);
            }
            Write::Approval(approval) => {
                self.approvals.insert(approval.id.clone(), approval);
            }
            Write::Reference(record) => {
                self.reference.insert((record.kind(), record.id().to_string()), record);
            }
            Write::DeleteReference { kind, id } => {
                self.reference.remove(&(kind, id));
            }
            Write::StockAdjustment { product_ref, delta, at } => {
                let level = self.stock.entry(product_ref.clone()).or_insert_with(|| InventoryLevel {
                    product_ref,
                    on_hand: rust_decimal::Decimal::ZERO,
                    updated_at: at,
                });
                level.on_hand += delta;
                level.updated_at = at;
            }
            Write::Cash(tx) => {
                if self.cash.iter().any(|c| c.id == tx.id) {
                    return Err(TradeflowError::DuplicateId(tx.id));
                }
                self.cash.push(tx);
            }
            Write::Sales(record) => {
                let exists = self.sales.iter().any(|r| {
                    r.source_kind == record.source_kind
                        && r.source_id == record.source_id
                        && r.product_ref == record.product_ref
                });
                if !exists {
                    self.sales.push(record);
                }
            }
            Write::SalesForecast(forecast) => {
                self.forecasts.entry(forecast.quotation_ref.clone()).or_insert(forecast);
            }
            Write::SalesTarget(target) => {
                let key = (target.year_month, target.dimension, target.dimension_ref.clone());
                self.targets.insert(key, target);
            }
            Write::PlanEffect(record) => {
                self.effects.entry(record.key.clone()).or_insert(record);
            }
            Write::Effect(record) => {
                self.effects.insert(record.key.clone(), record);
            }
            Write::ProductCode(code) => {
                self.product_codes.entry(code.code.clone()).or_insert(code);
            }
            Write::ExchangeRate(rate) => {
                self.rates.insert((rate.currency, rate.date), rate);
            }
            Write::Event(event) => {
                if self.events.iter().any(|e| e.seq == event.seq) {
                    return Err(TradeflowError::DuplicateId(format!("event seq {}", event.seq)));
                }
                self.events.push(event);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn cash(&self) -> Vec<CashTransaction> {
        self.state.lock().cash.clone()
    }

    pub fn sales(&self) -> Vec<SalesRecord> {
        self.state.lock().sales.clone()
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        for write in batch {
            next.apply(write)?;
        }
        *guard = next;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl QuotationRepository for MemoryStore {
    async fn get_quotation(&self, id: &str) -> Result<Option<Quotation>> {
        Ok(self.state.lock().quotations.get(id).cloned())
    }

    async fn list_quotations(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>> {
        Ok(self
            .state
            .lock()
            .quotations
            .values()
            .filter(|q| filter.status.map_or(true, |s| s == q.status))
            .filter(|q| filter.customer_ref.as_ref().map_or(true, |c| c == &q.customer_ref))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PurchaseOrderRepository for MemoryStore {
    async fn get_purchase_order(&self, id: &str) -> Result<Option<PurchaseOrder>> {
        Ok(self.state.lock().purchase_orders.get(id).cloned())
    }

    async fn find_purchase_order_by_workflow(&self, workflow_id: &str) -> Result<Option<PurchaseOrder>> {
        Ok(self
            .state
            .lock()
            .purchase_orders
            .values()
            .find(|po| po.workflow_ref.as_deref() == Some(workflow_id))
            .cloned())
    }

    async fn list_purchase_orders(&self, quotation_ref: Option<&str>) -> Result<Vec<PurchaseOrder>> {
        Ok(self
            .state
            .lock()
            .purchase_orders
            .values()
            .filter(|po| quotation_ref.map_or(true, |q| po.quotation_ref.as_deref() == Some(q)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>> {
        Ok(self.state.lock().invoices.get(id).cloned())
    }

    async fn find_invoice_by_workflow(&self, workflow_id: &str) -> Result<Option<Invoice>> {
        Ok(self
            .state
            .lock()
            .invoices
            .values()
            .find(|i| i.workflow_ref.as_deref() == Some(workflow_id))
            .cloned())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        Ok(self.state.lock().invoices.values().filter(|i| filter.matches(i)).cloned().collect())
    }
}

#[async_trait]
impl WorkflowRepository for MemoryStore {
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        Ok(self.state.lock().workflows.get(id).cloned())
    }

    async fn find_active_workflow(&self, quotation_ref: &str) -> Result<Option<Workflow>> {
        Ok(self
            .state
            .lock()
            .workflows
            .values()
            .find(|w| w.quotation_ref == quotation_ref && w.is_active())
            .cloned())
    }

    async fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>> {
        Ok(self.state.lock().workflows.values().filter(|w| filter.matches(w)).cloned().collect())
    }
}

#[async_trait]
impl ApprovalRepository for MemoryStore {
    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>> {
        Ok(self.state.lock().approvals.get(id).cloned())
    }

    async fn find_pending_approval(&self, target_ref: &str) -> Result<Option<ApprovalRequest>> {
        Ok(self
            .state
            .lock()
            .approvals
            .values()
            .find(|a| a.target_ref == target_ref && a.is_pending())
            .cloned())
    }

    async fn list_approvals(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>> {
        Ok(self.state.lock().approvals.values().filter(|a| filter.matches(a)).cloned().collect())
    }
}

#[async_trait]
impl ReferenceRepository for MemoryStore {
    async fn get_reference(&self, kind: ReferenceKind, id: &str) -> Result<Option<ReferenceRecord>> {
        Ok(self.state.lock().reference.get(&(kind, id.to_string())).cloned())
    }

    async fn list_reference(&self, kind: ReferenceKind, filter: &ReferenceFilter) -> Result<Vec<ReferenceRecord>> {
        Ok(self
            .state
            .lock()
            .reference
            .iter()
            .filter(|((k, _), record)| *k == kind && filter.matches(record))
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl InventoryRepository for MemoryStore {
    async fn stock_level(&self, product_ref: &str) -> Result<Option<InventoryLevel>> {
        Ok(self.state.lock().stock.get(product_ref).cloned())
    }

    async fn stock_levels(&self) -> Result<Vec<InventoryLevel>> {
        Ok(self.state.lock().stock.values().cloned().collect())
    }
}

#[async_trait]
impl CashLedgerRepository for MemoryStore {
    async fn get_cash(&self, id: &str) -> Result<Option<CashTransaction>> {
        Ok(self.state.lock().cash.iter().find(|c| c.id == id).cloned())
    }

    async fn list_cash(&self, filter: &CashFilter) -> Result<Vec<CashTransaction>> {
        Ok(self.state.lock().cash.iter().filter(|c| filter.matches(c)).cloned().collect())
    }
}

#[async_trait]
impl SalesRepository for MemoryStore {
    async fn list_sales(&self, filter: &SalesFilter) -> Result<Vec<SalesRecord>> {
        Ok(self.state.lock().sales.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn list_forecasts(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesForecast>> {
        Ok(self
            .state
            .lock()
            .forecasts
            .values()
            .filter(|f| year_month.map_or(true, |ym| f.year_month == ym))
            .cloned()
            .collect())
    }

    async fn list_targets(&self, year_month: YearMonth) -> Result<Vec<SalesTarget>> {
        Ok(self
            .state
            .lock()
            .targets
            .values()
            .filter(|t| t.year_month == year_month)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EffectRepository for MemoryStore {
    async fn effects_for_source(&self, source_id: &str) -> Result<Vec<EffectRecord>> {
        let mut records: Vec<EffectRecord> = self
            .state
            .lock()
            .effects
            .values()
            .filter(|e| e.key.source_id == source_id)
            .cloned()
            .collect();
        records.sort_by_key(|e| e.ordinal);
        Ok(records)
    }

    async fn effects_with_status(&self, status: EffectStatus) -> Result<Vec<EffectRecord>> {
        Ok(self.state.lock().effects.values().filter(|e| e.status == status).cloned().collect())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn history(&self, kind: EntityKind, id: &str) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .state
            .lock()
            .events
            .iter()
            .filter(|e| e.entity_kind == kind && e.entity_id == id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.seq);
        Ok(events)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Event>> {
        let mut events = self.state.lock().events.clone();
        events.sort_by_key(|e| e.seq);
        let skip = events.len().saturating_sub(limit);
        Ok(events.split_off(skip))
    }

    async fn reserve_seq_block(&self, size: u32) -> Result<u64> {
        let mut state = self.state.lock();
        let start = state.next_seq.max(1);
        state.next_seq = start + u64::from(size);
        Ok(start)
    }
}

#[async_trait]
impl SequenceRepository for MemoryStore {
    async fn next_counter(&self, scope: &str) -> Result<u32> {
        let mut state = self.state.lock();
        let counter = state.counters.entry(scope.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[async_trait]
impl RateRepository for MemoryStore {
    async fn rate_on_or_before(&self, currency: Currency, date: NaiveDate) -> Result<Option<ExchangeRate>> {
        Ok(self
            .state
            .lock()
            .rates
            .range((currency, NaiveDate::MIN)..=(currency, date))
            .next_back()
            .map(|(_, rate)| rate.clone()))
    }

    async fn rates_between(&self, currency: Currency, from: NaiveDate, to: NaiveDate) -> Result<Vec<ExchangeRate>> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .state
            .lock()
            .rates
            .range((currency, from)..=(currency, to))
            .map(|(_, rate)| rate.clone())
            .collect())
    }
}

#[async_trait]
impl ProductCodeRepository for MemoryStore {
    async fn get_product_code(&self, code: &str) -> Result<Option<RegisteredProductCode>> {
        Ok(self.state.lock().product_codes.get(code).cloned())
    }

    async fn list_product_codes(&self, family: Option<&str>) -> Result<Vec<RegisteredProductCode>> {
        Ok(self
            .state
            .lock()
            .product_codes
            .values()
            .filter(|c| family.map_or(true, |f| c.family == f))
            .cloned()
            .collect())
    }
}

/// Sales records of one source kind.
pub fn sales_of_kind(records: &[SalesRecord], kind: SalesSourceKind) -> usize {
    records.iter().filter(|r| r.source_kind == kind).count()
}
