//! Purchase orders raised by workflows
//!
//! A workflow's first stage orders the quotation's goods from the default
//! supplier of its first product. Unit cost is the product's cost price, or
//! the quoted price less the category margin when no cost is known.

use std::sync::Arc;

use chrono::Days;
use rust_decimal::Decimal;
use tracing::{info, warn};
use tradeflow_domain::{
    CashEntryType, CashKind, CashPosting, CashSource, CashTransaction, EngineConfig, EntityKind,
    IdFamily, LineItem, PurchaseOrder, PurchaseOrderStatus, Quotation, Result, TradeflowError,
    Workflow,
};

use crate::audit::{AuditLog, EventDraft};
use crate::cashflow::CashLedger;
use crate::clock::Clock;
use crate::currency::RateService;
use crate::ids::IdService;
use crate::reference::ReferenceService;
use crate::store::{Stores, Write, WriteBatch};

pub struct PurchaseOrderService {
    stores: Stores,
    reference: Arc<ReferenceService>,
    rates: Arc<RateService>,
    cash: Arc<CashLedger>,
    ids: Arc<IdService>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl PurchaseOrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: Stores,
        reference: Arc<ReferenceService>,
        rates: Arc<RateService>,
        cash: Arc<CashLedger>,
        ids: Arc<IdService>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { stores, reference, rates, cash, ids, audit, clock, config }
    }

    /// Purchase order for `workflow` and its writes. `None` when the
    /// workflow already has one or no product names a supplier.
    pub async fn prepare_from_workflow(
        &self,
        workflow: &Workflow,
        quotation: &Quotation,
        actor: &str,
    ) -> Result<Option<(PurchaseOrder, WriteBatch)>> {
        if let Some(existing) = self.find_by_workflow(&workflow.id).await? {
            info!(workflow_id = %workflow.id, po_id = %existing.id, "purchase order already raised");
            return Ok(None);
        }

        let today = self.clock.today();
        let mut supplier_ref = None;
        let mut lines = Vec::with_capacity(quotation.lines.len());
        for line in &quotation.lines {
            let product = self.reference.product(&line.product_ref).await?;
            if supplier_ref.is_none() {
                supplier_ref.clone_from(&product.supplier_ref);
            }
            let unit_cost = match product.cost_price {
                Some(cost) => {
                    self.rates.convert(cost, product.currency, quotation.currency, today).await?.round_dp(4)
                }
                None => (line.unit_price * (Decimal::ONE - self.config.margin_for(&product.category))).round_dp(4),
            };
            let mut item = LineItem::priced(&line.product_ref, line.qty, unit_cost, quotation.currency);
            item.description.clone_from(&line.description);
            lines.push(item);
        }
        let Some(supplier_ref) = supplier_ref else {
            warn!(
                workflow_id = %workflow.id,
                quotation = %quotation.id,
                "no product names a supplier; purchase order not raised"
            );
            return Ok(None);
        };
        let supplier = self.reference.supplier(&supplier_ref).await?;

        let days = u64::from(self.config.default_delivery_days);
        let delivery_date = today
            .checked_add_days(Days::new(days))
            .ok_or_else(|| TradeflowError::validation("delivery date out of range"))?;
        let id = self.ids.next_id(IdFamily::PurchaseOrder, today).await?;
        let now = self.clock.now();
        let order = PurchaseOrder {
            number: id.clone(),
            id,
            quotation_ref: Some(quotation.id.clone()),
            workflow_ref: Some(workflow.id.clone()),
            supplier_ref: supplier.id,
            date: today,
            delivery_date,
            total: lines.iter().map(|l| l.line_total).sum(),
            lines,
            currency: quotation.currency,
            payment_terms: supplier.payment_terms,
            status: PurchaseOrderStatus::Approved,
            created_at: now,
            updated_at: now,
        };
        let mut batch = WriteBatch::new().with(Write::PurchaseOrder(order.clone()));
        let draft = EventDraft::new(actor, EntityKind::PurchaseOrder, &order.id, "created").after(&order)?;
        self.audit.record(&mut batch, draft).await?;
        Ok(Some((order, batch)))
    }

    /// Mark the workflow's order received. `None` when there is no order or
    /// it was already received.
    pub async fn prepare_receive(&self, workflow_id: &str, actor: &str) -> Result<Option<(PurchaseOrder, WriteBatch)>> {
        let Some(order) = self.find_by_workflow(workflow_id).await? else {
            warn!(workflow_id, "no purchase order to receive");
            return Ok(None);
        };
        if matches!(order.status, PurchaseOrderStatus::Received | PurchaseOrderStatus::Closed) {
            return Ok(None);
        }
        self.transition(order, actor, "received", None, |po, at| po.receive(at)).await.map(Some)
    }

    /// Close the workflow's order once received; otherwise nothing to do.
    pub async fn prepare_close(&self, workflow_id: &str, actor: &str) -> Result<Option<(PurchaseOrder, WriteBatch)>> {
        let Some(order) = self.find_by_workflow(workflow_id).await? else {
            return Ok(None);
        };
        if order.status != PurchaseOrderStatus::Received {
            info!(workflow_id, po_id = %order.id, status = %order.status, "purchase order left open");
            return Ok(None);
        }
        self.transition(order, actor, "closed", None, |po, at| po.close(at)).await.map(Some)
    }

    /// Approve or cancel an order after its approval request resolved.
    /// `None` when it already carries the outcome.
    pub async fn prepare_resolution(
        &self,
        id: &str,
        approved: bool,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Option<(PurchaseOrder, WriteBatch)>> {
        let order = self.get(id).await?;
        match (approved, order.status) {
            (true, PurchaseOrderStatus::Approved) | (false, PurchaseOrderStatus::Cancelled) => Ok(None),
            (true, _) => self.transition(order, actor, "approved", reason, |po, at| po.approve(at)).await.map(Some),
            (false, _) => self.transition(order, actor, "cancelled", reason, |po, at| po.cancel(at)).await.map(Some),
        }
    }

    async fn transition<F>(
        &self,
        mut order: PurchaseOrder,
        actor: &str,
        verb: &str,
        reason: Option<String>,
        apply: F,
    ) -> Result<(PurchaseOrder, WriteBatch)>
    where
        F: FnOnce(&mut PurchaseOrder, chrono::DateTime<chrono::Utc>) -> Result<()>,
    {
        let before = order.clone();
        apply(&mut order, self.clock.now())?;
        let mut batch = WriteBatch::new().with(Write::PurchaseOrder(order.clone()));
        let draft = EventDraft::new(actor, EntityKind::PurchaseOrder, &order.id, verb)
            .before(&before)?
            .after(&order)?
            .reason(reason);
        self.audit.record(&mut batch, draft).await?;
        Ok((order, batch))
    }

    /// Supplier expense for a received order whose terms are payment on
    /// receipt. `None` for any other terms.
    pub async fn prepare_supplier_expense(
        &self,
        workflow_id: &str,
        actor: &str,
    ) -> Result<Option<(CashTransaction, WriteBatch)>> {
        let Some(order) = self.find_by_workflow(workflow_id).await? else {
            return Ok(None);
        };
        if !order.payment_terms.requires_payment_on_receipt() || order.total <= Decimal::ZERO {
            return Ok(None);
        }
        let posting = CashPosting {
            kind: CashKind::Expense,
            entry_type: CashEntryType::Actual,
            amount: order.total,
            currency: order.currency,
            date: self.clock.today(),
            source_type: CashSource::PurchaseOrder,
            source_id: order.id.clone(),
            account_ref: None,
            workflow_ref: Some(workflow_id.to_string()),
            description: format!("Supplier {} payment for {}", order.supplier_ref, order.id),
        };
        self.cash.prepare(posting, actor).await.map(Some)
    }

    pub async fn get(&self, id: &str) -> Result<PurchaseOrder> {
        self.stores
            .purchase_orders
            .get_purchase_order(id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::PurchaseOrder, id))
    }

    pub async fn find_by_workflow(&self, workflow_id: &str) -> Result<Option<PurchaseOrder>> {
        self.stores.purchase_orders.find_purchase_order_by_workflow(workflow_id).await
    }

    pub async fn list(&self, quotation_ref: Option<&str>) -> Result<Vec<PurchaseOrder>> {
        self.stores.purchase_orders.list_purchase_orders(quotation_ref).await
    }
}
