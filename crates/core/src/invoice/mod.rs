//! Invoices and payments
//!
//! Invoices are issued by the workflow's `issue_invoice` stage and then only
//! change by recording payments or being swept to `overdue`. A payment is
//! committed together with the effects it plans (income posting and, on the
//! payment basis, sales recognition).

use std::sync::Arc;

use serde::Serialize;
use chrono::{Days, NaiveDate};
use tracing::{info, warn};
use tradeflow_domain::{
    EffectTrigger, EntityKind, IdFamily, Invoice, InvoiceFilter, Money, Payment, PaymentMethod,
    PaymentStatus, Quotation, RecognitionBasis, Result, TradeflowError, Workflow,
};

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::effects::plan::{self, PlanContext};
use crate::ids::IdService;
use crate::locks::{keys, AggregateLocks};
use crate::reference::ReferenceService;
use crate::store::{Stores, Write, WriteBatch};

/// Result of `record_payment`.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecorded {
    pub invoice: Invoice,
    pub payment: Payment,
    pub planned_effects: bool,
    /// True when the reference matched an earlier payment and nothing was posted.
    pub replayed: bool,
}

pub struct InvoiceService {
    stores: Stores,
    reference: Arc<ReferenceService>,
    ids: Arc<IdService>,
    audit: Arc<AuditLog>,
    locks: Arc<AggregateLocks>,
    clock: Arc<dyn Clock>,
    default_payment_terms_days: u32,
    recognition: RecognitionBasis,
}

impl InvoiceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: Stores,
        reference: Arc<ReferenceService>,
        ids: Arc<IdService>,
        audit: Arc<AuditLog>,
        locks: Arc<AggregateLocks>,
        clock: Arc<dyn Clock>,
        default_payment_terms_days: u32,
        recognition: RecognitionBasis,
    ) -> Self {
        Self { stores, reference, ids, audit, locks, clock, default_payment_terms_days, recognition }
    }

    /// Invoice for `workflow` billing the quotation's lines, and its writes.
    /// `None` when the workflow already has one.
    pub async fn prepare_issue(
        &self,
        workflow: &Workflow,
        quotation: &Quotation,
        actor: &str,
    ) -> Result<Option<(Invoice, WriteBatch)>> {
        if let Some(existing) = self.stores.invoices.find_invoice_by_workflow(&workflow.id).await? {
            info!(workflow_id = %workflow.id, invoice_id = %existing.id, "invoice already issued");
            return Ok(None);
        }
        let customer = self.reference.customer(&quotation.customer_ref).await?;
        let terms = customer.payment_terms_days.unwrap_or(self.default_payment_terms_days);
        let issue_date = self.clock.today();
        let due_date = issue_date
            .checked_add_days(Days::new(u64::from(terms)))
            .ok_or_else(|| TradeflowError::validation(format!("due date out of range for {terms} days")))?;

        let id = self.ids.next_id(IdFamily::Invoice, issue_date).await?;
        let now = self.clock.now();
        let invoice = Invoice {
            number: id.clone(),
            id,
            quotation_ref: quotation.id.clone(),
            workflow_ref: Some(workflow.id.clone()),
            customer_ref: quotation.customer_ref.clone(),
            issue_date,
            due_date,
            lines: quotation.lines.clone(),
            subtotal: quotation.subtotal,
            tax: quotation.tax,
            total: quotation.total,
            currency: quotation.currency,
            payment_status: PaymentStatus::Unpaid,
            payments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let mut batch = WriteBatch::new().with(Write::Invoice(invoice.clone()));
        let draft = EventDraft::new(actor, EntityKind::Invoice, &invoice.id, "issued").after(&invoice)?;
        self.audit.record(&mut batch, draft).await?;
        Ok(Some((invoice, batch)))
    }

    pub async fn record_payment(
        &self,
        invoice_id: &str,
        amount: Money,
        date: NaiveDate,
        method: PaymentMethod,
        reference: Option<&str>,
        actor: &str,
    ) -> Result<PaymentRecorded> {
        if actor.trim().is_empty() {
            return Err(TradeflowError::Unauthorized("an actor is required".into()));
        }
        let reference = reference.map(str::trim).filter(|r| !r.is_empty());
        let _guard = self.locks.lock(&keys::invoice(invoice_id)).await;
        let mut invoice = self.get(invoice_id).await?;

        if let Some(reference) = reference {
            if let Some(earlier) = invoice.payment_by_reference(reference) {
                let same = earlier.amount == amount.amount
                    && invoice.currency == amount.currency
                    && earlier.date == date
                    && earlier.method == method;
                if !same {
                    return Err(TradeflowError::DuplicateId(format!(
                        "payment reference {reference} on {invoice_id} was already used for payment {}",
                        earlier.id
                    )));
                }
                info!(invoice_id, payment_id = %earlier.id, reference, "payment replayed; nothing to do");
                let payment = earlier.clone();
                return Ok(PaymentRecorded { invoice, payment, planned_effects: false, replayed: true });
            }
        }

        let before = invoice.clone();
        let now = self.clock.now();
        let payment = Payment {
            id: self.ids.next_id(IdFamily::Payment, date).await?,
            date,
            amount: amount.amount,
            method,
            recorded_by: actor.to_string(),
            recorded_at: now,
            reference: reference.map(str::to_string),
        };
        invoice.apply_payment(payment.clone(), amount.currency, now)?;

        let mut batch = WriteBatch::new().with(Write::Invoice(invoice.clone()));
        let draft = EventDraft::new(actor, EntityKind::Invoice, invoice_id, "payment_recorded")
            .before(&before)?
            .after(&invoice)?;
        self.audit.record(&mut batch, draft).await?;

        let trigger = EffectTrigger::PaymentReceived {
            invoice_id: invoice.id.clone(),
            payment_id: payment.id.clone(),
            amount,
            date,
            method,
            actor: actor.to_string(),
        };
        let planned = plan::plan(&trigger, PlanContext::new(invoice.lines.len(), self.recognition), 0, now);
        let planned_effects = !planned.is_empty();
        batch.extend(planned.into_iter().map(Write::PlanEffect));
        self.stores.uow.commit(batch).await?;

        info!(
            invoice_id,
            payment_id = %payment.id,
            amount = %amount,
            status = %invoice.payment_status,
            "payment recorded"
        );
        Ok(PaymentRecorded { invoice, payment, planned_effects, replayed: false })
    }

    /// Persist `overdue` on every unpaid invoice past due on `as_of`.
    pub async fn sweep_overdue(&self, as_of: NaiveDate, actor: &str) -> Result<Vec<Invoice>> {
        let candidates = self.overdue(as_of).await?;
        let mut swept = Vec::new();
        for candidate in candidates {
            let _guard = self.locks.lock(&keys::invoice(&candidate.id)).await;
            let Some(mut invoice) = self.stores.invoices.get_invoice(&candidate.id).await? else {
                warn!(invoice_id = %candidate.id, "invoice vanished during overdue sweep");
                continue;
            };
            let before = invoice.clone();
            if !invoice.mark_overdue(as_of, self.clock.now()) {
                continue;
            }
            let mut batch = WriteBatch::new().with(Write::Invoice(invoice.clone()));
            let draft = EventDraft::new(actor, EntityKind::Invoice, &invoice.id, "marked_overdue")
                .before(&before)?
                .after(&invoice)?;
            self.audit.record(&mut batch, draft).await?;
            self.stores.uow.commit(batch).await?;
            swept.push(invoice);
        }
        info!(as_of = %as_of, swept = swept.len(), "overdue sweep finished");
        Ok(swept)
    }

    /// Unpaid invoices past due on `as_of`, oldest due date first.
    pub async fn overdue(&self, as_of: NaiveDate) -> Result<Vec<Invoice>> {
        let filter = InvoiceFilter { unpaid_only: true, ..InvoiceFilter::default() };
        let mut invoices: Vec<Invoice> = self
            .stores
            .invoices
            .list_invoices(&filter)
            .await?
            .into_iter()
            .filter(|i| i.is_overdue(as_of))
            .collect();
        invoices.sort_by(|a, b| (a.due_date, &a.id).cmp(&(b.due_date, &b.id)));
        Ok(invoices)
    }

    pub async fn get(&self, id: &str) -> Result<Invoice> {
        self.stores
            .invoices
            .get_invoice(id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::Invoice, id))
    }

    pub async fn find_by_workflow(&self, workflow_id: &str) -> Result<Option<Invoice>> {
        self.stores.invoices.find_invoice_by_workflow(workflow_id).await
    }

    pub async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        self.stores.invoices.list_invoices(filter).await
    }
}
