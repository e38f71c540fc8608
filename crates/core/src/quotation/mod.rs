//! Quotation lifecycle
//!
//! Quotations are priced and validated against reference data when they are
//! drafted or submitted. An approved quotation is frozen; changes go through
//! [`QuotationService::supersede`], which issues a successor and retires the
//! original.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use tradeflow_domain::{
    EntityKind, IdFamily, LineItem, Quotation, QuotationFilter, QuotationPayload, QuotationStatus,
    RecordStatus, Result, TradeflowError, Totals,
};

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::currency::RateService;
use crate::ids::IdService;
use crate::locks::{keys, AggregateLocks};
use crate::reference::ReferenceService;
use crate::store::{Stores, Write, WriteBatch};

pub struct QuotationService {
    stores: Stores,
    reference: Arc<ReferenceService>,
    rates: Arc<RateService>,
    ids: Arc<IdService>,
    audit: Arc<AuditLog>,
    locks: Arc<AggregateLocks>,
    clock: Arc<dyn Clock>,
    default_tax_rate: Decimal,
}

impl QuotationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: Stores,
        reference: Arc<ReferenceService>,
        rates: Arc<RateService>,
        ids: Arc<IdService>,
        audit: Arc<AuditLog>,
        locks: Arc<AggregateLocks>,
        clock: Arc<dyn Clock>,
        default_tax_rate: Decimal,
    ) -> Self {
        Self { stores, reference, rates, ids, audit, locks, clock, default_tax_rate }
    }

    pub async fn draft(&self, payload: QuotationPayload, actor: &str) -> Result<Quotation> {
        self.create(payload, QuotationStatus::Draft, None, actor).await
    }

    /// Create a quotation that is immediately awaiting approval.
    pub async fn submit(&self, payload: QuotationPayload, actor: &str) -> Result<Quotation> {
        self.create(payload, QuotationStatus::Submitted, None, actor).await
    }

    /// Move an existing draft to `submitted`.
    pub async fn submit_draft(&self, id: &str, actor: &str) -> Result<Quotation> {
        let _guard = self.locks.lock(&keys::quotation(id)).await;
        let mut quotation = self.get(id).await?;
        let before = quotation.clone();
        quotation.submit(self.clock.now())?;

        let mut batch = WriteBatch::new().with(Write::Quotation(quotation.clone()));
        let draft = EventDraft::new(actor, EntityKind::Quotation, id, "submitted")
            .before(&before)?
            .after(&quotation)?;
        self.audit.record(&mut batch, draft).await?;
        self.stores.uow.commit(batch).await?;

        info!(quotation_id = id, actor, "quotation submitted");
        Ok(quotation)
    }

    /// Replace `old_id` with a new submitted quotation built from `payload`.
    pub async fn supersede(&self, old_id: &str, payload: QuotationPayload, actor: &str) -> Result<Quotation> {
        let _guard = self.locks.lock(&keys::quotation(old_id)).await;
        let mut old = self.get(old_id).await?;
        if let Some(workflow) = self.stores.workflows.find_active_workflow(old_id).await? {
            return Err(TradeflowError::state_conflict(format!(
                "quotation {old_id} has active workflow {}; cancel it before superseding",
                workflow.id
            )));
        }
        if payload.customer_ref != old.customer_ref {
            return Err(TradeflowError::validation(format!(
                "a successor of {old_id} must keep customer {}",
                old.customer_ref
            )));
        }

        // The open request for the old quotation is withdrawn in the same batch.
        let (pending, _approval_guard) = match self.stores.approvals.find_pending_approval(old_id).await? {
            Some(found) => {
                let guard = self.locks.lock(&keys::approval(&found.id)).await;
                let current = self
                    .stores
                    .approvals
                    .get_approval(&found.id)
                    .await?
                    .ok_or_else(|| TradeflowError::not_found(EntityKind::Approval, &found.id))?;
                if !current.is_pending() {
                    return Err(TradeflowError::state_conflict(format!(
                        "approval request {} for {old_id} was just {}; retry the supersede",
                        current.id, current.status
                    )));
                }
                (Some(current), Some(guard))
            }
            None => (None, None),
        };

        let successor = self.build(payload, QuotationStatus::Submitted, Some(old_id.to_string()), actor).await?;
        let before = old.clone();
        let now = self.clock.now();
        old.supersede(&successor.id, now)?;

        let mut batch = WriteBatch::new()
            .with(Write::Quotation(successor.clone()))
            .with(Write::Quotation(old.clone()));
        let created = EventDraft::new(actor, EntityKind::Quotation, &successor.id, "submitted").after(&successor)?;
        self.audit.record(&mut batch, created).await?;
        let retired = EventDraft::new(actor, EntityKind::Quotation, old_id, "superseded")
            .before(&before)?
            .after(&old)?
            .reason(Some(format!("superseded by {}", successor.id)));
        self.audit.record(&mut batch, retired).await?;
        if let Some(mut request) = pending {
            let open = request.clone();
            let reason = format!("quotation {old_id} superseded by {}", successor.id);
            request.cancel(&reason, now)?;
            batch.push(Write::Approval(request.clone()));
            let withdrawn = EventDraft::new(actor, EntityKind::Approval, &request.id, "cancelled")
                .before(&open)?
                .after(&request)?
                .reason(Some(reason));
            self.audit.record(&mut batch, withdrawn).await?;
            info!(approval_id = %request.id, quotation_id = old_id, "pending approval withdrawn");
        }
        self.stores.uow.commit(batch).await?;

        info!(quotation_id = %successor.id, supersedes = old_id, actor, "quotation superseded");
        Ok(successor)
    }

    async fn create(
        &self,
        payload: QuotationPayload,
        status: QuotationStatus,
        supersedes: Option<String>,
        actor: &str,
    ) -> Result<Quotation> {
        let quotation = self.build(payload, status, supersedes, actor).await?;
        let mut batch = WriteBatch::new().with(Write::Quotation(quotation.clone()));
        let verb = if status == QuotationStatus::Draft { "drafted" } else { "submitted" };
        let draft = EventDraft::new(actor, EntityKind::Quotation, &quotation.id, verb).after(&quotation)?;
        self.audit.record(&mut batch, draft).await?;
        self.stores.uow.commit(batch).await?;

        info!(
            quotation_id = %quotation.id,
            customer = %quotation.customer_ref,
            total = %quotation.total,
            currency = %quotation.currency,
            status = %quotation.status,
            "quotation created"
        );
        Ok(quotation)
    }

    /// Validate `payload` against reference data and price its lines.
    async fn build(
        &self,
        payload: QuotationPayload,
        status: QuotationStatus,
        supersedes: Option<String>,
        actor: &str,
    ) -> Result<Quotation> {
        payload.validate()?;
        let customer = self.reference.customer(&payload.customer_ref).await?;
        if customer.status != RecordStatus::Active {
            return Err(TradeflowError::validation(format!("customer {} is inactive", customer.id)));
        }

        let mut lines = Vec::with_capacity(payload.lines.len());
        for (index, input) in payload.lines.iter().enumerate() {
            let product = self.reference.product(&input.product_ref).await?;
            if product.status != RecordStatus::Active {
                return Err(TradeflowError::validation(format!(
                    "line {index}: product {} is inactive",
                    product.id
                )));
            }
            let unit_price = match input.unit_price {
                Some(price) => price,
                None => {
                    let resolved = self
                        .reference
                        .resolve_price(&product, &customer.id, payload.date)
                        .await?
                        .ok_or_else(|| {
                            TradeflowError::validation(format!(
                                "line {index}: no price for {} on {}",
                                product.id, payload.date
                            ))
                        })?;
                    self.rates
                        .convert(resolved.unit_price, resolved.currency, payload.currency, payload.date)
                        .await?
                        .round_dp(4)
                }
            };
            let mut line = LineItem::priced(&product.id, input.qty, unit_price, payload.currency);
            line.description = input.description.clone().or_else(|| Some(product.name.clone()));
            lines.push(line);
        }

        let tax_rate = payload.tax_rate.unwrap_or(self.default_tax_rate);
        let totals = Totals::compute(&lines, tax_rate, payload.currency);
        let id = self.ids.next_id(IdFamily::Quotation, payload.date).await?;
        let now = self.clock.now();
        Ok(Quotation {
            number: id.clone(),
            id,
            customer_ref: customer.id,
            date: payload.date,
            currency: payload.currency,
            lines,
            tax_rate,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            status,
            supersedes,
            superseded_by: None,
            note: payload.note,
            created_by: actor.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Writes that approve or reject a quotation after its approval request
    /// resolved. `None` when it already carries that status. The caller must
    /// hold the quotation's lock.
    pub async fn prepare_resolution(
        &self,
        id: &str,
        approved: bool,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Option<(Quotation, WriteBatch)>> {
        let mut quotation = self.get(id).await?;
        let target = if approved { QuotationStatus::Approved } else { QuotationStatus::Rejected };
        if quotation.status == target {
            return Ok(None);
        }
        let before = quotation.clone();
        let now = self.clock.now();
        if approved {
            quotation.approve(now)?;
        } else {
            quotation.reject(now)?;
        }

        let mut batch = WriteBatch::new().with(Write::Quotation(quotation.clone()));
        let draft = EventDraft::new(actor, EntityKind::Quotation, id, target.as_str())
            .before(&before)?
            .after(&quotation)?
            .reason(reason);
        self.audit.record(&mut batch, draft).await?;
        Ok(Some((quotation, batch)))
    }

    pub async fn get(&self, id: &str) -> Result<Quotation> {
        self.stores
            .quotations
            .get_quotation(id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::Quotation, id))
    }

    pub async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>> {
        self.stores.quotations.list_quotations(filter).await
    }
}
