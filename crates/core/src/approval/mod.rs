//! Approval engine
//!
//! Generic multi-step approval requests. Deciding the final required step
//! (or rejecting any step) plans the effects of the resolution in the same
//! transaction as the decision; the caller dispatches them afterwards.

mod policy;

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tradeflow_domain::{
    ApprovalFilter, ApprovalRequest, ApprovalType, Decision, DecisionOutcome, EffectTrigger,
    EntityKind, IdFamily, Money, NewApprovalRequest, PurchaseOrderStatus, QuotationStatus,
    RecognitionBasis, Result, TradeflowError,
};

pub use policy::{DefaultRoutingPolicy, RoutingPolicy};

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::currency::RateService;
use crate::effects::plan::{self, PlanContext};
use crate::ids::IdService;
use crate::locks::{keys, AggregateLocks};
use crate::store::{Stores, Write, WriteBatch};

/// A decision and what it did to the request.
#[derive(Debug, Clone, Serialize)]
pub struct Decided {
    pub request: ApprovalRequest,
    pub outcome: DecisionOutcome,
    /// True when the decision planned effects that still need dispatching.
    pub planned_effects: bool,
}

pub struct ApprovalService {
    stores: Stores,
    policy: Arc<dyn RoutingPolicy>,
    rates: Arc<RateService>,
    ids: Arc<IdService>,
    audit: Arc<AuditLog>,
    locks: Arc<AggregateLocks>,
    clock: Arc<dyn Clock>,
    recognition: RecognitionBasis,
}

impl ApprovalService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: Stores,
        policy: Arc<dyn RoutingPolicy>,
        rates: Arc<RateService>,
        ids: Arc<IdService>,
        audit: Arc<AuditLog>,
        locks: Arc<AggregateLocks>,
        clock: Arc<dyn Clock>,
        recognition: RecognitionBasis,
    ) -> Self {
        Self { stores, policy, rates, ids, audit, locks, clock, recognition }
    }

    pub async fn submit(&self, mut request: NewApprovalRequest) -> Result<ApprovalRequest> {
        if request.target_ref.trim().is_empty() {
            return Err(TradeflowError::validation("target_ref is required"));
        }
        if request.requester_ref.trim().is_empty() {
            return Err(TradeflowError::validation("requester_ref is required"));
        }
        if request.amount.is_some_and(|m| m.amount.is_sign_negative()) {
            return Err(TradeflowError::validation("amount must not be negative"));
        }

        let _guard = self.locks.lock(&keys::approval_target(&request.target_ref)).await;
        if let Some(existing) = self.stores.approvals.find_pending_approval(&request.target_ref).await? {
            return Err(TradeflowError::state_conflict(format!(
                "{} already has pending approval request {}",
                request.target_ref, existing.id
            )));
        }
        self.check_target(&mut request).await?;

        let today = self.clock.today();
        let amount_usd = match request.amount {
            Some(amount) => Some(self.rates.to_usd(amount, today).await?),
            None => None,
        };
        let chain = self.policy.route(&request, amount_usd).await?;
        if chain.is_empty() {
            return Err(TradeflowError::internal("routing policy returned an empty chain"));
        }

        let id = self.ids.next_id(IdFamily::Approval, today).await?;
        let approval = ApprovalRequest::open(id, request, chain, self.clock.now());
        let mut batch = WriteBatch::new().with(Write::Approval(approval.clone()));
        let draft = EventDraft::new(&approval.requester_ref, EntityKind::Approval, &approval.id, "submitted")
            .after(&approval)?;
        self.audit.record(&mut batch, draft).await?;
        self.stores.uow.commit(batch).await?;

        info!(
            approval_id = %approval.id,
            request_type = %approval.request_type,
            target = %approval.target_ref,
            steps = approval.approval_chain.len(),
            "approval request submitted"
        );
        Ok(approval)
    }

    /// Quotation and purchase-order targets must exist and await approval;
    /// their total is used when the request carries no amount.
    async fn check_target(&self, request: &mut NewApprovalRequest) -> Result<()> {
        if let Some(total) = self.open_target_total(request.request_type, &request.target_ref).await? {
            request.amount.get_or_insert(total);
        }
        Ok(())
    }

    /// Total of a quotation or purchase order that still awaits approval.
    /// Other request types have no stored target.
    async fn open_target_total(&self, request_type: ApprovalType, target_ref: &str) -> Result<Option<Money>> {
        match request_type {
            ApprovalType::Quotation => {
                let quotation = self
                    .stores
                    .quotations
                    .get_quotation(target_ref)
                    .await?
                    .ok_or_else(|| TradeflowError::not_found(EntityKind::Quotation, target_ref))?;
                if quotation.status != QuotationStatus::Submitted {
                    return Err(TradeflowError::state_conflict(format!(
                        "quotation {} is {}; only submitted quotations can be approved",
                        quotation.id, quotation.status
                    )));
                }
                Ok(Some(quotation.total_money()))
            }
            ApprovalType::PurchaseOrder => {
                let order = self
                    .stores
                    .purchase_orders
                    .get_purchase_order(target_ref)
                    .await?
                    .ok_or_else(|| TradeflowError::not_found(EntityKind::PurchaseOrder, target_ref))?;
                if order.status != PurchaseOrderStatus::Draft {
                    return Err(TradeflowError::state_conflict(format!(
                        "purchase order {} is {}; only drafts need approval",
                        order.id, order.status
                    )));
                }
                Ok(Some(order.total_money()))
            }
            ApprovalType::Expense | ApprovalType::Vacation | ApprovalType::Other => Ok(None),
        }
    }

    pub async fn decide(
        &self,
        id: &str,
        approver: &str,
        decision: Decision,
        note: Option<String>,
    ) -> Result<Decided> {
        if approver.trim().is_empty() {
            return Err(TradeflowError::Unauthorized("an approver is required".into()));
        }
        let _guard = self.locks.lock(&keys::approval(id)).await;
        let mut request = self.get(id).await?;
        let before = request.clone();
        let now = self.clock.now();
        let outcome = request.decide(approver, decision, note.clone(), now)?;
        if !outcome.changed_state() {
            info!(approval_id = id, approver, "decision replayed; nothing to do");
            return Ok(Decided { request, outcome, planned_effects: false });
        }
        if outcome == DecisionOutcome::Approved {
            // The target may have been retired while the request sat in the queue.
            self.open_target_total(request.request_type, &request.target_ref).await?;
        }

        let verb = match outcome {
            DecisionOutcome::Advanced => "step_approved",
            DecisionOutcome::Approved => "approved",
            DecisionOutcome::Rejected => "rejected",
            DecisionOutcome::Replayed => "replayed",
        };
        let mut batch = WriteBatch::new().with(Write::Approval(request.clone()));
        let draft = EventDraft::new(approver, EntityKind::Approval, id, verb)
            .before(&before)?
            .after(&request)?
            .reason(note.clone());
        self.audit.record(&mut batch, draft).await?;

        let trigger = match outcome {
            DecisionOutcome::Approved => Some(EffectTrigger::ApprovalApproved {
                approval_id: request.id.clone(),
                request_type: request.request_type,
                target_ref: request.target_ref.clone(),
                approver: approver.to_string(),
            }),
            DecisionOutcome::Rejected => Some(EffectTrigger::ApprovalRejected {
                approval_id: request.id.clone(),
                request_type: request.request_type,
                target_ref: request.target_ref.clone(),
                approver: approver.to_string(),
                reason: note,
            }),
            DecisionOutcome::Advanced | DecisionOutcome::Replayed => None,
        };
        let planned = trigger
            .map(|t| plan::plan(&t, PlanContext::new(0, self.recognition), 0, now))
            .unwrap_or_default();
        let planned_effects = !planned.is_empty();
        batch.extend(planned.into_iter().map(Write::PlanEffect));
        self.stores.uow.commit(batch).await?;

        info!(approval_id = id, approver, outcome = ?outcome, "approval decided");
        Ok(Decided { request, outcome, planned_effects })
    }

    pub async fn cancel(&self, id: &str, actor: &str, reason: &str) -> Result<ApprovalRequest> {
        let _guard = self.locks.lock(&keys::approval(id)).await;
        let mut request = self.get(id).await?;
        let before = request.clone();
        request.cancel(reason, self.clock.now())?;

        let mut batch = WriteBatch::new().with(Write::Approval(request.clone()));
        let draft = EventDraft::new(actor, EntityKind::Approval, id, "cancelled")
            .before(&before)?
            .after(&request)?
            .reason(Some(reason.trim().to_string()));
        self.audit.record(&mut batch, draft).await?;
        self.stores.uow.commit(batch).await?;

        info!(approval_id = id, actor, "approval request cancelled");
        Ok(request)
    }

    pub async fn get(&self, id: &str) -> Result<ApprovalRequest> {
        self.stores
            .approvals
            .get_approval(id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::Approval, id))
    }

    pub async fn find_pending(&self, target_ref: &str) -> Result<Option<ApprovalRequest>> {
        self.stores.approvals.find_pending_approval(target_ref).await
    }

    pub async fn list(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>> {
        self.stores.approvals.list_approvals(filter).await
    }
}
