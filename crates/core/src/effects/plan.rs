//! Which effects a state transition plans, in dispatch order

use chrono::{DateTime, Utc};
use tradeflow_domain::{
    ApprovalType, EffectKey, EffectKind, EffectRecord, EffectTrigger, EntityKind,
    RecognitionBasis, StageName,
};

/// Facts about the source the plan depends on.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext {
    /// Lines of the quotation behind a workflow; one inventory effect each.
    pub line_count: usize,
    pub recognition: RecognitionBasis,
}

impl PlanContext {
    pub const fn new(line_count: usize, recognition: RecognitionBasis) -> Self {
        Self { line_count, recognition }
    }
}

/// Effect kinds (with line index) `trigger` requires, in order.
pub fn effect_kinds(trigger: &EffectTrigger, ctx: PlanContext) -> Vec<(EffectKind, Option<u32>)> {
    let whole = |kind| (kind, None);
    let per_line = |kind| {
        (0..ctx.line_count).map(move |i| (kind, u32::try_from(i).ok())).collect::<Vec<_>>()
    };

    match trigger {
        EffectTrigger::ApprovalApproved { request_type, .. } => match request_type {
            ApprovalType::Quotation => {
                let mut kinds = vec![
                    whole(EffectKind::MarkTargetApproved),
                    whole(EffectKind::CreateWorkflow),
                    whole(EffectKind::PostPotentialIncome),
                ];
                if ctx.recognition == RecognitionBasis::OnApproval {
                    kinds.push(whole(EffectKind::RecognizeSale));
                }
                kinds
            }
            ApprovalType::PurchaseOrder => vec![whole(EffectKind::MarkTargetApproved)],
            ApprovalType::Expense | ApprovalType::Vacation | ApprovalType::Other => Vec::new(),
        },
        EffectTrigger::ApprovalRejected { request_type, .. } => match request_type {
            ApprovalType::Quotation | ApprovalType::PurchaseOrder => {
                vec![whole(EffectKind::MarkTargetRejected)]
            }
            ApprovalType::Expense | ApprovalType::Vacation | ApprovalType::Other => Vec::new(),
        },
        EffectTrigger::StageDone { stage, .. } => match stage {
            StageName::CreatePurchaseOrder => vec![whole(EffectKind::CreatePurchaseOrder)],
            StageName::ReceiveInventory => {
                let mut kinds = vec![whole(EffectKind::ReceivePurchaseOrder)];
                kinds.extend(per_line(EffectKind::InventoryCredit));
                kinds.push(whole(EffectKind::RecordSupplierExpense));
                kinds
            }
            StageName::PrepareShipment => per_line(EffectKind::InventoryDebit),
            StageName::IssueInvoice => {
                vec![whole(EffectKind::IssueInvoice), whole(EffectKind::ProjectReceivable)]
            }
            StageName::CollectPayment => Vec::new(),
        },
        EffectTrigger::WorkflowCompleted { .. } => vec![whole(EffectKind::ClosePurchaseOrder)],
        EffectTrigger::PaymentReceived { .. } => {
            let mut kinds = vec![whole(EffectKind::PostPaymentIncome)];
            if ctx.recognition == RecognitionBasis::OnPayment {
                kinds.push(whole(EffectKind::RecognizeSale));
            }
            kinds
        }
    }
}

/// Source id and kind effects of `trigger` are filed under.
pub fn source_of(trigger: &EffectTrigger) -> (&str, EntityKind) {
    match trigger {
        EffectTrigger::ApprovalApproved { approval_id, .. }
        | EffectTrigger::ApprovalRejected { approval_id, .. } => (approval_id, EntityKind::Approval),
        EffectTrigger::StageDone { workflow_id, .. }
        | EffectTrigger::WorkflowCompleted { workflow_id, .. } => (workflow_id, EntityKind::Workflow),
        EffectTrigger::PaymentReceived { payment_id, .. } => (payment_id, EntityKind::Invoice),
    }
}

/// Planned (pending) records for `trigger`, numbered from `first_ordinal`.
pub fn plan(
    trigger: &EffectTrigger,
    ctx: PlanContext,
    first_ordinal: u32,
    at: DateTime<Utc>,
) -> Vec<EffectRecord> {
    let (source_id, source_kind) = source_of(trigger);
    effect_kinds(trigger, ctx)
        .into_iter()
        .zip(first_ordinal..)
        .map(|((kind, line), ordinal)| {
            EffectRecord::planned(
                EffectKey::new(source_id, kind, line),
                ordinal,
                source_kind,
                trigger.clone(),
                at,
            )
        })
        .collect()
}

/// Ordinal after the highest one already planned for a source.
pub fn next_ordinal(existing: &[EffectRecord]) -> u32 {
    existing.iter().map(|r| r.ordinal + 1).max().unwrap_or(0)
}
