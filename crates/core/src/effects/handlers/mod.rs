//! Built-in effect handlers

mod approval;
mod billing;
mod inventory;
mod procurement;

use async_trait::async_trait;
use tradeflow_domain::{ApprovalType, EffectKind, EffectRecord, EffectTrigger, Result, TradeflowError};

use super::handler::{EffectContext, EffectHandler};
use crate::locks::keys;
use crate::store::WriteBatch;

pub(crate) const BUILTIN_KINDS: [EffectKind; 14] = [
    EffectKind::MarkTargetApproved,
    EffectKind::MarkTargetRejected,
    EffectKind::CreateWorkflow,
    EffectKind::PostPotentialIncome,
    EffectKind::CreatePurchaseOrder,
    EffectKind::ReceivePurchaseOrder,
    EffectKind::InventoryCredit,
    EffectKind::RecordSupplierExpense,
    EffectKind::InventoryDebit,
    EffectKind::IssueInvoice,
    EffectKind::ProjectReceivable,
    EffectKind::ClosePurchaseOrder,
    EffectKind::PostPaymentIncome,
    EffectKind::RecognizeSale,
];

pub(crate) struct BuiltinHandler {
    kind: EffectKind,
}

impl BuiltinHandler {
    pub(crate) const fn new(kind: EffectKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl EffectHandler for BuiltinHandler {
    fn lock_key(&self, record: &EffectRecord) -> Option<String> {
        match (&record.trigger, self.kind) {
            (
                EffectTrigger::ApprovalApproved { request_type, target_ref, .. }
                | EffectTrigger::ApprovalRejected { request_type, target_ref, .. },
                EffectKind::MarkTargetApproved
                | EffectKind::MarkTargetRejected
                | EffectKind::CreateWorkflow
                | EffectKind::PostPotentialIncome,
            ) => match request_type {
                ApprovalType::PurchaseOrder => Some(keys::purchase_order(target_ref)),
                _ => Some(keys::quotation(target_ref)),
            },
            (
                EffectTrigger::StageDone { workflow_id, .. } | EffectTrigger::WorkflowCompleted { workflow_id, .. },
                EffectKind::CreatePurchaseOrder
                | EffectKind::ReceivePurchaseOrder
                | EffectKind::RecordSupplierExpense
                | EffectKind::IssueInvoice
                | EffectKind::ProjectReceivable
                | EffectKind::ClosePurchaseOrder,
            ) => Some(keys::workflow_documents(workflow_id)),
            _ => None,
        }
    }

    async fn apply(&self, ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
        match self.kind {
            EffectKind::MarkTargetApproved => approval::mark_target(ctx, record, true).await,
            EffectKind::MarkTargetRejected => approval::mark_target(ctx, record, false).await,
            EffectKind::CreateWorkflow => approval::create_workflow(ctx, record).await,
            EffectKind::PostPotentialIncome => approval::post_potential_income(ctx, record).await,
            EffectKind::CreatePurchaseOrder => procurement::create_purchase_order(ctx, record).await,
            EffectKind::ReceivePurchaseOrder => procurement::receive_purchase_order(ctx, record).await,
            EffectKind::RecordSupplierExpense => procurement::record_supplier_expense(ctx, record).await,
            EffectKind::ClosePurchaseOrder => procurement::close_purchase_order(ctx, record).await,
            EffectKind::InventoryCredit => inventory::adjust(ctx, record, false).await,
            EffectKind::InventoryDebit => inventory::adjust(ctx, record, true).await,
            EffectKind::IssueInvoice => billing::issue_invoice(ctx, record).await,
            EffectKind::ProjectReceivable => billing::project_receivable(ctx, record).await,
            EffectKind::PostPaymentIncome => billing::post_payment_income(ctx, record).await,
            EffectKind::RecognizeSale => billing::recognize_sale(ctx, record).await,
        }
    }
}

fn unexpected(record: &EffectRecord) -> TradeflowError {
    TradeflowError::internal(format!("effect {} cannot run from trigger {:?}", record.key, record.trigger))
}

/// Workflow id, quotation and actor of a stage or completion trigger.
fn stage_source(record: &EffectRecord) -> Result<(&str, &str, &str)> {
    match &record.trigger {
        EffectTrigger::StageDone { workflow_id, quotation_ref, actor, .. }
        | EffectTrigger::WorkflowCompleted { workflow_id, quotation_ref, actor } => {
            Ok((workflow_id.as_str(), quotation_ref.as_str(), actor.as_str()))
        }
        _ => Err(unexpected(record)),
    }
}
