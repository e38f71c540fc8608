use tracing::info;
use tradeflow_domain::{ApprovalType, EffectRecord, EffectTrigger, Result, TradeflowError};

use super::unexpected;
use crate::effects::handler::EffectContext;
use crate::store::WriteBatch;

pub(super) async fn mark_target(ctx: &EffectContext, record: &EffectRecord, approved: bool) -> Result<WriteBatch> {
    let (request_type, target_ref, approver, reason) = match &record.trigger {
        EffectTrigger::ApprovalApproved { request_type, target_ref, approver, .. } => {
            (*request_type, target_ref, approver, None)
        }
        EffectTrigger::ApprovalRejected { request_type, target_ref, approver, reason, .. } => {
            (*request_type, target_ref, approver, reason.clone())
        }
        _ => return Err(unexpected(record)),
    };
    let prepared = match request_type {
        ApprovalType::Quotation => ctx
            .quotations
            .prepare_resolution(target_ref, approved, approver, reason)
            .await?
            .map(|(_, batch)| batch),
        ApprovalType::PurchaseOrder => ctx
            .purchasing
            .prepare_resolution(target_ref, approved, approver, reason)
            .await?
            .map(|(_, batch)| batch),
        ApprovalType::Expense | ApprovalType::Vacation | ApprovalType::Other => None,
    };
    Ok(prepared.unwrap_or_default())
}

pub(super) async fn create_workflow(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let EffectTrigger::ApprovalApproved { approval_id, target_ref, approver, .. } = &record.trigger else {
        return Err(unexpected(record));
    };
    if let Some(existing) = ctx.stores.workflows.find_active_workflow(target_ref).await? {
        if existing.approval_ref.as_deref() == Some(approval_id.as_str()) {
            return Ok(WriteBatch::new());
        }
        return Err(TradeflowError::DuplicateWorkflow(format!(
            "quotation {target_ref} already has workflow {}",
            existing.id
        )));
    }
    let quotation = ctx.quotations.get(target_ref).await?;
    let (workflow, batch) = ctx.workflows.prepare_start(&quotation, Some(approval_id.clone()), approver, None).await?;
    info!(workflow_id = %workflow.id, quotation = %quotation.id, "workflow created from approval");
    Ok(batch)
}

pub(super) async fn post_potential_income(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let EffectTrigger::ApprovalApproved { target_ref, approver, .. } = &record.trigger else {
        return Err(unexpected(record));
    };
    let quotation = ctx.quotations.get(target_ref).await?;
    let (_, batch) = ctx.sales.prepare_forecast(&quotation, approver).await?;
    Ok(batch)
}
