use rust_decimal::Decimal;
use tradeflow_domain::{
    CashEntryType, CashKind, CashPosting, CashSource, EffectRecord, EffectTrigger, EntityKind,
    Result, TradeflowError,
};

use super::{stage_source, unexpected};
use crate::effects::handler::EffectContext;
use crate::sales::SalesSource;
use crate::store::WriteBatch;

pub(super) async fn issue_invoice(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let (workflow_id, quotation_ref, actor) = stage_source(record)?;
    let workflow = ctx.workflows.get(workflow_id).await?;
    let quotation = ctx.quotations.get(quotation_ref).await?;
    let prepared = ctx.invoices.prepare_issue(&workflow, &quotation, actor).await?;
    Ok(prepared.map(|(_, batch)| batch).unwrap_or_default())
}

/// Expected receipt of the workflow's invoice, dated at its due date.
pub(super) async fn project_receivable(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let (workflow_id, _, actor) = stage_source(record)?;
    let invoice = ctx
        .invoices
        .find_by_workflow(workflow_id)
        .await?
        .ok_or_else(|| TradeflowError::NotFound(format!("invoice for workflow '{workflow_id}'")))?;
    if invoice.total <= Decimal::ZERO {
        return Ok(WriteBatch::new());
    }
    let posting = CashPosting {
        kind: CashKind::Income,
        entry_type: CashEntryType::Projected,
        amount: invoice.total,
        currency: invoice.currency,
        date: invoice.due_date,
        source_type: CashSource::Invoice,
        source_id: invoice.id.clone(),
        account_ref: None,
        workflow_ref: Some(workflow_id.to_string()),
        description: format!("Receivable {} from {}", invoice.id, invoice.customer_ref),
    };
    let (_, batch) = ctx.cash.prepare(posting, actor).await?;
    Ok(batch)
}

pub(super) async fn post_payment_income(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let EffectTrigger::PaymentReceived { invoice_id, payment_id, amount, date, method, actor } = &record.trigger
    else {
        return Err(unexpected(record));
    };
    let invoice = ctx
        .stores
        .invoices
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| TradeflowError::not_found(EntityKind::Invoice, invoice_id))?;
    let posting = CashPosting {
        kind: CashKind::Income,
        entry_type: CashEntryType::Actual,
        amount: amount.amount,
        currency: amount.currency,
        date: *date,
        source_type: CashSource::Cash,
        source_id: payment_id.clone(),
        account_ref: None,
        workflow_ref: invoice.workflow_ref.clone(),
        description: format!("Payment {payment_id} ({method}) on {invoice_id}"),
    };
    let (_, batch) = ctx.cash.prepare(posting, actor).await?;
    Ok(batch)
}

pub(super) async fn recognize_sale(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let (source, actor) = match &record.trigger {
        EffectTrigger::ApprovalApproved { target_ref, approver, .. } => {
            (SalesSource::Quotation { quotation_id: target_ref.clone() }, approver)
        }
        EffectTrigger::PaymentReceived { invoice_id, payment_id, actor, .. } => (
            SalesSource::Cash { invoice_id: invoice_id.clone(), payment_id: payment_id.clone() },
            actor,
        ),
        _ => return Err(unexpected(record)),
    };
    let (_, batch) = ctx.sales.prepare(&source, actor).await?;
    Ok(batch)
}
