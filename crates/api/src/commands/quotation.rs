//! Quotation commands

use tradeflow_domain::{QuotationFilter, QuotationPayload};

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

pub async fn submit_quotation(ctx: &AppContext, payload: QuotationPayload, actor: &str) -> CommandEnvelope {
    execute_command("quotation::submit", || async move { ctx.engine.submit_quotation(payload, actor).await })
        .await
}

pub async fn draft_quotation(ctx: &AppContext, payload: QuotationPayload, actor: &str) -> CommandEnvelope {
    execute_command("quotation::draft", || async move { ctx.engine.draft_quotation(payload, actor).await })
        .await
}

pub async fn supersede_quotation(
    ctx: &AppContext,
    old_id: &str,
    payload: QuotationPayload,
    actor: &str,
) -> CommandEnvelope {
    execute_command("quotation::supersede", || async move {
        ctx.engine.supersede_quotation(old_id, payload, actor).await
    })
    .await
}

/// Approve the quotation's pending request, submitting one if needed.
pub async fn approve_quotation(ctx: &AppContext, id: &str, approver: &str, note: Option<String>) -> CommandEnvelope {
    execute_command("quotation::approve", || async move { ctx.engine.approve_quotation(id, approver, note).await })
        .await
}

pub async fn reject_quotation(ctx: &AppContext, id: &str, approver: &str, reason: &str) -> CommandEnvelope {
    execute_command("quotation::reject", || async { ctx.engine.reject_quotation(id, approver, reason).await })
        .await
}

pub async fn get_quotation(ctx: &AppContext, id: &str) -> CommandEnvelope {
    execute_command("quotation::get", || async { ctx.engine.get_quotation(id).await }).await
}

pub async fn list_quotations(ctx: &AppContext, filter: QuotationFilter) -> CommandEnvelope {
    execute_command("quotation::list", || async move { ctx.engine.list_quotations(&filter).await }).await
}
