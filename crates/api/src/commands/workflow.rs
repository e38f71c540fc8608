//! Workflow commands

use tradeflow_domain::WorkflowFilter;

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

pub async fn advance_workflow(ctx: &AppContext, id: &str, actor: &str, note: Option<String>) -> CommandEnvelope {
    execute_command("workflow::advance", || async move { ctx.engine.advance_workflow(id, actor, note).await })
        .await
}

pub async fn skip_workflow_stage(ctx: &AppContext, id: &str, actor: &str, reason: &str) -> CommandEnvelope {
    execute_command("workflow::skip", || async { ctx.engine.skip_workflow_stage(id, actor, reason).await }).await
}

pub async fn rewind_workflow(ctx: &AppContext, id: &str, actor: &str, reason: &str) -> CommandEnvelope {
    execute_command("workflow::rewind", || async { ctx.engine.rewind_workflow(id, actor, reason).await }).await
}

pub async fn cancel_workflow(ctx: &AppContext, id: &str, actor: &str, reason: &str) -> CommandEnvelope {
    execute_command("workflow::cancel", || async { ctx.engine.cancel_workflow(id, actor, reason).await }).await
}

pub async fn start_workflow_without_approval(
    ctx: &AppContext,
    quotation_id: &str,
    actor: &str,
    reason: &str,
) -> CommandEnvelope {
    execute_command("workflow::start_without_approval", || async {
        ctx.engine.start_workflow_without_approval(quotation_id, actor, reason).await
    })
    .await
}

pub async fn get_workflow(ctx: &AppContext, id: &str) -> CommandEnvelope {
    execute_command("workflow::get", || async { ctx.engine.get_workflow(id).await }).await
}

pub async fn workflow_for_quotation(ctx: &AppContext, quotation_id: &str) -> CommandEnvelope {
    execute_command("workflow::for_quotation", || async { ctx.engine.workflow_for_quotation(quotation_id).await })
        .await
}

pub async fn list_workflows(ctx: &AppContext, filter: WorkflowFilter) -> CommandEnvelope {
    execute_command("workflow::list", || async move { ctx.engine.list_workflows(&filter).await }).await
}
