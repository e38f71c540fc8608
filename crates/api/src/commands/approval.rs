//! Approval commands

use serde::{Deserialize, Serialize};
use tradeflow_domain::{Decision, NewApprovalRequest};

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecideApproval {
    pub approval_id: String,
    pub approver: String,
    pub decision: Decision,
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn submit_approval(ctx: &AppContext, request: NewApprovalRequest) -> CommandEnvelope {
    execute_command("approval::submit", || async move { ctx.engine.submit_approval(request).await }).await
}

pub async fn decide_approval(ctx: &AppContext, request: DecideApproval) -> CommandEnvelope {
    execute_command("approval::decide", || async move {
        ctx.engine
            .decide_approval(&request.approval_id, &request.approver, request.decision, request.note)
            .await
    })
    .await
}

pub async fn cancel_approval(ctx: &AppContext, id: &str, actor: &str, reason: &str) -> CommandEnvelope {
    execute_command("approval::cancel", || async { ctx.engine.cancel_approval(id, actor, reason).await }).await
}

pub async fn get_approval(ctx: &AppContext, id: &str) -> CommandEnvelope {
    execute_command("approval::get", || async { ctx.engine.get_approval(id).await }).await
}
