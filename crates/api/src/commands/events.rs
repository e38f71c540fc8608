//! Event log queries

use tradeflow_domain::EntityKind;

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

pub async fn event_history(ctx: &AppContext, kind: EntityKind, id: &str) -> CommandEnvelope {
    execute_command("events::history", || async { ctx.engine.event_history(kind, id).await }).await
}

/// The last `limit` events, oldest first.
pub async fn recent_events(ctx: &AppContext, limit: usize) -> CommandEnvelope {
    execute_command("events::recent", || async { ctx.engine.recent_events(limit).await }).await
}
