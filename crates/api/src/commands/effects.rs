//! Effect retry commands

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

/// Re-run the failed and pending effects of `source_id`.
pub async fn retry_effects(ctx: &AppContext, source_id: &str) -> CommandEnvelope {
    execute_command("effects::retry", || async { ctx.engine.retry_effects(source_id).await }).await
}

/// Effects of one source, or every unfinished effect.
pub async fn list_effects(ctx: &AppContext, source_id: Option<&str>) -> CommandEnvelope {
    execute_command("effects::list", || async {
        match source_id {
            Some(source_id) => ctx.engine.effects_for(source_id).await,
            None => ctx.engine.unfinished_effects().await,
        }
    })
    .await
}
