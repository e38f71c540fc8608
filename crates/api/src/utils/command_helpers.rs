//! Command execution helpers
//!
//! Every handler funnels through [`execute_command`] so timing, logging and
//! the envelope shape stay identical across commands.

use std::future::Future;
use std::time::Instant;

use serde::Serialize;
use tradeflow_domain::Result as DomainResult;

use crate::envelope::CommandEnvelope;
use crate::utils::logging::log_command_execution;

/// Run a command, log its outcome and wrap the result in an envelope.
///
/// # Example
///
/// ```rust,ignore
/// pub async fn get_workflow(ctx: &AppContext, id: &str) -> CommandEnvelope {
///     execute_command("workflow::get", || async { ctx.engine.get_workflow(id).await }).await
/// }
/// ```
pub async fn execute_command<F, Fut, T>(command_name: &str, command_fn: F) -> CommandEnvelope
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
    T: Serialize,
{
    let start = Instant::now();

    let result = command_fn().await;

    let envelope = CommandEnvelope::from_result(&result);
    log_command_execution(command_name, start.elapsed(), envelope.error_kind.as_deref());
    envelope
}
