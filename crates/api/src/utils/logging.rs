use std::time::Duration;

use tracing::{info, warn};

/// Log the outcome of a command execution with structured fields.
///
/// `command` is a stable identifier such as `"workflow::advance"`; callers
/// must not put payload values in it.
#[inline]
pub fn log_command_execution(command: &str, elapsed: Duration, error_kind: Option<&str>) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match error_kind {
        None => info!(command, duration_ms, "command_execution_success"),
        Some(error_kind) => warn!(command, duration_ms, error_kind, "command_execution_failure"),
    }
}
