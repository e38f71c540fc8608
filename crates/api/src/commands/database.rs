//! Database lifecycle commands

use std::sync::Arc;

use serde::Serialize;
use tokio::task;
use tradeflow_domain::TradeflowError;
use tradeflow_infra::InfraError;

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub path: String,
    pub schema_version: Option<i32>,
}

/// Report the schema the context brought up to date on open.
pub async fn init_db(ctx: &AppContext) -> CommandEnvelope {
    execute_command("database::init", || async {
        let db = Arc::clone(ctx.store.db());
        let schema_version = task::spawn_blocking(move || db.schema_version())
            .await
            .map_err(InfraError::from)??;
        let path = ctx.store.db().path().display().to_string();
        Ok::<_, TradeflowError>(DatabaseInfo { path, schema_version })
    })
    .await
}

pub async fn health(ctx: &AppContext) -> CommandEnvelope {
    execute_command("database::health", || async { Ok(ctx.health_check().await) }).await
}
