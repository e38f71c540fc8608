//! Master data commands

use tradeflow_domain::{DeleteMode, ReferenceFilter, ReferenceKind, ReferenceRecord, TradeflowError};

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

pub async fn put_reference(ctx: &AppContext, record: ReferenceRecord, actor: &str) -> CommandEnvelope {
    execute_command("reference::put", || async move {
        ctx.engine.put_reference(record, actor).await.map(|r| r.redacted())
    })
    .await
}

pub async fn get_reference(ctx: &AppContext, kind: ReferenceKind, id: &str) -> CommandEnvelope {
    execute_command("reference::get", || async {
        ctx.engine.get_reference(kind, id).await.map(|r| r.redacted())
    })
    .await
}

pub async fn list_reference(ctx: &AppContext, kind: ReferenceKind, filter: ReferenceFilter) -> CommandEnvelope {
    execute_command("reference::list", || async move {
        let records = ctx.engine.list_reference(kind, &filter).await?;
        Ok::<_, TradeflowError>(records.into_iter().map(|r| r.redacted()).collect::<Vec<_>>())
    })
    .await
}

pub async fn delete_reference(
    ctx: &AppContext,
    kind: ReferenceKind,
    id: &str,
    mode: DeleteMode,
    actor: &str,
) -> CommandEnvelope {
    execute_command("reference::delete", || async {
        ctx.engine.delete_reference(kind, id, mode, actor).await?;
        Ok::<_, TradeflowError>(serde_json::json!({ "kind": kind, "id": id, "mode": mode }))
    })
    .await
}

pub async fn set_password(ctx: &AppContext, employee_id: &str, password: &str, actor: &str) -> CommandEnvelope {
    execute_command("reference::set_password", || async {
        ctx.engine.set_password(employee_id, password, actor).await?;
        Ok::<_, TradeflowError>(serde_json::json!({ "employee_id": employee_id }))
    })
    .await
}

pub async fn authenticate(ctx: &AppContext, employee_id: &str, password: &str) -> CommandEnvelope {
    execute_command("reference::authenticate", || async {
        let employee = ctx.engine.authenticate(employee_id, password).await?;
        Ok::<_, TradeflowError>(ReferenceRecord::Employee(employee).redacted())
    })
    .await
}
