use tradeflow_domain::{EffectRecord, Result};

use super::stage_source;
use crate::effects::handler::EffectContext;
use crate::store::WriteBatch;

pub(super) async fn create_purchase_order(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let (workflow_id, quotation_ref, actor) = stage_source(record)?;
    let workflow = ctx.workflows.get(workflow_id).await?;
    let quotation = ctx.quotations.get(quotation_ref).await?;
    let prepared = ctx.purchasing.prepare_from_workflow(&workflow, &quotation, actor).await?;
    Ok(prepared.map(|(_, batch)| batch).unwrap_or_default())
}

pub(super) async fn receive_purchase_order(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let (workflow_id, _, actor) = stage_source(record)?;
    let prepared = ctx.purchasing.prepare_receive(workflow_id, actor).await?;
    Ok(prepared.map(|(_, batch)| batch).unwrap_or_default())
}

pub(super) async fn record_supplier_expense(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let (workflow_id, _, actor) = stage_source(record)?;
    let prepared = ctx.purchasing.prepare_supplier_expense(workflow_id, actor).await?;
    Ok(prepared.map(|(_, batch)| batch).unwrap_or_default())
}

pub(super) async fn close_purchase_order(ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
    let (workflow_id, _, actor) = stage_source(record)?;
    let prepared = ctx.purchasing.prepare_close(workflow_id, actor).await?;
    Ok(prepared.map(|(_, batch)| batch).unwrap_or_default())
}
