use tradeflow_domain::{EffectRecord, Result, TradeflowError};

use super::stage_source;
use crate::effects::handler::EffectContext;
use crate::store::WriteBatch;

/// Move the quantity of one quotation line in (credit) or out (debit).
pub(super) async fn adjust(ctx: &EffectContext, record: &EffectRecord, debit: bool) -> Result<WriteBatch> {
    let (workflow_id, quotation_ref, actor) = stage_source(record)?;
    let index = record
        .key
        .line_index
        .ok_or_else(|| TradeflowError::internal(format!("effect {} has no line index", record.key)))?;
    let quotation = ctx.quotations.get(quotation_ref).await?;
    let line = usize::try_from(index)
        .ok()
        .and_then(|i| quotation.lines.get(i))
        .ok_or_else(|| TradeflowError::internal(format!("quotation {quotation_ref} has no line {index}")))?;
    let delta = if debit { -line.qty } else { line.qty };
    ctx.inventory.prepare_adjust(&line.product_ref, delta, workflow_id, actor).await
}
