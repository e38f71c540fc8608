//! Exchange rate commands

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradeflow_domain::{Currency, ExchangeRate, TradeflowError};
use tradeflow_infra::import_rate_file;

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub amount: Decimal,
    pub from: Currency,
    pub to: Currency,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct Conversion {
    #[serde(flatten)]
    pub request: ConvertRequest,
    pub converted: Decimal,
}

/// Import a JSON rate file.
pub async fn import_rates(ctx: &AppContext, path: &Path, actor: &str) -> CommandEnvelope {
    execute_command("rates::import", || async {
        let imported = import_rate_file(&ctx.engine, path, actor).await?;
        Ok::<_, TradeflowError>(serde_json::json!({ "imported": imported, "path": path.display().to_string() }))
    })
    .await
}

pub async fn record_rate(ctx: &AppContext, rate: ExchangeRate, actor: &str) -> CommandEnvelope {
    execute_command("rates::record", || async move { ctx.engine.record_rate(rate, actor).await }).await
}

pub async fn convert(ctx: &AppContext, request: ConvertRequest) -> CommandEnvelope {
    execute_command("rates::convert", || async move {
        let converted = ctx.engine.convert(request.amount, request.from, request.to, request.date).await?;
        Ok::<_, TradeflowError>(Conversion { request, converted })
    })
    .await
}
