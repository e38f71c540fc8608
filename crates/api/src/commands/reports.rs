//! Read-only projections and ledger reports

use chrono::NaiveDate;
use tradeflow_domain::{Period, ThresholdSource, YearMonth};

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

pub async fn cash_summary(ctx: &AppContext, period: Period) -> CommandEnvelope {
    execute_command("report::cash_summary", || async move { ctx.engine.cash_summary(&period).await }).await
}

pub async fn monthly_cash(ctx: &AppContext, year: i32) -> CommandEnvelope {
    execute_command("report::monthly_cash", || async { ctx.engine.monthly_cash(year).await }).await
}

pub async fn sales_by_month(ctx: &AppContext, year_month: YearMonth) -> CommandEnvelope {
    execute_command("report::sales", || async { ctx.engine.sales_by_month(year_month).await }).await
}

pub async fn target_vs_actual(ctx: &AppContext, year_month: YearMonth) -> CommandEnvelope {
    execute_command("report::target_vs_actual", || async { ctx.engine.target_vs_actual(year_month).await }).await
}

pub async fn overdue_invoices(ctx: &AppContext, as_of: NaiveDate) -> CommandEnvelope {
    execute_command("report::overdue", || async { ctx.engine.list_overdue_invoices(as_of).await }).await
}

pub async fn pending_approvals(ctx: &AppContext, approver_ref: &str) -> CommandEnvelope {
    execute_command("report::pending", || async { ctx.engine.list_pending_approvals(approver_ref).await }).await
}

pub async fn stale_approvals(ctx: &AppContext, as_of: NaiveDate) -> CommandEnvelope {
    execute_command("report::stale", || async { ctx.engine.stale_approvals(as_of).await }).await
}

pub async fn workflows_by_stage(ctx: &AppContext) -> CommandEnvelope {
    execute_command("report::stages", || async { ctx.engine.workflows_by_stage().await }).await
}

pub async fn completion_stats(ctx: &AppContext, period: Period) -> CommandEnvelope {
    execute_command("report::stats", || async move { ctx.engine.completion_stats(&period).await }).await
}

pub async fn low_stock(ctx: &AppContext, source: ThresholdSource) -> CommandEnvelope {
    execute_command("report::low_stock", || async { ctx.engine.low_stock(source).await }).await
}
