//! Invoice payment commands

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradeflow_domain::{Currency, Money, PaymentMethod};

use crate::context::AppContext;
use crate::envelope::CommandEnvelope;
use crate::utils::command_helpers::execute_command;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub invoice_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

pub async fn record_payment(ctx: &AppContext, payment: RecordPayment, actor: &str) -> CommandEnvelope {
    execute_command("payment::record", || async move {
        let amount = Money::new(payment.amount, payment.currency);
        ctx.engine
            .record_payment_with_reference(
                &payment.invoice_id,
                amount,
                payment.date,
                payment.method,
                payment.reference.as_deref(),
                actor,
            )
            .await
    })
    .await
}

/// Persist `overdue` on every unpaid invoice past due on `as_of`.
pub async fn sweep_overdue(ctx: &AppContext, as_of: NaiveDate, actor: &str) -> CommandEnvelope {
    execute_command("payment::sweep_overdue", || async { ctx.engine.sweep_overdue_invoices(as_of, actor).await })
        .await
}

pub async fn get_invoice(ctx: &AppContext, id: &str) -> CommandEnvelope {
    execute_command("payment::get_invoice", || async { ctx.engine.get_invoice(id).await }).await
}
