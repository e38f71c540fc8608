//! Customer invoices and the payments applied to them

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::{Currency, Money};
use super::quotation::LineItem;
use crate::errors::{Result, TradeflowError};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Overdue,
}

impl_domain_status_conversions!(PaymentStatus {
    Unpaid => "unpaid" | "미결제" | "미수",
    Partial => "partial" | "부분결제" | "부분입금",
    Paid => "paid" | "결제완료" | "입금완료",
    Overdue => "overdue" | "연체",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaymentMethod {
    Bank,
    Cash,
    Card,
    Other,
}

impl_domain_status_conversions!(PaymentMethod {
    Bank => "bank" | "bank_transfer" | "계좌이체",
    Cash => "cash" | "현금",
    Card => "card" | "카드",
    Other => "other" | "기타",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
    /// Caller-supplied key; a second payment with the same key is a retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub number: String,
    pub quotation_ref: String,
    pub workflow_ref: Option<String>,
    pub customer_ref: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: Currency,
    pub payment_status: PaymentStatus,
    pub payments: Vec<Payment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn paid_total(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn outstanding(&self) -> Money {
        Money::new(self.total - self.paid_total(), self.currency)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Past due and not fully paid on `as_of`.
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.is_paid() && self.due_date < as_of
    }

    /// Stored status, with `overdue` derived when the sweep has not run yet.
    pub fn effective_status(&self, as_of: NaiveDate) -> PaymentStatus {
        if self.is_overdue(as_of) {
            PaymentStatus::Overdue
        } else {
            self.payment_status
        }
    }

    /// Append a payment; the invoice becomes `paid` exactly when the sum of
    /// payments reaches the total.
    /// Payment already recorded under `reference`.
    pub fn payment_by_reference(&self, reference: &str) -> Option<&Payment> {
        self.payments.iter().find(|p| p.reference.as_deref() == Some(reference))
    }

    pub fn apply_payment(&mut self, payment: Payment, currency: Currency, at: DateTime<Utc>) -> Result<()> {
        if self.is_paid() {
            return Err(TradeflowError::state_conflict(format!(
                "invoice {} is already paid",
                self.id
            )));
        }
        if currency != self.currency {
            return Err(TradeflowError::validation(format!(
                "payment currency {currency} does not match invoice currency {}",
                self.currency
            )));
        }
        if payment.amount <= Decimal::ZERO {
            return Err(TradeflowError::validation("payment amount must be positive"));
        }
        let paid = self.paid_total() + payment.amount;
        if paid > self.total {
            return Err(TradeflowError::validation(format!(
                "payment of {} exceeds outstanding {}",
                payment.amount,
                self.outstanding()
            )));
        }
        self.payments.push(payment);
        self.payment_status =
            if paid == self.total { PaymentStatus::Paid } else { PaymentStatus::Partial };
        self.updated_at = at;
        Ok(())
    }

    /// Persist the overdue flag. Returns false when nothing changed.
    pub fn mark_overdue(&mut self, as_of: NaiveDate, at: DateTime<Utc>) -> bool {
        if self.payment_status == PaymentStatus::Overdue || !self.is_overdue(as_of) {
            return false;
        }
        self.payment_status = PaymentStatus::Overdue;
        self.updated_at = at;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFilter {
    #[serde(default)]
    pub customer_ref: Option<String>,
    #[serde(default)]
    pub quotation_ref: Option<String>,
    #[serde(default)]
    pub workflow_ref: Option<String>,
    #[serde(default)]
    pub unpaid_only: bool,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.customer_ref.as_ref().map_or(true, |c| c == &invoice.customer_ref)
            && self.quotation_ref.as_ref().map_or(true, |q| q == &invoice.quotation_ref)
            && self
                .workflow_ref
                .as_ref()
                .map_or(true, |w| invoice.workflow_ref.as_ref() == Some(w))
            && (!self.unpaid_only || !invoice.is_paid())
    }
}
