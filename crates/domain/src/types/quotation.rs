//! Quotations and the line items shared with orders and invoices

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::{Currency, Money};
use crate::errors::{Result, TradeflowError};
use crate::impl_domain_status_conversions;

/// One priced line of a quotation, purchase order or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl LineItem {
    pub fn priced(
        product_ref: impl Into<String>,
        qty: Decimal,
        unit_price: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            product_ref: product_ref.into(),
            description: None,
            qty,
            unit_price,
            line_total: currency.round(qty * unit_price),
        }
    }
}

/// Subtotal, tax and total for a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Totals {
    pub fn compute(lines: &[LineItem], tax_rate: Decimal, currency: Currency) -> Self {
        let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();
        let tax = currency.round(subtotal * tax_rate);
        Self { subtotal, tax, total: subtotal + tax }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuotationStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Superseded,
}

impl_domain_status_conversions!(QuotationStatus {
    Draft => "draft" | "작성중" | "임시저장",
    Submitted => "submitted" | "제출" | "대기",
    Approved => "approved" | "승인",
    Rejected => "rejected" | "반려" | "거절",
    Superseded => "superseded" | "대체",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: String,
    /// Human-readable number printed on documents; equal to `id`.
    pub number: String,
    pub customer_ref: String,
    pub date: NaiveDate,
    pub currency: Currency,
    pub lines: Vec<LineItem>,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: QuotationStatus,
    pub supersedes: Option<String>,
    pub superseded_by: Option<String>,
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn total_money(&self) -> Money {
        Money::new(self.total, self.currency)
    }

    fn transition(
        &mut self,
        allowed: &[QuotationStatus],
        next: QuotationStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(TradeflowError::state_conflict(format!(
                "quotation {} is {}; cannot become {next}",
                self.id, self.status
            )));
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn submit(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(&[QuotationStatus::Draft], QuotationStatus::Submitted, at)
    }

    pub fn approve(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(&[QuotationStatus::Submitted], QuotationStatus::Approved, at)
    }

    pub fn reject(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(&[QuotationStatus::Submitted], QuotationStatus::Rejected, at)
    }

    pub fn supersede(&mut self, successor: &str, at: DateTime<Utc>) -> Result<()> {
        self.transition(
            &[
                QuotationStatus::Draft,
                QuotationStatus::Submitted,
                QuotationStatus::Approved,
                QuotationStatus::Rejected,
            ],
            QuotationStatus::Superseded,
            at,
        )?;
        self.superseded_by = Some(successor.to_string());
        Ok(())
    }

    /// Rejected and superseded quotations can no longer feed a workflow.
    pub const fn is_closed(&self) -> bool {
        matches!(self.status, QuotationStatus::Rejected | QuotationStatus::Superseded)
    }
}

/// A line as entered by sales; `unit_price` may be resolved from price lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationLineInput {
    pub product_ref: String,
    pub qty: Decimal,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for `submit_quotation` / `draft_quotation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationPayload {
    pub customer_ref: String,
    pub date: NaiveDate,
    pub currency: Currency,
    pub lines: Vec<QuotationLineInput>,
    /// Falls back to the configured default tax rate.
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub note: Option<String>,
}

impl QuotationPayload {
    pub fn validate(&self) -> Result<()> {
        if self.customer_ref.trim().is_empty() {
            return Err(TradeflowError::validation("customer_ref is required"));
        }
        if self.lines.is_empty() {
            return Err(TradeflowError::validation("a quotation needs at least one line"));
        }
        for (index, line) in self.lines.iter().enumerate() {
            if line.product_ref.trim().is_empty() {
                return Err(TradeflowError::validation(format!(
                    "line {index}: product_ref is required"
                )));
            }
            if line.qty <= Decimal::ZERO {
                return Err(TradeflowError::validation(format!(
                    "line {index}: qty must be positive"
                )));
            }
            if line.unit_price.is_some_and(|p| p < Decimal::ZERO) {
                return Err(TradeflowError::validation(format!(
                    "line {index}: unit_price must not be negative"
                )));
            }
        }
        if let Some(rate) = self.tax_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(TradeflowError::validation("tax_rate must be between 0 and 1"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationFilter {
    #[serde(default)]
    pub status: Option<QuotationStatus>,
    #[serde(default)]
    pub customer_ref: Option<String>,
}
