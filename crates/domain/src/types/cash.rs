//! Cash-flow ledger entries

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::Currency;
use super::period::{Period, YearMonth};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CashKind {
    Income,
    Expense,
}

impl_domain_status_conversions!(CashKind {
    Income => "income" | "수입" | "입금",
    Expense => "expense" | "지출" | "출금",
});

/// `projected` entries forecast receivables and never count as cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CashEntryType {
    #[default]
    Actual,
    Projected,
}

impl_domain_status_conversions!(CashEntryType {
    Actual => "actual" | "실적",
    Projected => "projected" | "예정",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CashSource {
    Quotation,
    Order,
    Cash,
    Invoice,
    PurchaseOrder,
    Manual,
    Correction,
}

impl_domain_status_conversions!(CashSource {
    Quotation => "quotation",
    Order => "order",
    Cash => "cash",
    Invoice => "invoice",
    PurchaseOrder => "purchase_order",
    Manual => "manual",
    Correction => "correction",
});

impl CashSource {
    /// Sources whose income is matched by recognized sales.
    pub const fn is_sales_source(self) -> bool {
        matches!(self, Self::Quotation | Self::Order | Self::Cash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub kind: CashKind,
    pub entry_type: CashEntryType,
    pub amount: Decimal,
    pub currency: Currency,
    /// `amount` in the branch's local currency on `date`.
    pub amount_local: Decimal,
    pub local_currency: Currency,
    pub account_ref: Option<String>,
    pub source_type: CashSource,
    pub source_id: String,
    pub workflow_ref: Option<String>,
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Input for a manual `post` to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashPosting {
    pub kind: CashKind,
    #[serde(default)]
    pub entry_type: CashEntryType,
    pub amount: Decimal,
    pub currency: Currency,
    pub date: NaiveDate,
    pub source_type: CashSource,
    pub source_id: String,
    #[serde(default)]
    pub account_ref: Option<String>,
    #[serde(default)]
    pub workflow_ref: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFilter {
    #[serde(default)]
    pub kind: Option<CashKind>,
    #[serde(default)]
    pub entry_type: Option<CashEntryType>,
    #[serde(default)]
    pub source_type: Option<CashSource>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub workflow_ref: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl CashFilter {
    pub fn for_period(period: &Period) -> Self {
        let (from, to) = period.bounds().map_or((None, None), |(f, t)| (Some(f), Some(t)));
        Self { from, to, ..Self::default() }
    }

    pub fn matches(&self, tx: &CashTransaction) -> bool {
        self.kind.map_or(true, |k| k == tx.kind)
            && self.entry_type.map_or(true, |e| e == tx.entry_type)
            && self.source_type.map_or(true, |s| s == tx.source_type)
            && self.source_id.as_ref().map_or(true, |s| s == &tx.source_id)
            && self.workflow_ref.as_ref().map_or(true, |w| tx.workflow_ref.as_ref() == Some(w))
            && self.from.map_or(true, |from| tx.date >= from)
            && self.to.map_or(true, |to| tx.date <= to)
    }
}

/// Actual cash in a period, in USD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashSummary {
    pub period: Period,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub net: Decimal,
    /// Open receivable projections in the period, reported separately.
    pub projected_income: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCashPoint {
    pub year_month: YearMonth,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
}
