//! Identifier families and entity kinds

use serde::{Deserialize, Serialize};

use super::period::YearMonth;
use crate::impl_domain_status_conversions;

/// How identifiers of a family are formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    /// `PREFIX + YYYYMM + NNN`, counter restarting every month.
    DateSequence { prefix: &'static str },
    /// `PREFIX + N`, zero-padded to `width`, one counter for all time.
    Counter { prefix: &'static str, width: usize },
    /// `PREFIX_<random>` for identifiers never shown to users.
    Opaque { prefix: &'static str },
}

/// Entity families that receive generated identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IdFamily {
    Quotation,
    PurchaseOrder,
    Invoice,
    Workflow,
    Customer,
    Supplier,
    Employee,
    Approval,
    Payment,
    CashTransaction,
    SalesRecord,
}

impl_domain_status_conversions!(IdFamily {
    Quotation => "quotation",
    PurchaseOrder => "purchase_order",
    Invoice => "invoice",
    Workflow => "workflow",
    Customer => "customer",
    Supplier => "supplier",
    Employee => "employee",
    Approval => "approval",
    Payment => "payment",
    CashTransaction => "cash_transaction",
    SalesRecord => "sales_record",
});

impl IdFamily {
    pub const fn scheme(self) -> IdScheme {
        match self {
            Self::Quotation => IdScheme::DateSequence { prefix: "Q" },
            Self::PurchaseOrder => IdScheme::DateSequence { prefix: "PO" },
            Self::Invoice => IdScheme::DateSequence { prefix: "INV" },
            Self::Workflow => IdScheme::DateSequence { prefix: "WF" },
            Self::Customer => IdScheme::Counter { prefix: "C", width: 3 },
            Self::Supplier => IdScheme::Counter { prefix: "S", width: 3 },
            Self::Employee => IdScheme::Counter { prefix: "E", width: 2 },
            Self::Approval => IdScheme::Opaque { prefix: "APR" },
            Self::Payment => IdScheme::Opaque { prefix: "PAY" },
            Self::CashTransaction => IdScheme::Opaque { prefix: "CASH" },
            Self::SalesRecord => IdScheme::Opaque { prefix: "SR" },
        }
    }
}

/// Format a date-sequence identifier, e.g. `Q202501007`.
pub fn format_date_sequence(prefix: &str, month: YearMonth, counter: u32) -> String {
    format!("{prefix}{}{counter:03}", month.compact())
}

/// Split a date-sequence identifier into its month and counter.
///
/// Returns `None` when `id` does not start with `prefix` or the remainder is
/// not `YYYYMM` followed by at least three digits.
pub fn parse_date_sequence(prefix: &str, id: &str) -> Option<(YearMonth, u32)> {
    let rest = id.strip_prefix(prefix)?;
    if rest.len() < 9 || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (month, counter) = rest.split_at(6);
    Some((month.parse().ok()?, counter.parse().ok()?))
}

/// Kinds of entity that appear in the event log and in effect bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityKind {
    Quotation,
    PurchaseOrder,
    Invoice,
    Workflow,
    Approval,
    CashTransaction,
    SalesRecord,
    SalesForecast,
    SalesTarget,
    Customer,
    Supplier,
    Employee,
    Product,
    PriceList,
    Inventory,
    ExchangeRate,
    ProductCode,
    Effect,
}

impl_domain_status_conversions!(EntityKind {
    Quotation => "quotation",
    PurchaseOrder => "purchase_order",
    Invoice => "invoice",
    Workflow => "workflow",
    Approval => "approval",
    CashTransaction => "cash_transaction",
    SalesRecord => "sales_record",
    SalesForecast => "sales_forecast",
    SalesTarget => "sales_target",
    Customer => "customer",
    Supplier => "supplier",
    Employee => "employee",
    Product => "product",
    PriceList => "price_list",
    Inventory => "inventory",
    ExchangeRate => "exchange_rate",
    ProductCode => "product_code",
    Effect => "effect",
});
