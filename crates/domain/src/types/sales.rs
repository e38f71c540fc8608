//! Recognized sales, forecasts and targets

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::Currency;
use super::period::YearMonth;
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SalesSourceKind {
    Quotation,
    Order,
    Cash,
}

impl_domain_status_conversions!(SalesSourceKind {
    Quotation => "quotation" | "견적",
    Order => "order" | "주문",
    Cash => "cash" | "입금",
});

/// One recognized sale of one product.
///
/// Unique by `(source_kind, source_id, product_ref)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub id: String,
    pub year_month: YearMonth,
    pub customer_ref: String,
    pub product_ref: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub currency: Currency,
    pub amount_local: Decimal,
    pub amount_usd: Decimal,
    pub source_kind: SalesSourceKind,
    pub source_id: String,
    pub recognized_at: DateTime<Utc>,
}

/// Potential income from an approved quotation, not yet realized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesForecast {
    pub quotation_ref: String,
    pub year_month: YearMonth,
    pub customer_ref: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub amount_usd: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetDimension {
    Overall,
    Customer,
    Product,
}

impl_domain_status_conversions!(TargetDimension {
    Overall => "overall" | "전체",
    Customer => "customer" | "고객",
    Product => "product" | "제품",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTarget {
    pub year_month: YearMonth,
    pub dimension: TargetDimension,
    /// Customer or product id; empty for `overall`.
    #[serde(default)]
    pub dimension_ref: String,
    pub target_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRow {
    pub year_month: YearMonth,
    pub dimension: TargetDimension,
    pub dimension_ref: String,
    pub target: Decimal,
    pub actual: Decimal,
    /// `actual / target * 100`, two decimals; `None` for a zero target.
    pub achievement_pct: Option<Decimal>,
    pub variance: Decimal,
}

/// Group-by row for month, customer or product roll-ups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRollup {
    pub key: String,
    pub qty: Decimal,
    pub amount_local: Decimal,
    pub amount_usd: Decimal,
    pub record_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesFilter {
    #[serde(default)]
    pub year_month: Option<YearMonth>,
    #[serde(default)]
    pub customer_ref: Option<String>,
    #[serde(default)]
    pub product_ref: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
}

impl SalesFilter {
    pub fn month(year_month: YearMonth) -> Self {
        Self { year_month: Some(year_month), ..Self::default() }
    }

    pub fn matches(&self, record: &SalesRecord) -> bool {
        self.year_month.map_or(true, |ym| ym == record.year_month)
            && self.customer_ref.as_ref().map_or(true, |c| c == &record.customer_ref)
            && self.product_ref.as_ref().map_or(true, |p| p == &record.product_ref)
            && self.source_id.as_ref().map_or(true, |s| s == &record.source_id)
    }
}
