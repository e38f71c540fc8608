//! Exchange rates quoted against USD

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::Currency;

/// Units of `currency` per one USD on `date` (USD→VND = 24,500 means
/// `rate = 24500`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub currency: Currency,
    pub date: NaiveDate,
    pub rate: Decimal,
}
