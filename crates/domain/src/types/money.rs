//! Currency codes and decimal money amounts

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO-4217 currencies the branch trades in. Rates are quoted against USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Krw,
    Vnd,
    Thb,
    Cny,
    Idr,
    Myr,
    Usd,
    Eur,
    Jpy,
}

impl Currency {
    /// Every supported currency, in display order.
    pub const ALL: [Self; 9] = [
        Self::Krw,
        Self::Vnd,
        Self::Thb,
        Self::Cny,
        Self::Idr,
        Self::Myr,
        Self::Usd,
        Self::Eur,
        Self::Jpy,
    ];

    /// Three-letter ISO code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Krw => "KRW",
            Self::Vnd => "VND",
            Self::Thb => "THB",
            Self::Cny => "CNY",
            Self::Idr => "IDR",
            Self::Myr => "MYR",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Jpy => "JPY",
        }
    }

    /// Number of decimal places amounts are kept at.
    pub const fn minor_units(self) -> u32 {
        match self {
            Self::Krw | Self::Vnd | Self::Idr | Self::Jpy => 0,
            _ => 2,
        }
    }

    /// Round an amount to this currency's minor units (half away from zero).
    pub fn round(self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.minor_units(), RoundingStrategy::MidpointAwayFromZero)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == upper)
            .ok_or_else(|| format!("Unsupported currency: {s}"))
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_string()
    }
}

/// An amount tagged with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn usd(amount: impl Into<Decimal>) -> Self {
        Self::new(amount.into(), Currency::Usd)
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Same amount rounded to the currency's minor units.
    pub fn rounded(self) -> Self {
        Self::new(self.currency.round(self.amount), self.currency)
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl FromStr for Money {
    type Err = String;

    /// Parses `"1000 USD"` or `"USD 1000"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [first, second] = parts.as_slice() else {
            return Err(format!("Invalid money amount: {s}"));
        };
        let (amount, currency) = match Decimal::from_str(first) {
            Ok(amount) => (amount, second.parse::<Currency>()?),
            Err(_) => (
                Decimal::from_str(second).map_err(|e| format!("Invalid amount '{second}': {e}"))?,
                first.parse::<Currency>()?,
            ),
        };
        Ok(Self::new(amount, currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_parses_case_insensitively() {
        assert_eq!("vnd".parse::<Currency>().unwrap(), Currency::Vnd);
        assert_eq!(" USD ".parse::<Currency>().unwrap(), Currency::Usd);
        assert!("GBP".parse::<Currency>().is_err());
    }

    #[test]
    fn rounding_respects_minor_units() {
        assert_eq!(Currency::Usd.round(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
        assert_eq!(Currency::Vnd.round(Decimal::new(24_5005, 1)), Decimal::from(24_501));
    }

    #[test]
    fn money_parses_both_orders() {
        let a: Money = "1000 USD".parse().unwrap();
        let b: Money = "USD 1000".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "1000 USD");
        assert!("1000".parse::<Money>().is_err());
    }

    #[test]
    fn currency_serializes_as_code() {
        let json = serde_json::to_string(&Currency::Krw).unwrap();
        assert_eq!(json, "\"KRW\"");
        let back: Currency = serde_json::from_str("\"krw\"").unwrap();
        assert_eq!(back, Currency::Krw);
    }
}
