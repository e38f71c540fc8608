//! Currency & rate service
//!
//! Rates are quoted as units of a currency per one USD. A conversion looks
//! up both legs on the requested date, falling back to the latest earlier
//! rate, and fails with `RateUnavailable` when a leg has no rate at all.
//! USD itself always converts at 1.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};
use tradeflow_domain::{
    Currency, EntityKind, ExchangeRate, Money, Period, Result, TradeflowError,
};

use crate::audit::{AuditLog, EventDraft};
use crate::store::{RateRepository, UnitOfWork, Write, WriteBatch};

pub struct RateService {
    repo: Arc<dyn RateRepository>,
    uow: Arc<dyn UnitOfWork>,
    audit: Arc<AuditLog>,
}

impl RateService {
    pub fn new(repo: Arc<dyn RateRepository>, uow: Arc<dyn UnitOfWork>, audit: Arc<AuditLog>) -> Self {
        Self { repo, uow, audit }
    }

    /// Units of `currency` per USD effective on `date`.
    pub async fn rate_on(&self, currency: Currency, date: NaiveDate) -> Result<Decimal> {
        if currency == Currency::Usd {
            return Ok(Decimal::ONE);
        }
        let rate = self
            .repo
            .rate_on_or_before(currency, date)
            .await?
            .ok_or(TradeflowError::RateUnavailable { currency, date })?;
        if rate.date != date {
            debug!(currency = %currency, requested = %date, used = %rate.date, "using earlier rate");
        }
        Ok(rate.rate)
    }

    /// Convert `amount` from one currency to another at the rates of `date`.
    /// The result is not rounded.
    pub async fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let from_rate = self.rate_on(from, date).await?;
        let to_rate = self.rate_on(to, date).await?;
        let usd = amount
            .checked_div(from_rate)
            .ok_or_else(|| TradeflowError::internal(format!("invalid {from} rate {from_rate}")))?;
        usd.checked_mul(to_rate)
            .ok_or_else(|| TradeflowError::validation(format!("{amount} {from} overflows in {to}")))
    }

    pub async fn convert_money(&self, money: Money, to: Currency, date: NaiveDate) -> Result<Money> {
        let amount = self.convert(money.amount, money.currency, to, date).await?;
        Ok(Money::new(amount, to))
    }

    pub async fn to_usd(&self, money: Money, date: NaiveDate) -> Result<Decimal> {
        self.convert(money.amount, money.currency, Currency::Usd, date).await
    }

    /// Mean of the daily rates recorded inside `period`.
    pub async fn average(&self, currency: Currency, period: &Period) -> Result<Decimal> {
        let (from, to) = period
            .bounds()
            .ok_or_else(|| TradeflowError::validation(format!("invalid period {period}")))?;
        if currency == Currency::Usd {
            return Ok(Decimal::ONE);
        }
        let rates = self.repo.rates_between(currency, from, to).await?;
        if rates.is_empty() {
            return Err(TradeflowError::RateUnavailable { currency, date: to });
        }
        let sum: Decimal = rates.iter().map(|r| r.rate).sum();
        Ok(sum / Decimal::from(rates.len()))
    }

    pub async fn record_rate(&self, rate: ExchangeRate, actor: &str) -> Result<ExchangeRate> {
        self.import(vec![rate.clone()], actor).await?;
        Ok(rate)
    }

    /// Record many rates in one transaction; later rows for the same
    /// currency and date win.
    pub async fn import(&self, rates: Vec<ExchangeRate>, actor: &str) -> Result<usize> {
        let mut batch = WriteBatch::new();
        for rate in &rates {
            validate(rate)?;
            batch.push(Write::ExchangeRate(rate.clone()));
        }
        if rates.is_empty() {
            return Ok(0);
        }
        let entity_id = match rates.as_slice() {
            [single] => format!("{}:{}", single.currency, single.date),
            _ => "import".to_string(),
        };
        let draft = EventDraft::new(actor, EntityKind::ExchangeRate, entity_id, "recorded")
            .after(&serde_json::json!({ "count": rates.len() }))?;
        self.audit.record(&mut batch, draft).await?;
        self.uow.commit(batch).await?;
        info!(count = rates.len(), "exchange rates recorded");
        Ok(rates.len())
    }
}

fn validate(rate: &ExchangeRate) -> Result<()> {
    if rate.currency == Currency::Usd && rate.rate != Decimal::ONE {
        return Err(TradeflowError::validation("the USD rate is fixed at 1"));
    }
    if rate.rate <= Decimal::ZERO {
        return Err(TradeflowError::validation(format!(
            "rate for {} on {} must be positive",
            rate.currency, rate.date
        )));
    }
    Ok(())
}
