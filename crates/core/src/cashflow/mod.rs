//! Cash-flow ledger
//!
//! Append-only: entries are never edited, a mistake is undone by posting a
//! correction that negates the original. `amount_local` is fixed at posting
//! time using the rate of the entry date. Summaries convert every entry to
//! USD at its own date.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use tradeflow_domain::{
    CashEntryType, CashFilter, CashKind, CashPosting, CashSource, CashSummary, CashTransaction,
    Currency, EntityKind, IdFamily, Money, MonthlyCashPoint, Period, Result, TradeflowError,
    YearMonth,
};

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::currency::RateService;
use crate::ids::IdService;
use crate::store::{CashLedgerRepository, UnitOfWork, Write, WriteBatch};

pub struct CashLedger {
    repo: Arc<dyn CashLedgerRepository>,
    uow: Arc<dyn UnitOfWork>,
    rates: Arc<RateService>,
    ids: Arc<IdService>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    local_currency: Currency,
}

impl CashLedger {
    pub fn new(
        repo: Arc<dyn CashLedgerRepository>,
        uow: Arc<dyn UnitOfWork>,
        rates: Arc<RateService>,
        ids: Arc<IdService>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
        local_currency: Currency,
    ) -> Self {
        Self { repo, uow, rates, ids, audit, clock, local_currency }
    }

    /// Build the entry for `posting` and the writes that append it.
    pub async fn prepare(&self, posting: CashPosting, actor: &str) -> Result<(CashTransaction, WriteBatch)> {
        if posting.amount <= Decimal::ZERO {
            return Err(TradeflowError::validation("cash amount must be positive"));
        }
        if posting.source_type == CashSource::Correction {
            return Err(TradeflowError::validation("corrections are posted with post_correction"));
        }
        self.build(posting, None, actor).await
    }

    /// `amount_local` is converted at the entry date unless given.
    async fn build(
        &self,
        posting: CashPosting,
        amount_local: Option<Decimal>,
        actor: &str,
    ) -> Result<(CashTransaction, WriteBatch)> {
        if posting.source_id.trim().is_empty() {
            return Err(TradeflowError::validation("source_id is required"));
        }
        let amount = posting.currency.round(posting.amount);
        let local = match amount_local {
            Some(local) => local,
            None => {
                self.rates
                    .convert(amount, posting.currency, self.local_currency, posting.date)
                    .await?
            }
        };

        let tx = CashTransaction {
            id: self.ids.next_id(IdFamily::CashTransaction, posting.date).await?,
            date: posting.date,
            kind: posting.kind,
            entry_type: posting.entry_type,
            amount,
            currency: posting.currency,
            amount_local: self.local_currency.round(local),
            local_currency: self.local_currency,
            account_ref: posting.account_ref,
            source_type: posting.source_type,
            source_id: posting.source_id,
            workflow_ref: posting.workflow_ref,
            description: posting.description,
            created_by: actor.to_string(),
            created_at: self.clock.now(),
        };
        let mut batch = WriteBatch::new().with(Write::Cash(tx.clone()));
        let draft = EventDraft::new(actor, EntityKind::CashTransaction, &tx.id, "posted").after(&tx)?;
        self.audit.record(&mut batch, draft).await?;
        Ok((tx, batch))
    }

    pub async fn post(&self, posting: CashPosting, actor: &str) -> Result<CashTransaction> {
        let (tx, batch) = self.prepare(posting, actor).await?;
        self.uow.commit(batch).await?;
        info!(cash_id = %tx.id, kind = %tx.kind, amount = %tx.amount, currency = %tx.currency, "cash entry posted");
        Ok(tx)
    }

    /// Append an entry negating `original_id`.
    pub async fn post_correction(&self, original_id: &str, reason: &str, actor: &str) -> Result<CashTransaction> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TradeflowError::validation("a correction requires a reason"));
        }
        let original = self
            .repo
            .get_cash(original_id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::CashTransaction, original_id))?;
        if original.source_type == CashSource::Correction {
            return Err(TradeflowError::state_conflict("a correction cannot itself be corrected"));
        }
        let existing = CashFilter {
            source_type: Some(CashSource::Correction),
            source_id: Some(original.id.clone()),
            ..CashFilter::default()
        };
        if !self.repo.list_cash(&existing).await?.is_empty() {
            return Err(TradeflowError::state_conflict(format!("{original_id} was already corrected")));
        }

        let posting = CashPosting {
            kind: original.kind,
            entry_type: original.entry_type,
            amount: -original.amount,
            currency: original.currency,
            date: original.date,
            source_type: CashSource::Correction,
            source_id: original.id.clone(),
            account_ref: original.account_ref.clone(),
            workflow_ref: original.workflow_ref.clone(),
            description: reason.to_string(),
        };
        let (tx, batch) = self.build(posting, Some(-original.amount_local), actor).await?;
        self.uow.commit(batch).await?;
        info!(cash_id = %tx.id, corrects = original_id, "cash correction posted");
        Ok(tx)
    }

    pub async fn get(&self, id: &str) -> Result<CashTransaction> {
        self.repo
            .get_cash(id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::CashTransaction, id))
    }

    pub async fn list(&self, filter: &CashFilter) -> Result<Vec<CashTransaction>> {
        self.repo.list_cash(filter).await
    }

    pub async fn usd(&self, tx: &CashTransaction) -> Result<Decimal> {
        self.rates.to_usd(Money::new(tx.amount, tx.currency), tx.date).await
    }

    /// Actual income and expense in USD; projected income reported apart.
    pub async fn summary(&self, period: &Period) -> Result<CashSummary> {
        if period.bounds().is_none() {
            return Err(TradeflowError::validation(format!("invalid period {period}")));
        }
        let entries = self.repo.list_cash(&CashFilter::for_period(period)).await?;
        let mut summary = CashSummary {
            period: *period,
            total_income: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            net: Decimal::ZERO,
            projected_income: Decimal::ZERO,
            transaction_count: 0,
        };
        for tx in &entries {
            let usd = self.usd(tx).await?;
            match (tx.entry_type, tx.kind) {
                (CashEntryType::Actual, CashKind::Income) => summary.total_income += usd,
                (CashEntryType::Actual, CashKind::Expense) => summary.total_expense += usd,
                (CashEntryType::Projected, CashKind::Income) => summary.projected_income += usd,
                (CashEntryType::Projected, CashKind::Expense) => continue,
            }
            if tx.entry_type == CashEntryType::Actual {
                summary.transaction_count += 1;
            }
        }
        summary.net = summary.total_income - summary.total_expense;
        Ok(summary)
    }

    pub async fn monthly_series(&self, year: i32) -> Result<Vec<MonthlyCashPoint>> {
        let mut points = Vec::with_capacity(12);
        for month in 1..=12 {
            let year_month = YearMonth::new(year, month)
                .ok_or_else(|| TradeflowError::validation(format!("invalid year {year}")))?;
            let summary = self.summary(&Period::month(year_month)).await?;
            points.push(MonthlyCashPoint {
                year_month,
                income: summary.total_income,
                expense: summary.total_expense,
                net: summary.net,
            });
        }
        Ok(points)
    }
}
