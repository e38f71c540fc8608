//! Sales ledger & aggregator
//!
//! All sales recognition goes through [`SalesLedger::recognize`]. A source
//! yields one record per product, unique by `(source_kind, source_id,
//! product_ref)`; products already recognized for a source are skipped.
//! Amounts are spread over the products by line value with the rounding
//! remainder on the last product, so a source's records always add up to
//! its converted total exactly.

mod allocation;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use tradeflow_domain::{
    Currency, EntityKind, IdFamily, Invoice, LineItem, Money, Quotation, Result, SalesFilter,
    SalesForecast, SalesRecord, SalesRollup, SalesSourceKind, SalesTarget, TargetDimension,
    TargetRow, TradeflowError, YearMonth,
};

pub use allocation::allocate;

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::currency::RateService;
use crate::ids::IdService;
use crate::store::{InvoiceRepository, QuotationRepository, SalesRepository, UnitOfWork, Write, WriteBatch};

/// What a batch of sales is recognized from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_kind", rename_all = "snake_case")]
pub enum SalesSource {
    /// An approved quotation, at its full value.
    Quotation { quotation_id: String },
    /// An issued invoice (order confirmation), at its full value.
    Order { invoice_id: String },
    /// One payment against an invoice.
    Cash { invoice_id: String, payment_id: String },
}

impl SalesSource {
    pub const fn kind(&self) -> SalesSourceKind {
        match self {
            Self::Quotation { .. } => SalesSourceKind::Quotation,
            Self::Order { .. } => SalesSourceKind::Order,
            Self::Cash { .. } => SalesSourceKind::Cash,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            Self::Quotation { quotation_id } => quotation_id,
            Self::Order { invoice_id } => invoice_id,
            Self::Cash { payment_id, .. } => payment_id,
        }
    }
}

/// Document amounts to spread over products.
struct Basis {
    customer_ref: String,
    date: NaiveDate,
    total: Money,
    lines: Vec<LineItem>,
    /// Share of line quantities recognized.
    qty_fraction: Decimal,
}

pub struct SalesLedger {
    repo: Arc<dyn SalesRepository>,
    quotations: Arc<dyn QuotationRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    uow: Arc<dyn UnitOfWork>,
    rates: Arc<RateService>,
    ids: Arc<IdService>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    local_currency: Currency,
}

impl SalesLedger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn SalesRepository>,
        quotations: Arc<dyn QuotationRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        uow: Arc<dyn UnitOfWork>,
        rates: Arc<RateService>,
        ids: Arc<IdService>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
        local_currency: Currency,
    ) -> Self {
        Self { repo, quotations, invoices, uow, rates, ids, audit, clock, local_currency }
    }

    async fn basis(&self, source: &SalesSource) -> Result<Basis> {
        match source {
            SalesSource::Quotation { quotation_id } => {
                let quotation = self
                    .quotations
                    .get_quotation(quotation_id)
                    .await?
                    .ok_or_else(|| TradeflowError::not_found(EntityKind::Quotation, quotation_id))?;
                Ok(Basis {
                    customer_ref: quotation.customer_ref.clone(),
                    date: quotation.date,
                    total: quotation.total_money(),
                    lines: quotation.lines,
                    qty_fraction: Decimal::ONE,
                })
            }
            SalesSource::Order { invoice_id } => {
                let invoice = self.invoice(invoice_id).await?;
                Ok(Basis {
                    customer_ref: invoice.customer_ref.clone(),
                    date: invoice.issue_date,
                    total: Money::new(invoice.total, invoice.currency),
                    lines: invoice.lines,
                    qty_fraction: Decimal::ONE,
                })
            }
            SalesSource::Cash { invoice_id, payment_id } => {
                let invoice = self.invoice(invoice_id).await?;
                let payment = invoice
                    .payments
                    .iter()
                    .find(|p| &p.id == payment_id)
                    .cloned()
                    .ok_or_else(|| {
                        TradeflowError::NotFound(format!("payment '{payment_id}' on invoice '{invoice_id}'"))
                    })?;
                let qty_fraction = if invoice.total.is_zero() {
                    Decimal::ONE
                } else {
                    payment.amount / invoice.total
                };
                Ok(Basis {
                    customer_ref: invoice.customer_ref.clone(),
                    date: payment.date,
                    total: Money::new(payment.amount, invoice.currency),
                    lines: invoice.lines,
                    qty_fraction,
                })
            }
        }
    }

    async fn invoice(&self, id: &str) -> Result<Invoice> {
        self.invoices
            .get_invoice(id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::Invoice, id))
    }

    /// Records not yet recognized for `source` and the writes that add them.
    pub async fn prepare(&self, source: &SalesSource, actor: &str) -> Result<(Vec<SalesRecord>, WriteBatch)> {
        let basis = self.basis(source).await?;
        let existing = self
            .repo
            .list_sales(&SalesFilter { source_id: Some(source.source_id().to_string()), ..SalesFilter::default() })
            .await?;
        let already = |product: &str| {
            existing.iter().any(|r| r.source_kind == source.kind() && r.product_ref == product)
        };

        let products = group_by_product(&basis.lines);
        let weights: Vec<Decimal> = products.iter().map(|p| p.value).collect();
        let total_usd = self.rates.to_usd(basis.total, basis.date).await?;
        let total_local = self.rates.convert(basis.total.amount, basis.total.currency, self.local_currency, basis.date).await?;
        let usd = allocate(total_usd, &weights, 2);
        let local = allocate(total_local, &weights, self.local_currency.minor_units());

        let year_month = YearMonth::from_date(basis.date);
        let now = self.clock.now();
        let mut records = Vec::new();
        for ((product, amount_usd), amount_local) in products.iter().zip(usd).zip(local) {
            if already(&product.product_ref) {
                continue;
            }
            records.push(SalesRecord {
                id: self.ids.next_id(IdFamily::SalesRecord, basis.date).await?,
                year_month,
                customer_ref: basis.customer_ref.clone(),
                product_ref: product.product_ref.clone(),
                qty: (product.qty * basis.qty_fraction).round_dp(4),
                unit_price: product.unit_price,
                currency: basis.total.currency,
                amount_local,
                amount_usd,
                source_kind: source.kind(),
                source_id: source.source_id().to_string(),
                recognized_at: now,
            });
        }

        let mut batch = WriteBatch::new();
        if !records.is_empty() {
            batch.extend(records.iter().cloned().map(Write::Sales));
            let draft = EventDraft::new(actor, EntityKind::SalesRecord, source.source_id(), "recognized")
                .after(&records)?;
            self.audit.record(&mut batch, draft).await?;
        }
        Ok((records, batch))
    }

    /// Recognize `source`; returns every record the source now has.
    pub async fn recognize(&self, source: &SalesSource, actor: &str) -> Result<Vec<SalesRecord>> {
        let (created, batch) = self.prepare(source, actor).await?;
        if !batch.is_empty() {
            self.uow.commit(batch).await?;
            info!(source = source.source_id(), records = created.len(), "sales recognized");
        }
        let filter = SalesFilter { source_id: Some(source.source_id().to_string()), ..SalesFilter::default() };
        Ok(self
            .repo
            .list_sales(&filter)
            .await?
            .into_iter()
            .filter(|r| r.source_kind == source.kind())
            .collect())
    }

    /// Potential income row for an approved quotation.
    pub async fn prepare_forecast(&self, quotation: &Quotation, actor: &str) -> Result<(SalesForecast, WriteBatch)> {
        let forecast = SalesForecast {
            quotation_ref: quotation.id.clone(),
            year_month: YearMonth::from_date(quotation.date),
            customer_ref: quotation.customer_ref.clone(),
            amount: quotation.total,
            currency: quotation.currency,
            amount_usd: self.rates.to_usd(quotation.total_money(), quotation.date).await?,
            created_at: self.clock.now(),
        };
        let mut batch = WriteBatch::new().with(Write::SalesForecast(forecast.clone()));
        let draft = EventDraft::new(actor, EntityKind::SalesForecast, &quotation.id, "projected").after(&forecast)?;
        self.audit.record(&mut batch, draft).await?;
        Ok((forecast, batch))
    }

    pub async fn list(&self, filter: &SalesFilter) -> Result<Vec<SalesRecord>> {
        self.repo.list_sales(filter).await
    }

    pub async fn forecasts(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesForecast>> {
        self.repo.list_forecasts(year_month).await
    }

    pub async fn by_month(&self, year_month: YearMonth) -> Result<SalesRollup> {
        let records = self.repo.list_sales(&SalesFilter::month(year_month)).await?;
        let rollup = rollup(&records, |_| year_month.to_string());
        Ok(rollup.into_iter().next().unwrap_or_else(|| SalesRollup {
            key: year_month.to_string(),
            qty: Decimal::ZERO,
            amount_local: Decimal::ZERO,
            amount_usd: Decimal::ZERO,
            record_count: 0,
        }))
    }

    pub async fn by_customer(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesRollup>> {
        let records = self.repo.list_sales(&SalesFilter { year_month, ..SalesFilter::default() }).await?;
        Ok(rollup(&records, |r| r.customer_ref.clone()))
    }

    pub async fn by_product(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesRollup>> {
        let records = self.repo.list_sales(&SalesFilter { year_month, ..SalesFilter::default() }).await?;
        Ok(rollup(&records, |r| r.product_ref.clone()))
    }

    pub async fn set_target(&self, mut target: SalesTarget, actor: &str) -> Result<SalesTarget> {
        if target.target_usd < Decimal::ZERO {
            return Err(TradeflowError::validation("target_usd must not be negative"));
        }
        target.dimension_ref = target.dimension_ref.trim().to_string();
        match (target.dimension, target.dimension_ref.is_empty()) {
            (TargetDimension::Overall, false) => {
                return Err(TradeflowError::validation("an overall target takes no dimension_ref"));
            }
            (TargetDimension::Customer | TargetDimension::Product, true) => {
                return Err(TradeflowError::validation(format!(
                    "a {} target needs a dimension_ref",
                    target.dimension
                )));
            }
            _ => {}
        }

        let entity_id = format!("{}:{}:{}", target.year_month, target.dimension, target.dimension_ref);
        let mut batch = WriteBatch::new().with(Write::SalesTarget(target.clone()));
        let draft = EventDraft::new(actor, EntityKind::SalesTarget, entity_id, "set").after(&target)?;
        self.audit.record(&mut batch, draft).await?;
        self.uow.commit(batch).await?;
        info!(year_month = %target.year_month, dimension = %target.dimension, "sales target set");
        Ok(target)
    }

    pub async fn target_vs_actual(&self, year_month: YearMonth) -> Result<Vec<TargetRow>> {
        let targets = self.repo.list_targets(year_month).await?;
        let records = self.repo.list_sales(&SalesFilter::month(year_month)).await?;
        let hundred = Decimal::ONE_HUNDRED;

        let mut rows: Vec<TargetRow> = targets
            .into_iter()
            .map(|target| {
                let actual: Decimal = records
                    .iter()
                    .filter(|r| match target.dimension {
                        TargetDimension::Overall => true,
                        TargetDimension::Customer => r.customer_ref == target.dimension_ref,
                        TargetDimension::Product => r.product_ref == target.dimension_ref,
                    })
                    .map(|r| r.amount_usd)
                    .sum();
                let achievement_pct = (!target.target_usd.is_zero())
                    .then(|| (actual / target.target_usd * hundred).round_dp(2));
                TargetRow {
                    year_month,
                    dimension: target.dimension,
                    dimension_ref: target.dimension_ref,
                    target: target.target_usd,
                    actual,
                    achievement_pct,
                    variance: actual - target.target_usd,
                }
            })
            .collect();
        rows.sort_by(|a, b| (a.dimension, &a.dimension_ref).cmp(&(b.dimension, &b.dimension_ref)));
        Ok(rows)
    }
}

struct ProductShare {
    product_ref: String,
    qty: Decimal,
    unit_price: Decimal,
    value: Decimal,
}

/// Merge lines of the same product, keeping first-appearance order.
fn group_by_product(lines: &[LineItem]) -> Vec<ProductShare> {
    let mut shares: Vec<ProductShare> = Vec::new();
    for line in lines {
        if let Some(share) = shares.iter_mut().find(|s| s.product_ref == line.product_ref) {
            share.qty += line.qty;
            share.value += line.line_total;
            if !share.qty.is_zero() {
                share.unit_price = (share.value / share.qty).round_dp(4);
            }
        } else {
            shares.push(ProductShare {
                product_ref: line.product_ref.clone(),
                qty: line.qty,
                unit_price: line.unit_price,
                value: line.line_total,
            });
        }
    }
    shares
}

fn rollup<F>(records: &[SalesRecord], key: F) -> Vec<SalesRollup>
where
    F: Fn(&SalesRecord) -> String,
{
    let mut groups: BTreeMap<String, SalesRollup> = BTreeMap::new();
    for record in records {
        let key = key(record);
        let entry = groups.entry(key.clone()).or_insert_with(|| SalesRollup {
            key,
            qty: Decimal::ZERO,
            amount_local: Decimal::ZERO,
            amount_usd: Decimal::ZERO,
            record_count: 0,
        });
        entry.qty += record.qty;
        entry.amount_local += record.amount_local;
        entry.amount_usd += record.amount_usd;
        entry.record_count += 1;
    }
    groups.into_values().collect()
}
