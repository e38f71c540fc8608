//! SQLite-backed implementation of every core persistence port.
//!
//! One [`SqliteStore`] serves all repositories and the unit of work, so a
//! command's writes always land in the same database transaction. Blocking
//! rusqlite calls run on the tokio blocking pool.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tokio::task;
use tracing::{debug, warn};
use tradeflow_common::storage::{StorageError, StorageResult};
use tradeflow_core::store::{
    ApprovalRepository, CashLedgerRepository, EffectRepository, EventRepository,
    InventoryRepository, InvoiceRepository, ProductCodeRepository, PurchaseOrderRepository,
    QuotationRepository, RateRepository, ReferenceRepository, SalesRepository,
    SequenceRepository, UnitOfWork, WorkflowRepository, WriteBatch,
};
use tradeflow_domain::{
    ApprovalFilter, ApprovalRequest, ApprovalStatus, CashFilter, CashTransaction, Currency,
    EffectRecord, EffectStatus, EntityKind, Event, ExchangeRate, InventoryLevel, Invoice,
    InvoiceFilter, PurchaseOrder, Quotation, QuotationFilter, ReferenceFilter, ReferenceKind,
    ReferenceRecord, RegisteredProductCode, Result, SalesFilter, SalesForecast, SalesRecord,
    SalesTarget, TradeflowError, Workflow, WorkflowFilter, WorkflowStatus, YearMonth,
};

use super::documents::{query_doc, query_docs};
use super::manager::DbManager;
use super::unit_of_work::apply_write;
use crate::errors::{storage_error, InfraError};

const EVENT_SEQ_SCOPE: &str = "__event_seq";

/// SQLite adapter for all ports; cheap to clone.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<DbManager>,
}

impl SqliteStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<DbManager> {
        &self.db
    }

    /// Run `f` against a pooled connection on the blocking pool.
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T> {
            let conn = db.get_connection()?;
            f(&conn).map_err(storage_error)
        })
        .await
        .map_err(|err| TradeflowError::from(InfraError::from(err)))?
    }

    /// Increment `scope` by `step` inside one write transaction and return
    /// the new value.
    async fn bump_counter(&self, scope: String, step: u32) -> Result<i64> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<i64> {
            let mut conn = db.get_connection()?;
            conn.write_transaction(|tx| {
                tx.execute(
                    "INSERT INTO counters (scope, value) VALUES (?1, 0) ON CONFLICT(scope) DO NOTHING",
                    params![scope],
                )?;
                tx.execute(
                    "UPDATE counters SET value = value + ?2 WHERE scope = ?1",
                    params![scope, step],
                )?;
                Ok(tx.query_row("SELECT value FROM counters WHERE scope = ?1", params![scope], |row| {
                    row.get(0)
                })?)
            })
            .map_err(storage_error)
        })
        .await
        .map_err(|err| TradeflowError::from(InfraError::from(err)))?
    }
}

#[async_trait]
impl UnitOfWork for SqliteStore {
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<()> {
            let started = Instant::now();
            let writes = batch.len();
            let mut conn = db.get_connection()?;
            conn.write_transaction(|tx| {
                for write in batch.iter() {
                    apply_write(tx, write)?;
                }
                Ok(())
            })
            .map_err(|err| {
                warn!(error = %err, writes, "write batch rolled back");
                storage_error(err)
            })?;
            debug!(writes, elapsed_ms = started.elapsed().as_millis() as u64, "write batch committed");
            Ok(())
        })
        .await
        .map_err(|err| TradeflowError::from(InfraError::from(err)))?
    }
}

#[async_trait]
impl QuotationRepository for SqliteStore {
    async fn get_quotation(&self, id: &str) -> Result<Option<Quotation>> {
        let id = id.to_string();
        self.read(move |conn| query_doc(conn, "SELECT doc FROM quotations WHERE id = ?1", params![id]))
            .await
    }

    async fn list_quotations(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>> {
        let status = filter.status.map(|s| s.as_str());
        let customer = filter.customer_ref.clone();
        self.read(move |conn| {
            query_docs(
                conn,
                "SELECT doc FROM quotations
                 WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR customer_ref = ?2)
                 ORDER BY id",
                params![status, customer],
            )
        })
        .await
    }
}

#[async_trait]
impl PurchaseOrderRepository for SqliteStore {
    async fn get_purchase_order(&self, id: &str) -> Result<Option<PurchaseOrder>> {
        let id = id.to_string();
        self.read(move |conn| query_doc(conn, "SELECT doc FROM purchase_orders WHERE id = ?1", params![id]))
            .await
    }

    async fn find_purchase_order_by_workflow(&self, workflow_id: &str) -> Result<Option<PurchaseOrder>> {
        let workflow_id = workflow_id.to_string();
        self.read(move |conn| {
            query_doc(
                conn,
                "SELECT doc FROM purchase_orders WHERE workflow_ref = ?1 ORDER BY id LIMIT 1",
                params![workflow_id],
            )
        })
        .await
    }

    async fn list_purchase_orders(&self, quotation_ref: Option<&str>) -> Result<Vec<PurchaseOrder>> {
        let quotation_ref = quotation_ref.map(str::to_string);
        self.read(move |conn| {
            query_docs(
                conn,
                "SELECT doc FROM purchase_orders WHERE ?1 IS NULL OR quotation_ref = ?1 ORDER BY id",
                params![quotation_ref],
            )
        })
        .await
    }
}

#[async_trait]
impl InvoiceRepository for SqliteStore {
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>> {
        let id = id.to_string();
        self.read(move |conn| query_doc(conn, "SELECT doc FROM invoices WHERE id = ?1", params![id]))
            .await
    }

    async fn find_invoice_by_workflow(&self, workflow_id: &str) -> Result<Option<Invoice>> {
        let workflow_id = workflow_id.to_string();
        self.read(move |conn| {
            query_doc(
                conn,
                "SELECT doc FROM invoices WHERE workflow_ref = ?1 ORDER BY id LIMIT 1",
                params![workflow_id],
            )
        })
        .await
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        let filter = filter.clone();
        self.read(move |conn| {
            let invoices: Vec<Invoice> = query_docs(
                conn,
                "SELECT doc FROM invoices WHERE ?1 IS NULL OR customer_ref = ?1 ORDER BY id",
                params![filter.customer_ref],
            )?;
            Ok(invoices.into_iter().filter(|i| filter.matches(i)).collect())
        })
        .await
    }
}

#[async_trait]
impl WorkflowRepository for SqliteStore {
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        let id = id.to_string();
        self.read(move |conn| query_doc(conn, "SELECT doc FROM workflows WHERE id = ?1", params![id]))
            .await
    }

    async fn find_active_workflow(&self, quotation_ref: &str) -> Result<Option<Workflow>> {
        let quotation_ref = quotation_ref.to_string();
        self.read(move |conn| {
            query_doc(
                conn,
                "SELECT doc FROM workflows WHERE quotation_ref = ?1 AND status <> ?2 ORDER BY id LIMIT 1",
                params![quotation_ref, WorkflowStatus::Cancelled.as_str()],
            )
        })
        .await
    }

    async fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>> {
        let filter = filter.clone();
        self.read(move |conn| {
            let workflows: Vec<Workflow> = query_docs(
                conn,
                "SELECT doc FROM workflows
                 WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR quotation_ref = ?2)
                 ORDER BY id",
                params![filter.status.map(|s| s.as_str()), filter.quotation_ref],
            )?;
            Ok(workflows.into_iter().filter(|w| filter.matches(w)).collect())
        })
        .await
    }
}

#[async_trait]
impl ApprovalRepository for SqliteStore {
    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>> {
        let id = id.to_string();
        self.read(move |conn| query_doc(conn, "SELECT doc FROM approvals WHERE id = ?1", params![id]))
            .await
    }

    async fn find_pending_approval(&self, target_ref: &str) -> Result<Option<ApprovalRequest>> {
        let target_ref = target_ref.to_string();
        self.read(move |conn| {
            query_doc(
                conn,
                "SELECT doc FROM approvals WHERE target_ref = ?1 AND status = ?2 ORDER BY id LIMIT 1",
                params![target_ref, ApprovalStatus::Pending.as_str()],
            )
        })
        .await
    }

    async fn list_approvals(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>> {
        let filter = filter.clone();
        self.read(move |conn| {
            let approvals: Vec<ApprovalRequest> = query_docs(
                conn,
                "SELECT doc FROM approvals
                 WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR target_ref = ?2)
                 ORDER BY id",
                params![filter.status.map(|s| s.as_str()), filter.target_ref],
            )?;
            Ok(approvals.into_iter().filter(|a| filter.matches(a)).collect())
        })
        .await
    }
}

#[async_trait]
impl ReferenceRepository for SqliteStore {
    async fn get_reference(&self, kind: ReferenceKind, id: &str) -> Result<Option<ReferenceRecord>> {
        let id = id.to_string();
        self.read(move |conn| {
            query_doc(
                conn,
                "SELECT doc FROM reference_records WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
            )
        })
        .await
    }

    async fn list_reference(&self, kind: ReferenceKind, filter: &ReferenceFilter) -> Result<Vec<ReferenceRecord>> {
        let filter = filter.clone();
        self.read(move |conn| {
            let records: Vec<ReferenceRecord> = query_docs(
                conn,
                "SELECT doc FROM reference_records
                 WHERE kind = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY id",
                params![kind.as_str(), filter.status.map(|s| s.as_str())],
            )?;
            Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
        })
        .await
    }
}

fn map_inventory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn inventory_level((product_ref, on_hand, updated_at): (String, String, String)) -> StorageResult<InventoryLevel> {
    let on_hand = Decimal::from_str(&on_hand)
        .map_err(|e| StorageError::Query(format!("inventory for {product_ref} holds '{on_hand}': {e}")))?;
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| StorageError::Query(format!("inventory timestamp '{updated_at}': {e}")))?
        .with_timezone(&chrono::Utc);
    Ok(InventoryLevel { product_ref, on_hand, updated_at })
}

#[async_trait]
impl InventoryRepository for SqliteStore {
    async fn stock_level(&self, product_ref: &str) -> Result<Option<InventoryLevel>> {
        let product_ref = product_ref.to_string();
        self.read(move |conn| {
            let row = conn
                .query_row(
                    "SELECT product_ref, on_hand, updated_at FROM inventory WHERE product_ref = ?1",
                    params![product_ref],
                    map_inventory_row,
                )
                .optional()?;
            row.map(inventory_level).transpose()
        })
        .await
    }

    async fn stock_levels(&self) -> Result<Vec<InventoryLevel>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT product_ref, on_hand, updated_at FROM inventory ORDER BY product_ref")?;
            let rows = stmt.query_map([], map_inventory_row)?;
            let mut levels = Vec::new();
            for row in rows {
                levels.push(inventory_level(row?)?);
            }
            Ok(levels)
        })
        .await
    }
}

#[async_trait]
impl CashLedgerRepository for SqliteStore {
    async fn get_cash(&self, id: &str) -> Result<Option<CashTransaction>> {
        let id = id.to_string();
        self.read(move |conn| query_doc(conn, "SELECT doc FROM cash_transactions WHERE id = ?1", params![id]))
            .await
    }

    async fn list_cash(&self, filter: &CashFilter) -> Result<Vec<CashTransaction>> {
        let filter = filter.clone();
        self.read(move |conn| {
            let rows: Vec<CashTransaction> = query_docs(
                conn,
                "SELECT doc FROM cash_transactions
                 WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)
                   AND (?3 IS NULL OR source_id = ?3)
                 ORDER BY rowid",
                params![
                    filter.from.map(|d| d.to_string()),
                    filter.to.map(|d| d.to_string()),
                    filter.source_id
                ],
            )?;
            Ok(rows.into_iter().filter(|c| filter.matches(c)).collect())
        })
        .await
    }
}

#[async_trait]
impl SalesRepository for SqliteStore {
    async fn list_sales(&self, filter: &SalesFilter) -> Result<Vec<SalesRecord>> {
        let filter = filter.clone();
        self.read(move |conn| {
            let rows: Vec<SalesRecord> = query_docs(
                conn,
                "SELECT doc FROM sales_records WHERE ?1 IS NULL OR year_month = ?1 ORDER BY rowid",
                params![filter.year_month.map(|ym| ym.to_string())],
            )?;
            Ok(rows.into_iter().filter(|r| filter.matches(r)).collect())
        })
        .await
    }

    async fn list_forecasts(&self, year_month: Option<YearMonth>) -> Result<Vec<SalesForecast>> {
        let year_month = year_month.map(|ym| ym.to_string());
        self.read(move |conn| {
            query_docs(
                conn,
                "SELECT doc FROM sales_forecasts WHERE ?1 IS NULL OR year_month = ?1 ORDER BY quotation_ref",
                params![year_month],
            )
        })
        .await
    }

    async fn list_targets(&self, year_month: YearMonth) -> Result<Vec<SalesTarget>> {
        let month = year_month.to_string();
        let mut targets: Vec<SalesTarget> = self
            .read(move |conn| {
                query_docs(conn, "SELECT doc FROM sales_targets WHERE year_month = ?1", params![month])
            })
            .await?;
        targets.sort_by(|a, b| (a.dimension, &a.dimension_ref).cmp(&(b.dimension, &b.dimension_ref)));
        Ok(targets)
    }
}

#[async_trait]
impl EffectRepository for SqliteStore {
    async fn effects_for_source(&self, source_id: &str) -> Result<Vec<EffectRecord>> {
        let source_id = source_id.to_string();
        self.read(move |conn| {
            query_docs(
                conn,
                "SELECT doc FROM effects WHERE source_id = ?1 ORDER BY ordinal",
                params![source_id],
            )
        })
        .await
    }

    async fn effects_with_status(&self, status: EffectStatus) -> Result<Vec<EffectRecord>> {
        self.read(move |conn| {
            query_docs(
                conn,
                "SELECT doc FROM effects WHERE status = ?1 ORDER BY source_id, ordinal",
                params![status.as_str()],
            )
        })
        .await
    }
}

#[async_trait]
impl EventRepository for SqliteStore {
    async fn history(&self, kind: EntityKind, id: &str) -> Result<Vec<Event>> {
        let id = id.to_string();
        self.read(move |conn| {
            query_docs(
                conn,
                "SELECT doc FROM events WHERE entity_kind = ?1 AND entity_id = ?2 ORDER BY seq",
                params![kind.as_str(), id],
            )
        })
        .await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Event>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut events: Vec<Event> = self
            .read(move |conn| {
                query_docs(conn, "SELECT doc FROM events ORDER BY seq DESC LIMIT ?1", params![limit])
            })
            .await?;
        events.reverse();
        Ok(events)
    }

    async fn reserve_seq_block(&self, size: u32) -> Result<u64> {
        let end = self.bump_counter(EVENT_SEQ_SCOPE.to_string(), size.max(1)).await?;
        let start = end - i64::from(size.max(1)) + 1;
        u64::try_from(start).map_err(|_| TradeflowError::internal(format!("event seq {start} out of range")))
    }
}

#[async_trait]
impl SequenceRepository for SqliteStore {
    async fn next_counter(&self, scope: &str) -> Result<u32> {
        let value = self.bump_counter(scope.to_string(), 1).await?;
        u32::try_from(value)
            .map_err(|_| TradeflowError::internal(format!("counter {scope} overflowed at {value}")))
    }
}

#[async_trait]
impl RateRepository for SqliteStore {
    async fn rate_on_or_before(&self, currency: Currency, date: NaiveDate) -> Result<Option<ExchangeRate>> {
        self.read(move |conn| {
            let row = conn
                .query_row(
                    "SELECT date, rate FROM exchange_rates WHERE currency = ?1 AND date <= ?2
                     ORDER BY date DESC LIMIT 1",
                    params![currency.code(), date.to_string()],
                    map_rate_row,
                )
                .optional()?;
            row.map(|row| exchange_rate(currency, row)).transpose()
        })
        .await
    }

    async fn rates_between(&self, currency: Currency, from: NaiveDate, to: NaiveDate) -> Result<Vec<ExchangeRate>> {
        self.read(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT date, rate FROM exchange_rates WHERE currency = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date",
            )?;
            let rows = stmt.query_map(
                params![currency.code(), from.to_string(), to.to_string()],
                map_rate_row,
            )?;
            let mut rates = Vec::new();
            for row in rows {
                rates.push(exchange_rate(currency, row?)?);
            }
            Ok(rates)
        })
        .await
    }
}

fn map_rate_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn exchange_rate(currency: Currency, (date, rate): (String, String)) -> StorageResult<ExchangeRate> {
    let date = NaiveDate::from_str(&date)
        .map_err(|e| StorageError::Query(format!("{currency} rate date '{date}': {e}")))?;
    let rate = Decimal::from_str(&rate)
        .map_err(|e| StorageError::Query(format!("{currency} rate '{rate}' on {date}: {e}")))?;
    Ok(ExchangeRate { currency, date, rate })
}

#[async_trait]
impl ProductCodeRepository for SqliteStore {
    async fn get_product_code(&self, code: &str) -> Result<Option<RegisteredProductCode>> {
        let code = code.to_string();
        self.read(move |conn| query_doc(conn, "SELECT doc FROM product_codes WHERE code = ?1", params![code]))
            .await
    }

    async fn list_product_codes(&self, family: Option<&str>) -> Result<Vec<RegisteredProductCode>> {
        let family = family.map(str::to_string);
        self.read(move |conn| {
            query_docs(
                conn,
                "SELECT doc FROM product_codes WHERE ?1 IS NULL OR family = ?1 ORDER BY code",
                params![family],
            )
        })
        .await
    }
}
