//! Applies a [`WriteBatch`] inside one `BEGIN IMMEDIATE` transaction.
//!
//! Aggregates are upserted by id. Cash and event rows are plain inserts, so a
//! repeated id or seq fails the whole batch. Sales, effect plans, forecasts
//! and product codes are insert-or-ignore on their natural keys.

use std::str::FromStr;

use rusqlite::{params, OptionalExtension, Transaction};
use rust_decimal::Decimal;
use tradeflow_common::storage::{StorageError, StorageResult};
use tradeflow_core::store::Write;

use super::documents::{line_column, to_doc};

pub(crate) fn apply_write(tx: &Transaction<'_>, write: &Write) -> StorageResult<()> {
    match write {
        Write::Quotation(q) => {
            tx.execute(
                "INSERT OR REPLACE INTO quotations (id, customer_ref, status, doc) VALUES (?1, ?2, ?3, ?4)",
                params![q.id, q.customer_ref, q.status.as_str(), to_doc(q)?],
            )?;
        }
        Write::PurchaseOrder(po) => {
            tx.execute(
                "INSERT OR REPLACE INTO purchase_orders (id, quotation_ref, workflow_ref, status, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![po.id, po.quotation_ref, po.workflow_ref, po.status.as_str(), to_doc(po)?],
            )?;
        }
        Write::Invoice(invoice) => {
            tx.execute(
                "INSERT OR REPLACE INTO invoices
                    (id, quotation_ref, workflow_ref, customer_ref, payment_status, due_date, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    invoice.id,
                    invoice.quotation_ref,
                    invoice.workflow_ref,
                    invoice.customer_ref,
                    invoice.payment_status.as_str(),
                    invoice.due_date.to_string(),
                    to_doc(invoice)?
                ],
            )?;
        }
        Write::Workflow(workflow) => {
            tx.execute(
                "INSERT OR REPLACE INTO workflows (id, quotation_ref, status, doc) VALUES (?1, ?2, ?3, ?4)",
                params![workflow.id, workflow.quotation_ref, workflow.status.as_str(), to_doc(workflow)?],
            )?;
        }
        Write::Approval(approval) => {
            tx.execute(
                "INSERT OR REPLACE INTO approvals (id, target_ref, status, doc) VALUES (?1, ?2, ?3, ?4)",
                params![approval.id, approval.target_ref, approval.status.as_str(), to_doc(approval)?],
            )?;
        }
        Write::Reference(record) => {
            tx.execute(
                "INSERT OR REPLACE INTO reference_records (kind, id, name, status, doc) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.kind().as_str(),
                    record.id(),
                    record.name(),
                    record.status().as_str(),
                    to_doc(record)?
                ],
            )?;
        }
        Write::DeleteReference { kind, id } => {
            tx.execute(
                "DELETE FROM reference_records WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
            )?;
        }
        Write::StockAdjustment { product_ref, delta, at } => {
            let current: Option<String> = tx
                .query_row(
                    "SELECT on_hand FROM inventory WHERE product_ref = ?1",
                    params![product_ref],
                    |row| row.get(0),
                )
                .optional()?;
            let on_hand = match current {
                Some(raw) => Decimal::from_str(&raw).map_err(|e| {
                    StorageError::Query(format!("inventory for {product_ref} holds '{raw}': {e}"))
                })?,
                None => Decimal::ZERO,
            };
            tx.execute(
                "INSERT OR REPLACE INTO inventory (product_ref, on_hand, updated_at) VALUES (?1, ?2, ?3)",
                params![product_ref, (on_hand + delta).to_string(), at.to_rfc3339()],
            )?;
        }
        Write::Cash(cash) => {
            tx.execute(
                "INSERT INTO cash_transactions
                    (id, date, kind, entry_type, source_type, source_id, workflow_ref, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    cash.id,
                    cash.date.to_string(),
                    cash.kind.as_str(),
                    cash.entry_type.as_str(),
                    cash.source_type.as_str(),
                    cash.source_id,
                    cash.workflow_ref,
                    to_doc(cash)?
                ],
            )?;
        }
        Write::Sales(record) => {
            tx.execute(
                "INSERT OR IGNORE INTO sales_records
                    (id, year_month, customer_ref, product_ref, source_kind, source_id, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.year_month.to_string(),
                    record.customer_ref,
                    record.product_ref,
                    record.source_kind.as_str(),
                    record.source_id,
                    to_doc(record)?
                ],
            )?;
        }
        Write::SalesForecast(forecast) => {
            tx.execute(
                "INSERT OR IGNORE INTO sales_forecasts (quotation_ref, year_month, doc) VALUES (?1, ?2, ?3)",
                params![forecast.quotation_ref, forecast.year_month.to_string(), to_doc(forecast)?],
            )?;
        }
        Write::SalesTarget(target) => {
            tx.execute(
                "INSERT OR REPLACE INTO sales_targets (year_month, dimension, dimension_ref, doc)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    target.year_month.to_string(),
                    target.dimension.as_str(),
                    target.dimension_ref,
                    to_doc(target)?
                ],
            )?;
        }
        Write::PlanEffect(record) => {
            tx.execute(
                "INSERT OR IGNORE INTO effects (source_id, kind, line_index, ordinal, status, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.key.source_id,
                    record.key.kind.as_str(),
                    line_column(record.key.line_index),
                    record.ordinal,
                    record.status.as_str(),
                    to_doc(record)?
                ],
            )?;
        }
        Write::Effect(record) => {
            tx.execute(
                "INSERT OR REPLACE INTO effects (source_id, kind, line_index, ordinal, status, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.key.source_id,
                    record.key.kind.as_str(),
                    line_column(record.key.line_index),
                    record.ordinal,
                    record.status.as_str(),
                    to_doc(record)?
                ],
            )?;
        }
        Write::ProductCode(code) => {
            tx.execute(
                "INSERT OR IGNORE INTO product_codes (code, family, doc) VALUES (?1, ?2, ?3)",
                params![code.code, code.family, to_doc(code)?],
            )?;
        }
        Write::ExchangeRate(rate) => {
            tx.execute(
                "INSERT OR REPLACE INTO exchange_rates (currency, date, rate) VALUES (?1, ?2, ?3)",
                params![rate.currency.code(), rate.date.to_string(), rate.rate.to_string()],
            )?;
        }
        Write::Event(event) => {
            let seq = i64::try_from(event.seq)
                .map_err(|_| StorageError::Query(format!("event seq {} out of range", event.seq)))?;
            tx.execute(
                "INSERT INTO events (seq, at, actor, entity_kind, entity_id, verb, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    seq,
                    event.at.to_rfc3339(),
                    event.actor,
                    event.entity_kind.as_str(),
                    event.entity_id,
                    event.verb,
                    to_doc(event)?
                ],
            )?;
        }
    }
    Ok(())
}
