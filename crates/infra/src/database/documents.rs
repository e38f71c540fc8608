//! JSON document columns
//!
//! Aggregates live in a `doc TEXT` column; the helpers here read and write
//! them so every table maps rows the same way.

use rusqlite::{Connection, OptionalExtension, Params};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tradeflow_common::storage::StorageResult;

pub(crate) fn to_doc<T: Serialize>(value: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Every `doc` selected by `sql`, in row order.
pub(crate) fn query_docs<T, P>(conn: &Connection, sql: &str, params: P) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    P: Params,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
    let mut docs = Vec::new();
    for raw in rows {
        docs.push(serde_json::from_str(&raw?)?);
    }
    Ok(docs)
}

/// The single `doc` selected by `sql`, if any row matches.
pub(crate) fn query_doc<T, P>(conn: &Connection, sql: &str, params: P) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    P: Params,
{
    let raw: Option<String> = conn.query_row(sql, params, |row| row.get(0)).optional()?;
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Key column value for an optional per-line index.
pub(crate) fn line_column(line_index: Option<u32>) -> i64 {
    line_index.map_or(-1, i64::from)
}
