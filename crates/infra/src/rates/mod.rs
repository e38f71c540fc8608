//! JSON exchange-rate files
//!
//! A rate file is an array of `{"currency", "date", "rate"}` objects, rates
//! quoted as units of `currency` per USD:
//!
//! ```json
//! [{"currency": "VND", "date": "2025-03-01", "rate": "24500"}]
//! ```

use std::path::Path;

use tracing::info;
use tradeflow_core::BusinessEngine;
use tradeflow_domain::{ExchangeRate, Result, TradeflowError};

use crate::errors::InfraError;

/// Parse rate rows; row numbers in errors are 1-based.
pub fn parse_rate_file(contents: &str) -> Result<Vec<ExchangeRate>> {
    let rows: Vec<serde_json::Value> = serde_json::from_str(contents)
        .map_err(|e| TradeflowError::validation(format!("rate file is not a JSON array: {e}")))?;
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            serde_json::from_value(row)
                .map_err(|e| TradeflowError::validation(format!("rate file row {}: {e}", i + 1)))
        })
        .collect()
}

/// Read a rate file from disk.
pub async fn read_rate_file(path: &Path) -> Result<Vec<ExchangeRate>> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => {
            TradeflowError::NotFound(format!("rate file {}", path.display()))
        }
        _ => TradeflowError::from(InfraError::from(err)),
    })?;
    parse_rate_file(&contents)
}

/// Read `path` and record every rate in one transaction.
pub async fn import_rate_file(engine: &BusinessEngine, path: &Path, actor: &str) -> Result<usize> {
    let rates = read_rate_file(path).await?;
    let count = engine.import_rates(rates, actor).await?;
    info!(path = %path.display(), count, "rate file imported");
    Ok(count)
}
