//! Read-side view rows

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::period::Period;
use super::workflow::StageName;

/// In-progress workflows currently sitting at one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBucket {
    pub stage: StageName,
    pub count: usize,
    pub workflow_ids: Vec<String>,
}

/// Where `low_stock` takes its threshold from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ThresholdSource {
    /// Each product's own `reorder_level`.
    ProductReorderLevel,
    /// One threshold for every product.
    Fixed { qty: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_ref: String,
    pub product_name: String,
    pub on_hand: Decimal,
    pub threshold: Decimal,
    pub shortfall: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStats {
    pub period: Period,
    /// Workflows created in the period.
    pub created: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub in_progress: usize,
    /// `completed / created * 100`, two decimals; `None` when nothing was created.
    pub completion_rate_pct: Option<Decimal>,
    /// Mean days from creation to completion, over completed workflows.
    pub average_days_to_complete: Option<Decimal>,
}
