//! Configuration management
//!
//! Every business default the engine relies on lives in [`EngineConfig`];
//! nothing below the configuration layer falls back to a hidden constant.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::errors::{Result, TradeflowError};
use crate::types::money::Currency;
use crate::types::product_code::CategoryRegistry;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub rates: RatesConfig,
    pub engine: EngineConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "tradeflow.db".to_string(), pool_size: 8, busy_timeout_ms: 5_000 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `tradeflow_core=debug,info`.
    pub level: String,
    pub json: bool,
    /// Write daily-rolling log files here in addition to stderr.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false, directory: None }
    }
}

/// Exchange-rate source configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// JSON file of `{currency, date, rate}` rows.
    pub source_path: Option<String>,
    pub import_on_start: bool,
}

/// How sales are recognized into the sales ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionBasis {
    /// One record per invoice line for every payment received.
    #[default]
    OnPayment,
    /// One record per quotation line when the quotation is approved.
    OnApproval,
}

/// Approver references and thresholds for the default routing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalPolicyConfig {
    pub quotation_ceo_threshold_usd: Decimal,
    pub purchase_order_ceo_threshold_usd: Decimal,
    pub sales_manager: String,
    pub operations_manager: String,
    pub ceo: String,
    pub hr: String,
    /// Single approver for `other` requests.
    pub other_approver: String,
}

impl Default for ApprovalPolicyConfig {
    fn default() -> Self {
        Self {
            quotation_ceo_threshold_usd: Decimal::from(10_000),
            purchase_order_ceo_threshold_usd: Decimal::from(5_000),
            sales_manager: "sales_manager".to_string(),
            operations_manager: "operations_manager".to_string(),
            ceo: "ceo".to_string(),
            hr: "hr".to_string(),
            other_approver: "ceo".to_string(),
        }
    }
}

/// Business defaults of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Currency `amount_local` columns are kept in.
    pub local_currency: Currency,
    pub default_tax_rate: Decimal,
    pub default_payment_terms_days: u32,
    pub default_delivery_days: u32,
    pub default_annual_leave_days: u32,
    /// Margin applied when a product has no cost price.
    pub default_margin: Decimal,
    /// Per product category overrides of `default_margin`.
    pub margin_by_category: BTreeMap<String, Decimal>,
    pub approval: ApprovalPolicyConfig,
    pub stale_approval_days: u32,
    pub event_block_size: u32,
    pub reference_cache_capacity: u64,
    pub reference_cache_ttl_secs: u64,
    pub sales_recognition: RecognitionBasis,
    pub low_stock_default_threshold: Decimal,
    pub product_codes: CategoryRegistry,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_currency: Currency::Vnd,
            default_tax_rate: Decimal::ZERO,
            default_payment_terms_days: constants::DEFAULT_PAYMENT_TERMS_DAYS,
            default_delivery_days: constants::DEFAULT_DELIVERY_DAYS,
            default_annual_leave_days: constants::DEFAULT_ANNUAL_LEAVE_DAYS,
            default_margin: Decimal::new(20, 2),
            margin_by_category: BTreeMap::new(),
            approval: ApprovalPolicyConfig::default(),
            stale_approval_days: constants::DEFAULT_STALE_APPROVAL_DAYS,
            event_block_size: constants::DEFAULT_EVENT_BLOCK_SIZE,
            reference_cache_capacity: constants::DEFAULT_REFERENCE_CACHE_CAPACITY,
            reference_cache_ttl_secs: constants::DEFAULT_REFERENCE_CACHE_TTL_SECS,
            sales_recognition: RecognitionBasis::default(),
            low_stock_default_threshold: Decimal::from(5),
            product_codes: CategoryRegistry::default(),
        }
    }
}

impl EngineConfig {
    /// Margin for a product category, falling back to `default_margin`.
    pub fn margin_for(&self, category: &str) -> Decimal {
        self.margin_by_category.get(category).copied().unwrap_or(self.default_margin)
    }

    /// Annual leave for an employee record that may leave it unset.
    pub fn annual_leave_days(&self, explicit: Option<u32>) -> u32 {
        explicit.unwrap_or(self.default_annual_leave_days)
    }
}

impl Config {
    /// Reject values that would make the engine misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(TradeflowError::Config("database.path must not be empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(TradeflowError::Config("database.pool_size must be at least 1".into()));
        }
        let engine = &self.engine;
        let unit = Decimal::ZERO..Decimal::ONE;
        if !(Decimal::ZERO..=Decimal::ONE).contains(&engine.default_tax_rate) {
            return Err(TradeflowError::Config("engine.default_tax_rate must be within 0..=1".into()));
        }
        if !unit.contains(&engine.default_margin) {
            return Err(TradeflowError::Config("engine.default_margin must be within 0..1".into()));
        }
        if let Some((category, _)) = engine.margin_by_category.iter().find(|(_, m)| !unit.contains(*m)) {
            return Err(TradeflowError::Config(format!(
                "engine.margin_by_category.{category} must be within 0..1"
            )));
        }
        if engine.event_block_size == 0 {
            return Err(TradeflowError::Config("engine.event_block_size must be at least 1".into()));
        }
        let approval = &engine.approval;
        for (name, value) in [
            ("sales_manager", &approval.sales_manager),
            ("operations_manager", &approval.operations_manager),
            ("ceo", &approval.ceo),
            ("hr", &approval.hr),
            ("other_approver", &approval.other_approver),
        ] {
            if value.trim().is_empty() {
                return Err(TradeflowError::Config(format!("engine.approval.{name} must not be empty")));
            }
        }
        if engine.product_codes.families.is_empty() {
            return Err(TradeflowError::Config("engine.product_codes needs at least one family".into()));
        }
        Ok(())
    }
}
