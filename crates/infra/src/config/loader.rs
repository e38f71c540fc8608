//! Configuration loader
//!
//! Builds a [`Config`] from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. A TOML or JSON file (explicit path, `TRADEFLOW_CONFIG`, or the first
//!    probed standard location)
//! 3. `TRADEFLOW_*` environment variables, with `.env` honoured
//!
//! ## Environment Variables
//! - `TRADEFLOW_CONFIG`: config file path
//! - `TRADEFLOW_DB_PATH`: database file path
//! - `TRADEFLOW_DB_POOL_SIZE`: connection pool size
//! - `TRADEFLOW_DB_BUSY_TIMEOUT_MS`: SQLite busy timeout
//! - `TRADEFLOW_LOG_LEVEL`: `EnvFilter` directive
//! - `TRADEFLOW_LOG_JSON`: emit JSON log lines (true/false)
//! - `TRADEFLOW_LOG_DIR`: directory for daily-rolling log files
//! - `TRADEFLOW_RATES_SOURCE`: JSON rate file
//! - `TRADEFLOW_RATES_IMPORT_ON_START`: import the rate file on start
//! - `TRADEFLOW_LOCAL_CURRENCY`: currency of `amount_local` columns
//! - `TRADEFLOW_SALES_RECOGNITION`: `on_payment` or `on_approval`
//!
//! ## File Locations
//! Probed in order: `./tradeflow.{toml,json}`, `./config.{toml,json}`, the
//! same names one directory up, then next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tradeflow_domain::{Config, Currency, RecognitionBasis, Result, TradeflowError};

const CONFIG_PATH_VAR: &str = "TRADEFLOW_CONFIG";
const FILE_NAMES: [&str; 4] = ["tradeflow.toml", "tradeflow.json", "config.toml", "config.json"];

/// Layered configuration loader.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file instead of probing; it must exist.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    /// Load, overlay and validate the configuration.
    ///
    /// # Errors
    /// Returns `TradeflowError::Config` when a named file is missing, a file
    /// or variable fails to parse, or the merged result is invalid.
    pub fn load(&self) -> Result<Config> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(TradeflowError::Config(format!("invalid .env file: {err}"))),
        }

        let mut config = match self.resolve_path()? {
            Some(path) => load_from_file(&path)?,
            None => {
                tracing::debug!("no config file found, using defaults");
                Config::default()
            }
        };
        apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(&self) -> Result<Option<PathBuf>> {
        let explicit = self.path.clone().or_else(|| std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from));
        match explicit {
            Some(path) if path.exists() => Ok(Some(path)),
            Some(path) => {
                Err(TradeflowError::Config(format!("Config file not found: {}", path.display())))
            }
            None => Ok(probe_config_paths()),
        }
    }
}

/// Load configuration from a single file.
///
/// # Errors
/// Returns `TradeflowError::Config` if the file cannot be read or parsed.
pub fn load_from_file(path: &Path) -> Result<Config> {
    tracing::info!(path = %path.display(), "loading configuration file");
    let contents = std::fs::read_to_string(path)
        .map_err(|e| TradeflowError::Config(format!("Failed to read config file: {e}")))?;
    parse_config(&contents, path)
}

/// Parse by file extension; `.toml` or `.json`.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TradeflowError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TradeflowError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TradeflowError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".."));
        dirs.insert(0, cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(path) = env_opt("TRADEFLOW_DB_PATH") {
        config.database.path = path;
    }
    if let Some(size) = env_parse::<u32>("TRADEFLOW_DB_POOL_SIZE")? {
        config.database.pool_size = size;
    }
    if let Some(timeout) = env_parse::<u64>("TRADEFLOW_DB_BUSY_TIMEOUT_MS")? {
        config.database.busy_timeout_ms = timeout;
    }
    if let Some(level) = env_opt("TRADEFLOW_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("TRADEFLOW_LOG_JSON", config.logging.json);
    if let Some(dir) = env_opt("TRADEFLOW_LOG_DIR") {
        config.logging.directory = Some(dir);
    }
    if let Some(source) = env_opt("TRADEFLOW_RATES_SOURCE") {
        config.rates.source_path = Some(source);
    }
    config.rates.import_on_start =
        env_bool("TRADEFLOW_RATES_IMPORT_ON_START", config.rates.import_on_start);
    if let Some(currency) = env_parse::<Currency>("TRADEFLOW_LOCAL_CURRENCY")? {
        config.engine.local_currency = currency;
    }
    if let Some(basis) = env_opt("TRADEFLOW_SALES_RECOGNITION") {
        config.engine.sales_recognition = match basis.to_ascii_lowercase().as_str() {
            "on_payment" => RecognitionBasis::OnPayment,
            "on_approval" => RecognitionBasis::OnApproval,
            other => {
                return Err(TradeflowError::Config(format!(
                    "Invalid TRADEFLOW_SALES_RECOGNITION: {other}"
                )))
            }
        };
    }
    Ok(())
}

/// Non-empty environment variable.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| TradeflowError::Config(format!("Invalid {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::TempDir;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 7] = [
        "TRADEFLOW_CONFIG",
        "TRADEFLOW_DB_PATH",
        "TRADEFLOW_DB_POOL_SIZE",
        "TRADEFLOW_LOG_JSON",
        "TRADEFLOW_LOCAL_CURRENCY",
        "TRADEFLOW_SALES_RECOGNITION",
        "TRADEFLOW_RATES_SOURCE",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (i, raw) in ["1", "true", "yes", "on", "TRUE"].iter().enumerate() {
            let key = format!("TRADEFLOW_TEST_BOOL_T{i}");
            std::env::set_var(&key, raw);
            assert!(env_bool(&key, false), "{raw} should be true");
            std::env::remove_var(&key);
        }
        for (i, raw) in ["0", "false", "no", "off"].iter().enumerate() {
            let key = format!("TRADEFLOW_TEST_BOOL_F{i}");
            std::env::set_var(&key, raw);
            assert!(!env_bool(&key, true), "{raw} should be false");
            std::env::remove_var(&key);
        }

        assert!(env_bool("TRADEFLOW_TEST_BOOL_MISSING", true));
        assert!(!env_bool("TRADEFLOW_TEST_BOOL_MISSING", false));
    }

    #[test]
    fn test_toml_file_then_env_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "tradeflow.toml",
            r#"
[database]
path = "from-file.db"
pool_size = 3

[engine]
stale_approval_days = 10
"#,
        );

        std::env::set_var("TRADEFLOW_DB_PATH", "/tmp/from-env.db");
        std::env::set_var("TRADEFLOW_LOG_JSON", "yes");
        let config = ConfigLoader::with_path(&path).load();
        clear_env();
        std::env::remove_var("TRADEFLOW_LOG_JSON");

        let config = config.unwrap();
        assert_eq!(config.database.path, "/tmp/from-env.db");
        assert_eq!(config.database.pool_size, 3);
        assert!(config.logging.json);
        assert_eq!(config.engine.stale_approval_days, 10);
        assert_eq!(config.engine.approval.ceo, "ceo");
    }

    #[test]
    fn test_config_path_from_env_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "custom.json", r#"{"database": {"pool_size": 2}}"#);

        std::env::set_var("TRADEFLOW_CONFIG", &path);
        let config = ConfigLoader::new().load();
        clear_env();

        assert_eq!(config.unwrap().database.pool_size, 2);
    }

    #[test]
    fn test_invalid_env_values_are_config_errors() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "tradeflow.toml", "");

        std::env::set_var("TRADEFLOW_DB_POOL_SIZE", "not-a-number");
        let bad_pool = ConfigLoader::with_path(&path).load();
        clear_env();
        std::env::set_var("TRADEFLOW_SALES_RECOGNITION", "whenever");
        let bad_basis = ConfigLoader::with_path(&path).load();
        clear_env();
        std::env::set_var("TRADEFLOW_LOCAL_CURRENCY", "XYZ");
        let bad_currency = ConfigLoader::with_path(&path).load();
        clear_env();

        for result in [bad_pool, bad_basis, bad_currency] {
            assert!(matches!(result, Err(TradeflowError::Config(_))), "{result:?}");
        }
    }

    #[test]
    fn test_env_selects_recognition_and_currency() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "tradeflow.json", "{}");

        std::env::set_var("TRADEFLOW_SALES_RECOGNITION", "ON_APPROVAL");
        std::env::set_var("TRADEFLOW_LOCAL_CURRENCY", "KRW");
        let config = ConfigLoader::with_path(&path).load();
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.engine.sales_recognition, RecognitionBasis::OnApproval);
        assert_eq!(config.engine.local_currency, Currency::Krw);
    }

    #[test]
    fn test_invalid_merged_config_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "tradeflow.toml", "[database]\npool_size = 0\n");

        let err = ConfigLoader::with_path(&path).load().unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        let result = ConfigLoader::with_path("/nonexistent/tradeflow.toml").load();
        assert!(matches!(result, Err(TradeflowError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.json", r#"{ "this is": "not valid json" "#);
        assert!(load_from_file(&path).is_err());
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
