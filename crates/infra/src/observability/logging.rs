//! Process-wide `tracing` subscriber.
//!
//! Human or JSON lines on stderr, plus an optional daily-rolling file under
//! `logging.directory`. `RUST_LOG` overrides the configured level.

use std::io;
use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};
use tradeflow_domain::{LoggingConfig, Result, TradeflowError};

const LOG_FILE_PREFIX: &str = "tradeflow.log";

/// Keeps the file writer flushing; drop it on shutdown.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
///
/// A second call leaves the first subscriber in place and returns an empty
/// guard.
///
/// # Errors
/// `Config` when the level directive does not parse or the log directory
/// cannot be created.
pub fn init_tracing(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            TradeflowError::Config(format!("invalid logging.level '{}': {e}", config.level))
        })?,
    };

    let (file_layer, file_guard) = match config.directory.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(Path::new(dir))
                .map_err(|e| TradeflowError::Config(format!("cannot create log directory {dir}: {e}")))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(config.json, io::stderr, true))
        .with(file_layer.map(|writer| format_layer(config.json, writer, false)))
        .try_init();

    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, json = config.json, "tracing initialised");
            Ok(LoggingGuard { _file: file_guard })
        }
        Err(_) => {
            tracing::debug!("tracing already initialised");
            Ok(LoggingGuard::default())
        }
    }
}

fn format_layer<S, W>(json: bool, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi).with_target(true);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}
