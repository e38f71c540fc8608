//! Application context - dependency injection container

use std::path::Path;
use std::sync::Arc;

use tokio::task;
use tradeflow_core::{BusinessEngine, EngineBuilder};
use tradeflow_domain::{Config, Result};
use tradeflow_infra::{import_rate_file, open_store, InfraError, SqliteStore};

use crate::utils::health::{ComponentHealth, HealthReport};

/// Actor recorded for work the process does on its own behalf.
pub const SYSTEM_ACTOR: &str = "system";

/// Application context - holds the engine and the store it runs on
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub engine: Arc<BusinessEngine>,
}

impl AppContext {
    /// Open the configured database and build the engine over it.
    pub async fn new(config: Config) -> Result<Self> {
        Self::open_with(config, |builder| builder).await
    }

    /// Like [`AppContext::new`], letting the caller adjust the engine
    /// (clock, routing policy, effect handlers) before it is built.
    pub async fn open_with<F>(config: Config, customize: F) -> Result<Self>
    where
        F: FnOnce(EngineBuilder) -> EngineBuilder,
    {
        let database = config.database.clone();
        let (store, stores) = task::spawn_blocking(move || open_store(&database))
            .await
            .map_err(InfraError::from)??;

        let engine = customize(BusinessEngine::builder(stores, config.engine.clone())).build();
        let ctx = Self { config, store, engine: Arc::new(engine) };

        if ctx.config.rates.import_on_start {
            if let Some(source) = ctx.config.rates.source_path.as_deref() {
                import_rate_file(&ctx.engine, Path::new(source), SYSTEM_ACTOR).await?;
            }
        }

        tracing::info!(
            db_path = %ctx.store.db().path().display(),
            local_currency = %ctx.config.engine.local_currency,
            "application context initialised"
        );
        Ok(ctx)
    }

    /// Probe the database and the effect backlog.
    pub async fn health_check(&self) -> HealthReport {
        let db = Arc::clone(self.store.db());
        let database = match task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(status)) => ComponentHealth::healthy(
                "database",
                Some(format!("{}/{} connections", status.connections, status.max_connections)),
            ),
            Ok(Err(err)) => ComponentHealth::unhealthy("database", err.to_string()),
            Err(err) => ComponentHealth::unhealthy("database", err.to_string()),
        };

        let effects = match self.engine.unfinished_effects().await {
            Ok(unfinished) if unfinished.is_empty() => ComponentHealth::healthy("effects", None),
            Ok(unfinished) => ComponentHealth::unhealthy(
                "effects",
                format!("{} effects awaiting retry", unfinished.len()),
            ),
            Err(err) => ComponentHealth::unhealthy("effects", err.to_string()),
        };

        HealthReport::new(vec![database, effects])
    }
}
