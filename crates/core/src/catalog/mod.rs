//! Product code catalog
//!
//! Codes are parsed and assembled against the configured category registry.
//! Registering a code stores it once; later registrations return the stored
//! entry unchanged.

use std::sync::Arc;

use tracing::{info, warn};
use tradeflow_domain::{
    CategoryRegistry, EntityKind, ProductCode, RegisteredProductCode, Result,
};

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::locks::{keys, AggregateLocks};
use crate::store::{ProductCodeRepository, UnitOfWork, Write, WriteBatch};

pub struct ProductCatalog {
    registry: CategoryRegistry,
    repo: Arc<dyn ProductCodeRepository>,
    uow: Arc<dyn UnitOfWork>,
    audit: Arc<AuditLog>,
    locks: Arc<AggregateLocks>,
    clock: Arc<dyn Clock>,
}

impl ProductCatalog {
    pub fn new(
        registry: CategoryRegistry,
        repo: Arc<dyn ProductCodeRepository>,
        uow: Arc<dyn UnitOfWork>,
        audit: Arc<AuditLog>,
        locks: Arc<AggregateLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { registry, repo, uow, audit, locks, clock }
    }

    pub fn parse(&self, code: &str) -> Result<ProductCode> {
        self.registry.parse(code)
    }

    pub fn build(&self, family: &str, values: &[&str]) -> Result<ProductCode> {
        self.registry.build(family, values)
    }

    pub async fn register(&self, code: &str, actor: &str) -> Result<RegisteredProductCode> {
        let parsed = self.parse(code)?;
        let _guard = self.locks.lock(&keys::product_code(&parsed.code)).await;
        if let Some(existing) = self.repo.get_product_code(&parsed.code).await? {
            return Ok(existing);
        }

        let flagged: Vec<String> = parsed.flagged().into_iter().map(|s| s.name.clone()).collect();
        if !flagged.is_empty() {
            warn!(code = %parsed.code, segments = ?flagged, "registering code with unknown segment values");
        }
        let registered = RegisteredProductCode {
            code: parsed.code,
            family: parsed.family,
            flagged_segments: flagged,
            registered_by: actor.to_string(),
            registered_at: self.clock.now(),
        };
        let mut batch = WriteBatch::new().with(Write::ProductCode(registered.clone()));
        let draft = EventDraft::new(actor, EntityKind::ProductCode, &registered.code, "registered")
            .after(&registered)?;
        self.audit.record(&mut batch, draft).await?;
        self.uow.commit(batch).await?;

        info!(code = %registered.code, family = %registered.family, "product code registered");
        Ok(registered)
    }

    pub async fn list(&self, family: Option<&str>) -> Result<Vec<RegisteredProductCode>> {
        self.repo.list_product_codes(family).await
    }
}
