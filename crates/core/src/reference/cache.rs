//! Reference data caching with moka
//!
//! Reads of customers, products, suppliers, employees and price lists go
//! through a positive cache of found records and a negative cache of ids
//! known to be absent. Only `Ok(None)` lands in the negative cache; storage
//! errors are never cached. Writes invalidate the key after commit.

use std::time::Duration;

use moka::sync::Cache;
use tradeflow_domain::{ReferenceKind, ReferenceRecord, Result};

#[derive(Debug, Clone, Copy)]
pub struct ReferenceCacheConfig {
    pub ttl: Duration,
    pub max_capacity: u64,
}

impl ReferenceCacheConfig {
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        Self { ttl: Duration::from_secs(ttl_secs), max_capacity }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheResult {
    Hit(ReferenceRecord),
    /// Known to not exist.
    NotFound,
    Miss,
}

type Key = (ReferenceKind, String);

pub struct ReferenceCache {
    positive: Cache<Key, ReferenceRecord>,
    negative: Cache<Key, ()>,
}

impl ReferenceCache {
    pub fn new(config: ReferenceCacheConfig) -> Self {
        tracing::info!(
            ttl_seconds = config.ttl.as_secs(),
            max_capacity = config.max_capacity,
            "reference cache configured"
        );
        Self {
            positive: Cache::builder().time_to_live(config.ttl).max_capacity(config.max_capacity).build(),
            negative: Cache::builder().time_to_live(config.ttl).max_capacity(config.max_capacity).build(),
        }
    }

    pub fn get(&self, kind: ReferenceKind, id: &str) -> CacheResult {
        let key = (kind, id.to_string());
        if self.negative.get(&key).is_some() {
            tracing::debug!(kind = %kind, id, "reference negative cache hit");
            return CacheResult::NotFound;
        }
        if let Some(record) = self.positive.get(&key) {
            tracing::debug!(kind = %kind, id, "reference cache hit");
            return CacheResult::Hit(record);
        }
        tracing::debug!(kind = %kind, id, "reference cache miss");
        CacheResult::Miss
    }

    /// Cache lookup falling back to `fetch` on a miss.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        kind: ReferenceKind,
        id: &str,
        fetch: F,
    ) -> Result<Option<ReferenceRecord>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Option<ReferenceRecord>>>,
    {
        match self.get(kind, id) {
            CacheResult::Hit(record) => return Ok(Some(record)),
            CacheResult::NotFound => return Ok(None),
            CacheResult::Miss => {}
        }
        match fetch().await {
            Ok(Some(record)) => {
                self.insert(record.clone());
                Ok(Some(record))
            }
            Ok(None) => {
                self.negative.insert((kind, id.to_string()), ());
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(kind = %kind, id, error = %err, "reference fetch failed");
                Err(err)
            }
        }
    }

    pub fn insert(&self, record: ReferenceRecord) {
        let key = (record.kind(), record.id().to_string());
        self.negative.invalidate(&key);
        self.positive.insert(key, record);
    }

    pub fn invalidate(&self, kind: ReferenceKind, id: &str) {
        let key = (kind, id.to_string());
        self.positive.invalidate(&key);
        self.negative.invalidate(&key);
        tracing::debug!(kind = %kind, id, "reference cache invalidated");
    }

    pub fn clear(&self) {
        self.positive.invalidate_all();
        self.negative.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.positive.run_pending_tasks();
        self.negative.run_pending_tasks();
        self.positive.entry_count() + self.negative.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tradeflow_domain::{Currency, Customer, RecordStatus};

    use super::*;

    fn customer(id: &str) -> ReferenceRecord {
        ReferenceRecord::Customer(Customer {
            id: id.into(),
            name: "Acme".into(),
            country: None,
            currency: Currency::Usd,
            payment_terms_days: None,
            contact_email: None,
            status: RecordStatus::Active,
        })
    }

    fn cache() -> ReferenceCache {
        ReferenceCache::new(ReferenceCacheConfig::new(300, 100))
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let found = cache
                .get_or_fetch(ReferenceKind::Customer, "C001", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(customer("C001")))
                })
                .await
                .unwrap();
            assert!(found.is_some());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_ids_are_negatively_cached_until_insert() {
        let cache = cache();
        let missing =
            cache.get_or_fetch(ReferenceKind::Customer, "C009", || async { Ok(None) }).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(cache.get(ReferenceKind::Customer, "C009"), CacheResult::NotFound);

        cache.insert(customer("C009"));
        assert!(matches!(cache.get(ReferenceKind::Customer, "C009"), CacheResult::Hit(_)));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = cache();
        let err = cache
            .get_or_fetch(ReferenceKind::Product, "P1", || async {
                Err(tradeflow_domain::TradeflowError::storage("database is locked"))
            })
            .await;
        assert!(err.is_err());
        assert_eq!(cache.get(ReferenceKind::Product, "P1"), CacheResult::Miss);
    }

    #[test]
    fn kinds_do_not_collide() {
        let cache = cache();
        cache.insert(customer("X1"));
        assert_eq!(cache.get(ReferenceKind::Supplier, "X1"), CacheResult::Miss);
        cache.invalidate(ReferenceKind::Customer, "X1");
        assert_eq!(cache.get(ReferenceKind::Customer, "X1"), CacheResult::Miss);
    }
}
