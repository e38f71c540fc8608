//! Identifier & sequence service
//!
//! Date-sequence families (`Q`, `PO`, `INV`, `WF`) draw their counter from a
//! per prefix+month scope, counter families (`C`, `S`, `E`) from one scope
//! per prefix. Allocation for a scope is serialized through its own lock
//! and the store's atomic increment, so counters never repeat.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use tradeflow_domain::types::ids::format_date_sequence;
use tradeflow_domain::{IdFamily, IdScheme, Result, YearMonth};
use uuid::Uuid;

use crate::locks::{keys, AggregateLocks};
use crate::store::SequenceRepository;

pub struct IdService {
    sequences: Arc<dyn SequenceRepository>,
    locks: Arc<AggregateLocks>,
}

impl IdService {
    pub fn new(sequences: Arc<dyn SequenceRepository>, locks: Arc<AggregateLocks>) -> Self {
        Self { sequences, locks }
    }

    /// Next identifier of `family`; `at_date` picks the month for
    /// date-sequence families and is ignored otherwise.
    pub async fn next_id(&self, family: IdFamily, at_date: NaiveDate) -> Result<String> {
        let id = match family.scheme() {
            IdScheme::DateSequence { prefix } => {
                let month = YearMonth::from_date(at_date);
                let counter = self.next_counter(&format!("{prefix}{}", month.compact())).await?;
                format_date_sequence(prefix, month, counter)
            }
            IdScheme::Counter { prefix, width } => {
                let counter = self.next_counter(prefix).await?;
                format!("{prefix}{counter:0width$}")
            }
            IdScheme::Opaque { prefix } => opaque_id(prefix),
        };
        debug!(family = %family, id = %id, "allocated id");
        Ok(id)
    }

    async fn next_counter(&self, scope: &str) -> Result<u32> {
        let _guard = self.locks.lock(&keys::id_family(scope)).await;
        self.sequences.next_counter(scope).await
    }
}

/// `PREFIX_<32 hex digits>`, time-ordered.
pub fn opaque_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_ids_carry_prefix_and_hex() {
        let id = opaque_id("APR");
        let (prefix, hex) = id.split_once('_').unwrap();
        assert_eq!(prefix, "APR");
        assert_eq!(hex.len(), 32);
        assert!(hex.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(opaque_id("APR"), id);
    }
}
