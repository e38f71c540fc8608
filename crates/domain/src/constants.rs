//! Application constants
//!
//! Seed values for [`crate::config::EngineConfig`] defaults and a few fixed
//! limits of the engine.

// Engine defaults
pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;
pub const DEFAULT_DELIVERY_DAYS: u32 = 14;
pub const DEFAULT_ANNUAL_LEAVE_DAYS: u32 = 15;
pub const DEFAULT_STALE_APPROVAL_DAYS: u32 = 7;

// Event log sequence reservation
pub const DEFAULT_EVENT_BLOCK_SIZE: u32 = 64;

// Reference data cache
pub const DEFAULT_REFERENCE_CACHE_CAPACITY: u64 = 10_000;
pub const DEFAULT_REFERENCE_CACHE_TTL_SECS: u64 = 300;

// Actor recorded for writes the engine makes on its own behalf
pub const SYSTEM_ACTOR: &str = "system";
