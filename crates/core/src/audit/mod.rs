//! Audit & event log
//!
//! Every state-changing command appends exactly one [`Event`] inside the
//! same [`WriteBatch`](crate::store::WriteBatch) as its data write. Sequence
//! numbers come from [`SequenceAllocator`], which reserves them from the
//! store in blocks so the hot path never touches the sequence row.

mod log;
mod sequencer;

pub use log::{AuditLog, EventDraft};
pub use sequencer::SequenceAllocator;
