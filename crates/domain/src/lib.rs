//! # Tradeflow Domain
//!
//! Business domain types and models for the Tradeflow workflow engine.
//!
//! This crate contains:
//! - Entities (Quotation, Workflow, ApprovalRequest, Invoice, ...) and their
//!   state machines
//! - Domain error types and Result definitions
//! - Configuration structures with explicit business defaults
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Tradeflow crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
