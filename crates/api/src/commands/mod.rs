//! Command and query handlers
//!
//! Each handler takes the [`AppContext`](crate::AppContext) and plain
//! arguments and returns a [`CommandEnvelope`](crate::CommandEnvelope).

pub mod approval;
pub mod database;
pub mod effects;
pub mod events;
pub mod payment;
pub mod quotation;
pub mod rates;
pub mod reference;
pub mod reports;
pub mod workflow;
