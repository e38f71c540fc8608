//! # Tradeflow API
//!
//! Command surface of the Tradeflow engine. Handlers in [`commands`] take an
//! [`AppContext`] and return a [`CommandEnvelope`]; the `tradeflow` binary
//! parses arguments with [`cli`] and prints the envelope as JSON.

pub mod cli;
pub mod commands;
pub mod context;
pub mod envelope;
pub mod utils;

pub use context::{AppContext, SYSTEM_ACTOR};
pub use envelope::CommandEnvelope;
