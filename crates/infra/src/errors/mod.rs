//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{storage_error, InfraError};
