//! SQLite persistence

mod documents;
pub mod manager;
pub mod store;
mod unit_of_work;

pub use manager::{DbManager, SCHEMA_VERSION};
pub use store::SqliteStore;
