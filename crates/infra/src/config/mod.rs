//! Configuration loading

pub mod loader;

pub use loader::{load_from_file, probe_config_paths, ConfigLoader};
