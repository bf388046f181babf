//! Parsing and validation of `vicsim.toml` run configuration files.
//!
//! This crate reads the run configuration and produces a strongly-typed
//! [`SimulatorConfig`]. Command-line flags are layered on top by the binary.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config};
pub use types::*;
