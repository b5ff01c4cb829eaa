//! Parsing and validation of `strobe.toml` bench configuration files.
//!
//! This crate reads the bench configuration file and produces a strongly-typed
//! [`BenchConfig`] that converts into kernel and engine settings.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{
    load_config, load_config_from_dir, load_config_from_str, validate_config, CONFIG_FILE_NAME,
};
pub use types::*;
