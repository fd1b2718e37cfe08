//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{load_config, resolve_config_path, Config, ConfigError, CONFIG_PATH_ENV};
