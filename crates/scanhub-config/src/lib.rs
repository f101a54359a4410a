// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scanhub configuration system
//!
//! YAML front-end over the [`scanhub_types::AppConfig`] tree:
//! - file loading with normalization and validation
//! - functionally-equivalent dump (keys may be reordered, numeric precision
//!   preserved to float)
//! - a named-config store backing the `configs/*` control-plane endpoints

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod store;
pub mod validation;

pub use loader::{dump_app_config, from_yaml_str, load_app_config, to_yaml_string};
pub use store::{is_valid_config_name, list_configs, load_named_config, save_named_config};
pub use validation::{validate_config, validate_dbscan, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML syntax: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation failed:\n{0}")]
    Validation(String),

    #[error("Invalid config name: {0}")]
    InvalidName(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
