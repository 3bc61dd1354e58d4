//! Girder Configuration System
//!
//! Provides configuration for the girder native bridge:
//! - Bridge configuration (girder.toml)
//! - Native-access capability gate
//! - Environment variable overrides (GIRDER_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Bridge config (./girder.toml, discovered by walking up the directory tree)
//! 2. Environment variables (GIRDER_*)
//! 3. Values set programmatically by the embedding application
//!
//! # Example
//!
//! ```no_run
//! use girder_config::BridgeConfig;
//! use std::path::Path;
//!
//! let config = BridgeConfig::discover(Path::new(".")).unwrap();
//! assert!(config.native.access_granted());
//! ```

pub mod config;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use config::{BridgeConfig, NativeConfig, CONFIG_FILE_NAME};
