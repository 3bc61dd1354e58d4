//! Bridge Configuration (girder.toml)
//!
//! Handles the bridge configuration file and its environment overrides.
//! The `[native]` table is the capability gate: native access is denied
//! unless `access = true` is present (or `GIRDER_NATIVE_ACCESS` grants it).

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the bridge configuration file
pub const CONFIG_FILE_NAME: &str = "girder.toml";

/// Environment override for the native-access capability gate
pub const ENV_NATIVE_ACCESS: &str = "GIRDER_NATIVE_ACCESS";

/// Environment override for the artifact path
pub const ENV_ARTIFACT: &str = "GIRDER_ARTIFACT";

/// Bridge configuration from girder.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Native interop settings
    #[serde(default)]
    pub native: NativeConfig,
}

/// Native interop settings (`[native]` table)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct NativeConfig {
    /// Capability gate: must be true before any artifact may be loaded
    #[serde(default)]
    pub access: bool,

    /// Explicit path to the native artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,

    /// Platform-resolved artifact name (lib{name}.so / lib{name}.dylib / {name}.dll)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Additional artifact search paths, highest priority first
    #[serde(default, rename = "search-paths", skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,
}

impl BridgeConfig {
    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let mut config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error: e,
            })?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Discover configuration by walking up the directory tree from `start_dir`
    ///
    /// Returns `ConfigError::NotFound` when no girder.toml exists in any
    /// ancestor directory.
    pub fn discover(start_dir: &Path) -> ConfigResult<Self> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Self::load_from_file(&candidate);
            }
            current = dir.parent();
        }

        Err(ConfigError::NotFound(start_dir.join(CONFIG_FILE_NAME)))
    }

    /// Apply environment variable overrides
    ///
    /// `GIRDER_NATIVE_ACCESS` accepts 1/true/0/false; `GIRDER_ARTIFACT`
    /// replaces the configured artifact path.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(access) = env::var(ENV_NATIVE_ACCESS) {
            self.native.access = parse_bool(ENV_NATIVE_ACCESS, &access)?;
        }

        if let Ok(artifact) = env::var(ENV_ARTIFACT) {
            if artifact.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: ENV_ARTIFACT.to_string(),
                    reason: "path cannot be empty".to_string(),
                });
            }
            self.native.artifact = Some(PathBuf::from(artifact));
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(name) = &self.native.name {
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "native.name".to_string(),
                    reason: "name cannot be empty".to_string(),
                });
            }
            // A bare name is resolved against search paths; a path would
            // silently never match platform naming.
            if name.contains('/') || name.contains('\\') {
                return Err(ConfigError::InvalidValue {
                    field: "native.name".to_string(),
                    reason: "use 'artifact' for explicit paths".to_string(),
                });
            }
        }

        if let Some(artifact) = &self.native.artifact {
            if artifact.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "native.artifact".to_string(),
                    reason: "path cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl NativeConfig {
    /// Build a configuration that grants native access to one explicit artifact
    ///
    /// Intended for embedders that resolve the artifact path themselves and
    /// have already decided to trust it.
    pub fn trusted(artifact: impl Into<PathBuf>) -> Self {
        Self {
            access: true,
            artifact: Some(artifact.into()),
            name: None,
            search_paths: Vec::new(),
        }
    }

    /// Whether the native-access capability gate is open
    pub fn access_granted(&self) -> bool {
        self.access
    }
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected 1/true/0/false, got '{}'", other),
        }),
    }
}
