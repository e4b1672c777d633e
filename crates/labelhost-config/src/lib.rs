//! Server configuration and feature flag loading.
//!
//! This crate defines the configuration values the labelhost server is built
//! from:
//!
//! - [`ServerConfig`] — Top-level settings read from the environment
//! - [`LocalFilesConfig`] — Toggle and document root for local file serving
//! - [`FeatureFlagSettings`] — Where feature flags come from
//! - [`FeatureFlags`] — Flags loaded from a JSON file
//!
//! # Loading from the environment
//!
//! ```rust,ignore
//! use labelhost_config::ServerConfig;
//!
//! dotenvy::dotenv().ok();
//! let config = ServerConfig::from_env()?;
//! ```
//!
//! # Loading from an explicit lookup
//!
//! ```rust
//! use labelhost_config::ServerConfig;
//!
//! let config = ServerConfig::from_lookup(|key| match key {
//!     "LOCAL_FILES_SERVING_ENABLED" => Some("true".to_string()),
//!     "LOCAL_FILES_DOCUMENT_ROOT" => Some("/data".to_string()),
//!     _ => None,
//! })
//! .unwrap();
//!
//! assert!(config.local_files.serving_enabled);
//! assert_eq!(config.local_files.document_root.to_str(), Some("/data"));
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors that can occur when loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON configuration.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment variable held a value that is not a boolean.
    #[error("Invalid boolean for {key}: '{value}'")]
    InvalidBool { key: String, value: String },
}

impl ConfigError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE_URL: &str = "data/labelhost.db";
const DEFAULT_DOCUMENT_ROOT: &str = "/";
const DEFAULT_FLAGS_FILE: &str = "feature_flags.json";
const DEFAULT_EDITION: &str = "Community";

/// Settings for serving files from local storage connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalFilesConfig {
    /// Global switch. When `false` every local file request is refused.
    pub serving_enabled: bool,
    /// Base directory all requested paths are resolved against.
    pub document_root: PathBuf,
}

impl Default for LocalFilesConfig {
    fn default() -> Self {
        Self {
            serving_enabled: false,
            document_root: PathBuf::from(DEFAULT_DOCUMENT_ROOT),
        }
    }
}

/// Where feature flags are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlagSettings {
    /// Load flags from [`FeatureFlagSettings::file`].
    pub from_file: bool,
    pub file: PathBuf,
    /// Value reported for flags that are not listed.
    pub default_value: bool,
}

impl Default for FeatureFlagSettings {
    fn default() -> Self {
        Self {
            from_file: false,
            file: PathBuf::from(DEFAULT_FLAGS_FILE),
            default_value: false,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub version_edition: String,
    pub local_files: LocalFilesConfig,
    pub feature_flags: FeatureFlagSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            database_url: DEFAULT_DATABASE_URL.into(),
            version_edition: DEFAULT_EDITION.into(),
            local_files: LocalFilesConfig::default(),
            feature_flags: FeatureFlagSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let boolean = |key: &str, default: bool| -> Result<bool, ConfigError> {
            lookup(key).map_or(Ok(default), |v| parse_bool(key, &v))
        };

        Ok(Self {
            bind_addr: string("BIND_ADDR", defaults.bind_addr),
            database_url: string("DATABASE_URL", defaults.database_url),
            version_edition: string("VERSION_EDITION", defaults.version_edition),
            local_files: LocalFilesConfig {
                serving_enabled: boolean(
                    "LOCAL_FILES_SERVING_ENABLED",
                    defaults.local_files.serving_enabled,
                )?,
                document_root: lookup("LOCAL_FILES_DOCUMENT_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.local_files.document_root),
            },
            feature_flags: FeatureFlagSettings {
                from_file: boolean("FEATURE_FLAGS_FROM_FILE", defaults.feature_flags.from_file)?,
                file: lookup("FEATURE_FLAGS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.feature_flags.file),
                default_value: boolean(
                    "FEATURE_FLAGS_DEFAULT_VALUE",
                    defaults.feature_flags.default_value,
                )?,
            },
        })
    }
}

/// Parses the boolean spellings accepted in environment variables.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "t" | "true" | "on" => Ok(true),
        "0" | "n" | "no" | "f" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Feature flags loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct FeatureFlags {
    flags: BTreeMap<String, bool>,
}

impl FeatureFlags {
    /// Loads flags according to `settings`.
    ///
    /// When `from_file` is off the result is empty.
    pub fn load(settings: &FeatureFlagSettings) -> Result<Self, ConfigError> {
        if !settings.from_file {
            return Ok(Self::default());
        }
        Self::from_file(&settings.file)
    }

    /// Reads a JSON object of `name -> bool` from `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parses a JSON object of `name -> bool`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let flags: BTreeMap<String, bool> = serde_json::from_str(json)?;
        Ok(Self { flags })
    }

    /// Returns every listed flag.
    pub fn all_flags(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }
}
