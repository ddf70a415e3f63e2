//! Error types for configuration loading.
//!
//! Height resolution itself never errors: missing data is `None` at every
//! tier and failed background samples are retried on a later refresh cycle.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config format for {path}: expected .toml or .json")]
    UnsupportedFormat { path: PathBuf },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
