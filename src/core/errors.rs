//! VJN-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, JanitorError>;

/// Top-level error type for the volume janitor.
#[derive(Debug, Error)]
pub enum JanitorError {
    #[error("[VJN-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[VJN-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[VJN-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[VJN-2001] calendar failure: {details}")]
    Calendar { details: String },

    #[error("[VJN-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[VJN-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[VJN-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl JanitorError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "VJN-1001",
            Self::MissingConfig { .. } => "VJN-1002",
            Self::ConfigParse { .. } => "VJN-1003",
            Self::Calendar { .. } => "VJN-2001",
            Self::Serialization { .. } => "VJN-2101",
            Self::Io { .. } => "VJN-3002",
            Self::Runtime { .. } => "VJN-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// A calendar outage is transient; the next evaluation pass may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Calendar { .. } | Self::Io { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for configuration errors.
    #[must_use]
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for JanitorError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for JanitorError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for JanitorError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
