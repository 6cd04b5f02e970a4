//! LG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, LgError>;

/// Top-level error type for loadgate.
#[derive(Debug, Error)]
pub enum LgError {
    #[error("[LG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LG-2001] remote API failure during {operation}: {details}")]
    Api {
        operation: &'static str,
        details: String,
    },

    #[error("[LG-2002] listener lifecycle violation: {details}")]
    Lifecycle { details: String },

    #[error("[LG-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LG-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LG-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[LG-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl LgError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LG-1001",
            Self::MissingConfig { .. } => "LG-1002",
            Self::ConfigParse { .. } => "LG-1003",
            Self::Api { .. } => "LG-2001",
            Self::Lifecycle { .. } => "LG-2002",
            Self::Serialization { .. } => "LG-2101",
            Self::Io { .. } => "LG-3002",
            Self::ChannelClosed { .. } => "LG-3003",
            Self::Runtime { .. } => "LG-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// The listener never retries on its own; this is advice for hosts.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api { .. } | Self::Io { .. } | Self::ChannelClosed { .. } | Self::Runtime { .. }
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

    /// Convenience constructor for remote API failures.
    #[must_use]
    pub fn api(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Api {
            operation,
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for LgError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for LgError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
