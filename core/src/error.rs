//! Error types for upstream extraction input and runtime settings.

use thiserror::Error;

/// Failure reported by the document-extraction collaborator.
///
/// A batch whose source fails with this error is abandoned before any
/// schema change or insert is attempted.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The extraction output could not be read.
    #[error("failed to read extraction output: {0}")]
    Io(#[from] std::io::Error),

    /// The extraction output is not valid JSON.
    #[error("malformed extraction output: {0}")]
    Json(#[from] serde_json::Error),

    /// The extraction output parsed but does not describe tables.
    #[error("extraction output has unexpected shape: {0}")]
    InvalidShape(String),
}

/// Errors raised while loading or validating [`Settings`](crate::Settings).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A setting holds a value that cannot be used.
    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Convenience alias for results with [`ConfigError`].
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
