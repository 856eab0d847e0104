//! Error types for rulebook.
//!
//! Library crates use [`RulebookError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all rulebook operations.
#[derive(Debug, thiserror::Error)]
pub enum RulebookError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Output or input validation error (audit failures, bad counts, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Document metadata (`metadata.json`) error.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// A skill name that is not present in the configuration.
    #[error("unknown skill: {name} (available: {available})")]
    UnknownSkill { name: String, available: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RulebookError>;

impl RulebookError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a metadata error from any displayable message.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
