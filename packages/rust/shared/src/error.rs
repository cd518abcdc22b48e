//! Error types for nimescreen.
//!
//! Library crates use [`NimeScreenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum NimeScreenError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching the listing page or a paper.
    #[error("network error: {0}")]
    Network(String),

    /// CSV read/write error.
    #[error("csv error at {path:?}: {message}")]
    Csv { path: PathBuf, message: String },

    /// PDF loading or text extraction error.
    #[error("pdf error: {0}")]
    Pdf(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing column, empty input set, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A required input directory or file does not exist.
    #[error("required input not found: {path:?} ({hint})")]
    MissingInput { path: PathBuf, hint: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NimeScreenError>;

impl NimeScreenError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a CSV failure with the file it concerns.
    pub fn csv(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Csv {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// A required input is absent; `hint` names the stage that produces it.
    pub fn missing_input(path: impl Into<PathBuf>, hint: impl Into<String>) -> Self {
        Self::MissingInput {
            path: path.into(),
            hint: hint.into(),
        }
    }
}
