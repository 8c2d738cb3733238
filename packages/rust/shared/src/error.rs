//! Error types for CourseBuilder.
//!
//! Library crates use [`CourseBuilderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all CourseBuilder operations.
#[derive(Debug, thiserror::Error)]
pub enum CourseBuilderError {
    /// The user's daily build quota is already consumed. No job is created.
    #[error("admission denied: daily course build limit reached ({remaining} remaining)")]
    AdmissionDenied { remaining: u32 },

    /// A generation call failed or returned a value that does not match its shape.
    #[error("generation error: {0}")]
    Generation(String),

    /// An entity-store write failed while committing the course hierarchy.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record the caller referenced does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid state transition, malformed input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Anything else, captured by its display string.
    #[error("{0}")]
    Unknown(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CourseBuilderError>;

impl CourseBuilderError {
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

    /// Create a generation error from any displayable message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Re-classify a storage error raised while committing the course hierarchy.
    ///
    /// Errors that are already classified pass through untouched.
    pub fn into_persistence(self) -> Self {
        match self {
            Self::Storage(msg) => Self::Persistence(msg),
            Self::Unknown(msg) => Self::Persistence(msg),
            other => other,
        }
    }
}

impl From<serde_json::Error> for CourseBuilderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unknown(format!("json error: {err}"))
    }
}
