//! Structured error types for the pulsar search workspace.

use thiserror::Error;

/// Unified error type for all pulsar search operations.
#[derive(Debug, Error)]
pub enum PulsarError {
    /// I/O error (tuning file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed tuning data)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values, short buffers)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Kernel template could not be assembled
    #[error("template error: {0}")]
    Template(String),

    /// Lookup miss in a tuning table
    #[error("not found: {0}")]
    NotFound(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PulsarError>;
