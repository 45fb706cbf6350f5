//! Error types for CGM Flux
//!
//! The analytics themselves are total functions; these errors only arise at the
//! boundaries (JSON input, configuration loading, reading validation).

use thiserror::Error;

/// Errors that can occur while preparing input for computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid reading at index {index}: {reason}")]
    InvalidReading { index: usize, reason: String },

    #[error("Invalid {kind} record at index {index}: {reason}")]
    InvalidInsulin {
        kind: &'static str,
        index: usize,
        reason: String,
    },
}
