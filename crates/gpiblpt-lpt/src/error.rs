//! Error types for parallel port option parsing

use thiserror::Error;

/// Errors in the `lpt` provider string
#[derive(Debug, Error)]
pub enum LptError {
    /// Invalid parameter value
    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    /// Unknown parameter name
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
}

/// Result type for option parsing
pub type Result<T> = std::result::Result<T, LptError>;
