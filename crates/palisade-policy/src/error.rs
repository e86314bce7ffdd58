//! Policy error types.

use thiserror::Error;

/// Errors produced while validating a policy document.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A field holds a value outside its acceptable range or form.
    #[error("invalid policy field '{field}': {message}")]
    Validation {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
