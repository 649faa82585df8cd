//! Unified error handling for the gradient-path library.
//!
//! No error here is fatal: lookup failures are recovered locally by leaving
//! the endpoint elevation unknown, and import failures leave any existing
//! path untouched.

use std::fmt;

/// Unified error type for gradient-path operations.
#[derive(Debug, Clone)]
pub enum PathError {
    /// Serialized path data is missing required fields, breaks the chaining
    /// rules, or contains out-of-range coordinates
    MalformedImport { message: String },
    /// Path could not be encoded for export
    EncodeFailed { message: String },
    /// Elevation source was unreachable or returned no data
    LookupFailed { message: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::MalformedImport { message } => {
                write!(f, "Malformed path import: {}", message)
            }
            PathError::EncodeFailed { message } => {
                write!(f, "Path export failed: {}", message)
            }
            PathError::LookupFailed { message } => {
                write!(f, "Elevation lookup failed: {}", message)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Result type alias for gradient-path operations.
pub type Result<T> = std::result::Result<T, PathError>;
