//! Error kinds for recall operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on `ErrorKind` to decide how to report a failure; no kind is
/// ever fatal to the interactive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Inference/LLM errors
    // =========================================================================
    /// LLM inference failed
    InferenceFailed,

    /// Provider not available
    ProviderUnavailable,

    /// Rate limit exceeded
    RateLimited,

    /// Network error
    NetworkFailed,

    /// Backend response could not be parsed
    ParseFailed,

    // =========================================================================
    // Memory store errors
    // =========================================================================
    /// The embedding backend failed to produce a vector
    EmbeddingFailed,

    /// Vector width does not match the index width
    DimensionMismatch,

    /// Storage operation failed
    StorageFailed,

    /// Serialization/deserialization failed
    SerializationFailed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    // =========================================================================
    // Calculator errors
    // =========================================================================
    /// Expression contains characters outside the arithmetic class
    UnsafeExpression,

    /// Expression was accepted but could not be evaluated
    EvaluationFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Inference
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::ParseFailed => "ParseFailed",

            // Memory store
            ErrorKind::EmbeddingFailed => "EmbeddingFailed",
            ErrorKind::DimensionMismatch => "DimensionMismatch",
            ErrorKind::StorageFailed => "StorageFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",

            // Calculator
            ErrorKind::UnsafeExpression => "UnsafeExpression",
            ErrorKind::EvaluationFailed => "EvaluationFailed",
        }
    }

    /// Whether the failure came from talking to a remote backend
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::ProviderUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::UnsafeExpression.to_string(), "UnsafeExpression");
        assert_eq!(ErrorKind::InferenceFailed.to_string(), "InferenceFailed");
    }

    #[test]
    fn test_is_backend() {
        assert!(ErrorKind::NetworkFailed.is_backend());
        assert!(ErrorKind::RateLimited.is_backend());
        assert!(!ErrorKind::EmbeddingFailed.is_backend());
        assert!(!ErrorKind::EvaluationFailed.is_backend());
    }
}
