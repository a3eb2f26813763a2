//! Error types for SQLMatic
//!
//! This module defines all error types used throughout the crate.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Categorizes LLM provider HTTP failures so the retry decorator can decide
/// without string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401 - Invalid API key or authentication failure
    Auth(String),
    /// 429 - Rate limit or quota exceeded
    RateLimit(String),
    /// 402 - Payment required or billing issue
    Billing(String),
    /// 500/502/503/504 - Server-side errors
    ServerError(String),
    /// 400 - Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404 - Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Provider is overloaded, retry with backoff
    Overloaded(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::ServerError(_)
                | ProviderError::Timeout(_)
                | ProviderError::Overloaded(_)
        )
    }
}

impl From<ProviderError> for SqlMaticError {
    fn from(err: ProviderError) -> Self {
        SqlMaticError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for SQLMatic operations.
#[derive(Error, Debug)]
pub enum SqlMaticError {
    /// Configuration-related errors (invalid config, missing provider, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider errors (transport failures, unparsable responses)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with classification for retry decisions.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// The language model could not produce a response for this round,
    /// after retries or because the round timed out.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Tool execution errors. Never reaches the agent caller; the registry
    /// turns these into structured tool results.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session management errors (persistence failures, bad keys, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// A history mutation would leave tool calls without results, or
    /// results without a matching call.
    #[error("Session corruption in '{session}': {detail}")]
    SessionCorruption { session: String, detail: String },

    /// Another run holds the session and the busy policy is `reject`.
    #[error("Session '{0}' is busy")]
    SessionBusy(String),

    /// The run was cancelled cooperatively.
    #[error("Run cancelled")]
    Cancelled,

    /// Evaluation harness errors (unreadable question set, etc.)
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// SQLite errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for SQLMatic operations.
pub type Result<T> = std::result::Result<T, SqlMaticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqlMaticError::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SqlMaticError = io_err.into();
        assert!(matches!(err, SqlMaticError::Io(_)));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let err: SqlMaticError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, SqlMaticError::Database(_)));
        assert!(err.to_string().starts_with("Database error"));
    }

    #[test]
    fn test_session_corruption_display() {
        let err = SqlMaticError::SessionCorruption {
            session: "abc".to_string(),
            detail: "tool result without call".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Session corruption in 'abc': tool result without call"
        );
    }

    #[test]
    fn test_provider_error_retryable() {
        assert!(ProviderError::RateLimit("slow down".into()).is_retryable());
        assert!(ProviderError::ServerError("boom".into()).is_retryable());
        assert!(ProviderError::Timeout("read".into()).is_retryable());
        assert!(ProviderError::Overloaded("busy".into()).is_retryable());
        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::InvalidRequest("bad json".into()).is_retryable());
    }

    #[test]
    fn test_provider_error_into_sqlmatic_error() {
        let err: SqlMaticError = ProviderError::Billing("pay up".into()).into();
        assert!(matches!(err, SqlMaticError::ProviderTyped(_)));
        assert_eq!(err.to_string(), "Provider error: Billing error: pay up");
    }
}
