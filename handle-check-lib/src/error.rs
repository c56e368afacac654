//! Error handling for username checking operations.
//!
//! This module defines one error type that covers every way a run can fail,
//! from a throttled remote call to an unwritable checkpoint file.

use std::time::Duration;

/// Main error type for username checking operations.
///
/// Per-identifier failures (`RateLimited`, `NetworkError`, `RemoteError`, ...)
/// are retried by the worker pool and never abort a run. Setup failures
/// (`ConfigError`, `FileError`) are returned before any work starts.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandleCheckError {
    /// Identifier rejected before it was sent anywhere
    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// Network-related errors (connection refused, DNS, ...)
    #[error("Network error: {message}{}", .detail.as_ref().map(|d| format!(" (source: {})", d)).unwrap_or_default())]
    NetworkError {
        message: String,
        detail: Option<String>,
    },

    /// The remote service answered, but with something we could not classify
    #[error("Remote error for '{identifier}'{}: {message}", .status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    RemoteError {
        identifier: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The remote service asked us to slow down
    #[error("Rate limited by {service}{}: {message}", .retry_after.map(|d| format!(" (retry after {:?})", d)).unwrap_or_default())]
    RateLimited {
        service: String,
        message: String,
        retry_after: Option<Duration>,
    },

    /// JSON parsing errors (checkpoint or remote payloads)
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// Configuration errors (invalid settings, unreadable TOML, ...)
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// File I/O errors on input lists and output artifacts
    #[error("File error at '{path}': {message}")]
    FileError { path: String, message: String },

    /// Checkpoint persistence failures
    #[error("Storage error at '{path}': {message}")]
    StorageError { path: String, message: String },

    /// Timeout errors when a remote call takes too long
    #[error("Timeout after {duration:?} during: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The run was cancelled while waiting
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic internal errors that don't fit other categories
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl HandleCheckError {
    /// Create a new invalid identifier error.
    pub fn invalid_identifier<I: Into<String>, R: Into<String>>(identifier: I, reason: R) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            detail: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            detail: Some(source.into()),
        }
    }

    /// Create a new remote error.
    pub fn remote<I: Into<String>, M: Into<String>>(identifier: I, message: M) -> Self {
        Self::RemoteError {
            identifier: identifier.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new remote error with HTTP status code.
    pub fn remote_with_status<I: Into<String>, M: Into<String>>(
        identifier: I,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::RemoteError {
            identifier: identifier.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new rate limit error.
    pub fn rate_limited<S: Into<String>, M: Into<String>>(
        service: S,
        message: M,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::RateLimited {
            service: service.into(),
            message: message.into(),
            retry_after,
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new storage error.
    pub fn storage<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::StorageError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this is the remote service's "slow down" signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Server-specified wait carried by a rate limit error, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Check if this error suggests the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::RemoteError {
                    status_code: Some(500..=599),
                    ..
                }
        )
    }
}

// Implement From conversions for common error types
impl From<reqwest::Error> for HandleCheckError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request", Duration::from_secs(30))
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for HandleCheckError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON parsing failed: {}", err),
        }
    }
}

impl From<std::io::Error> for HandleCheckError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<regex::Error> for HandleCheckError {
    fn from(err: regex::Error) -> Self {
        Self::Internal {
            message: format!("Regex error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_helpers() {
        let err = HandleCheckError::rate_limited("remote", "FLOOD_WAIT_30", Some(Duration::from_secs(30)));
        assert!(err.is_rate_limit());
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));

        let other = HandleCheckError::network("connection reset");
        assert!(!other.is_rate_limit());
        assert_eq!(other.retry_after(), None);
    }

    #[test]
    fn test_remote_error_retryable_only_on_5xx() {
        assert!(HandleCheckError::remote_with_status("alice", "bad gateway", 502).is_retryable());
        assert!(!HandleCheckError::remote_with_status("alice", "bad request", 400).is_retryable());
        assert!(!HandleCheckError::remote("alice", "weird").is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = HandleCheckError::remote_with_status("alice", "teapot", 418);
        assert_eq!(err.to_string(), "Remote error for 'alice' (HTTP 418): teapot");

        let err = HandleCheckError::rate_limited("remote", "slow down", None);
        assert_eq!(err.to_string(), "Rate limited by remote: slow down");

        let err = HandleCheckError::network_with_source("Connection failed", "refused");
        assert_eq!(err.to_string(), "Network error: Connection failed (source: refused)");
    }
}
