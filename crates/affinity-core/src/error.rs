//! Error types for affinity.

use thiserror::Error;

use crate::models::UserId;

/// Result type alias using affinity's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for affinity operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The tag store answered with a non-success status
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Another action on the same viewer/target pair is still in flight
    #[error("Action already in flight for {viewer} -> {target}")]
    Busy { viewer: UserId, target: UserId },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("user 7".to_string());
        assert_eq!(err.to_string(), "Not found: user 7");
    }

    #[test]
    fn test_error_display_store() {
        let err = Error::Store("toggle_tag returned 500".to_string());
        assert_eq!(err.to_string(), "Store error: toggle_tag returned 500");
    }

    #[test]
    fn test_error_display_busy() {
        let err = Error::Busy {
            viewer: UserId(1),
            target: UserId(2),
        };
        assert_eq!(err.to_string(), "Action already in flight for 1 -> 2");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing API url".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API url");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<Vec<i64>>("[1, two]").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
