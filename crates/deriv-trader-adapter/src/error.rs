/*
[INPUT]:  Error sources (transport, remote envelopes, serialization, timeouts)
[OUTPUT]: Structured error type shared by every client operation
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use std::time::Duration;

use thiserror::Error;

/// Main error type for the Deriv adapter
#[derive(Error, Debug)]
pub enum DerivError {
    /// Transport failure or rejected authorization
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// Operation attempted without an open socket
    #[error("WebSocket is not connected")]
    NotConnected,

    /// The service answered with an error envelope
    #[error("Remote error ({code}): {message}")]
    Remote { code: String, message: String },

    /// No reply arrived in time
    #[error("Request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Caller cancelled the request before a reply arrived
    #[error("Request cancelled")]
    Cancelled,

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Payload could not be sent as an envelope
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Reply was well-formed JSON but not the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DerivError {
    /// Check if the error means the connection is gone or never came up
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DerivError::Connection { .. } | DerivError::NotConnected)
    }

    /// Create a remote error from the envelope's code and message
    pub fn remote_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        DerivError::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    pub(crate) fn connection(message: impl Into<String>) -> Self {
        DerivError::Connection {
            message: message.into(),
        }
    }

    pub(crate) fn timeout(duration: Duration) -> Self {
        DerivError::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Any failure during authorization is reported as a connection failure
    pub(crate) fn into_connection_error(self) -> Self {
        match self {
            DerivError::Connection { .. } => self,
            DerivError::Remote { code, message } => DerivError::Connection {
                message: format!("authorization rejected ({code}): {message}"),
            },
            other => DerivError::Connection {
                message: format!("authorization failed: {other}"),
            },
        }
    }
}

/// Result type alias for Deriv operations
pub type Result<T> = std::result::Result<T, DerivError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_connection_error() {
        assert!(DerivError::NotConnected.is_connection_error());
        assert!(DerivError::connection("refused").is_connection_error());
        assert!(!DerivError::Cancelled.is_connection_error());
        assert!(!DerivError::remote_error("InvalidToken", "bad").is_connection_error());
    }

    #[test]
    fn test_remote_error_creation() {
        let err = DerivError::remote_error("InputValidationFailed", "Input validation failed: amount");
        match err {
            DerivError::Remote { code, message } => {
                assert_eq!(code, "InputValidationFailed");
                assert_eq!(message, "Input validation failed: amount");
            }
            _ => panic!("Expected Remote error variant"),
        }
    }

    #[test]
    fn test_rejected_authorization_maps_to_connection() {
        let err = DerivError::remote_error("InvalidToken", "The token is invalid.")
            .into_connection_error();
        assert!(matches!(err, DerivError::Connection { ref message } if message.contains("The token is invalid.")));

        let err = DerivError::timeout(Duration::from_millis(1500)).into_connection_error();
        assert!(err.is_connection_error());
        assert_eq!(
            err.to_string(),
            "Connection failed: authorization failed: Request timed out after 1500ms"
        );
    }
}
