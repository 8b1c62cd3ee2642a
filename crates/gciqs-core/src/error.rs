//! Error types for the streaming answer consumer.
//!
//! Only transport-level failures are errors. Malformed frames and payloads are
//! recovered locally and never reach these types.

use thiserror::Error;

/// Errors reported by a [`QueryTransport`](crate::QueryTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no error detail"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// The `error` field of the structured response body, when present.
        message: Option<String>,
    },

    /// The request could not be sent or the response headers never arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Reading the streamed response body failed part way through.
    #[error("stream interrupted: {0}")]
    Body(String),
}

impl TransportError {
    /// The text shown in the error banner for this failure.
    ///
    /// Prefers the server's structured error field and falls back to a
    /// status-derived message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::Status { status, .. } => format!("HTTP {status}"),
            Self::Network(detail) | Self::Body(detail) => detail.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_error_is_preferred() {
        let err = TransportError::Status {
            status: 400,
            message: Some("query field is required".to_string()),
        };
        assert_eq!(err.user_message(), "query field is required");
    }

    #[test]
    fn status_fallback_without_body() {
        let err = TransportError::Status {
            status: 502,
            message: None,
        };
        assert_eq!(err.user_message(), "HTTP 502");
    }

    #[test]
    fn blank_error_field_falls_back_to_status() {
        let err = TransportError::Status {
            status: 500,
            message: Some("  ".to_string()),
        };
        assert_eq!(err.user_message(), "HTTP 500");
    }

    #[test]
    fn network_errors_pass_through() {
        let err = TransportError::Network("connection refused".to_string());
        assert_eq!(err.user_message(), "connection refused");
        assert_eq!(err.to_string(), "network error: connection refused");
    }
}
