//! Error types for docflow-client
//!
//! Failures fall into a small taxonomy that callers can match on:
//! - authorization and network races resolved inside the request pipeline
//!   never reach callers unless the credential renewal itself fails
//!   ([`Error::SessionTerminated`])
//! - any other HTTP failure is surfaced unchanged ([`Error::Status`])
//! - cancellation of a bulk operation is always its own variant
//!   ([`Error::Cancelled`])

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for docflow-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docflow-client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// The session could not be renewed and has ended
    ///
    /// The session observer has already been told; callers should send the
    /// user back through authentication.
    #[error("session terminated: {reason}")]
    SessionTerminated {
        /// Why renewal was impossible or failed
        reason: String,
    },

    /// The backend answered with a non-success status
    #[error("request to {path} failed with status {status}: {message}")]
    Status {
        /// HTTP status returned by the backend
        status: StatusCode,
        /// Request path (without base URL)
        path: String,
        /// Backend error message when the body carried one, else the status reason
        message: String,
    },

    /// The backend answered 2xx but the envelope reported a failure
    #[error("API error: {message}")]
    Api {
        /// Message from the envelope's error object
        message: String,
    },

    /// Transport-level failure (no usable response)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The operation was cancelled through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Archive writer failure
    #[error("archive error: {0}")]
    Archive(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid URL while joining a request path onto the base URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// True for [`Error::Cancelled`]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True for [`Error::SessionTerminated`]
    pub fn is_session_terminated(&self) -> bool {
        matches!(self, Error::SessionTerminated { .. })
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// True when no response was received at all (reset, refused, timed out)
    ///
    /// These are the failures a server produces when it drops the socket right
    /// after rejecting a stale credential.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Error::Network(e) => {
                !e.is_status()
                    && !e.is_builder()
                    && !e.is_decode()
                    && (e.is_connect() || e.is_timeout() || e.is_request() || e.is_body())
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// Machine-readable error code, suitable for user-facing message lookup
    pub fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::SessionTerminated { .. } => "session_terminated",
            Error::Status { status, .. } => match status.as_u16() {
                401 => "unauthorized",
                403 => "forbidden",
                404 => "not_found",
                409 => "conflict",
                422 => "validation_error",
                429 => "rate_limited",
                s if s >= 500 => "server_error",
                _ => "request_failed",
            },
            Error::Api { .. } => "api_error",
            Error::Network(_) => "network_error",
            Error::Cancelled => "cancelled",
            Error::Archive(_) => "archive_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Url(_) => "invalid_url",
        }
    }
}

/// Outcome of a failed credential renewal, shared by every waiter
///
/// Cloned out of the single-flight renewal future, so it carries only
/// what the waiters need to build their own [`Error`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenewalError {
    /// Human-readable reason the renewal failed
    pub reason: String,
}

impl RenewalError {
    /// Create a renewal error from any displayable reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for RenewalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl From<RenewalError> for Error {
    fn from(err: RenewalError) -> Self {
        Error::SessionTerminated { reason: err.reason }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let cases = vec![
            (
                Error::Config {
                    message: "bad".into(),
                    key: Some("base_url".into()),
                },
                "config_error",
            ),
            (
                Error::SessionTerminated {
                    reason: "refresh rejected".into(),
                },
                "session_terminated",
            ),
            (
                Error::Status {
                    status: StatusCode::UNAUTHORIZED,
                    path: "/documents".into(),
                    message: "Unauthorized".into(),
                },
                "unauthorized",
            ),
            (
                Error::Status {
                    status: StatusCode::BAD_GATEWAY,
                    path: "/documents".into(),
                    message: "Bad Gateway".into(),
                },
                "server_error",
            ),
            (
                Error::Status {
                    status: StatusCode::IM_A_TEAPOT,
                    path: "/documents".into(),
                    message: "teapot".into(),
                },
                "request_failed",
            ),
            (Error::Cancelled, "cancelled"),
            (Error::Archive("boom".into()), "archive_error"),
        ];

        for (error, code) in cases {
            assert_eq!(error.error_code(), code, "wrong code for {error}");
        }
    }

    #[test]
    fn test_status_accessor() {
        let err = Error::Status {
            status: StatusCode::FORBIDDEN,
            path: "/x".into(),
            message: "nope".into(),
        };
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(Error::Cancelled.status(), None);
    }

    #[test]
    fn test_renewal_error_becomes_session_terminated() {
        let err: Error = RenewalError::new("refresh token revoked").into();
        assert!(err.is_session_terminated());
        assert_eq!(err.to_string(), "session terminated: refresh token revoked");
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Api { message: "x".into() }.is_cancelled());
        assert!(!Error::Cancelled.is_connection_failure());
    }

    #[test]
    fn test_io_connection_failures() {
        let reset = Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(reset.is_connection_failure());

        let not_found = Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(!not_found.is_connection_failure());
    }
}
