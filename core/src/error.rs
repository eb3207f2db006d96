//! Error types for the request transport.
//!
//! # Design
//! Two channels carry errors. `InvalidArgument` and `Serialization` are
//! returned synchronously from constructors and `execute`, before any network
//! activity. Every other variant is delivered through the `CancellableRequest`
//! future, so callers handle transport failures and parse failures in one
//! place and tell them apart by `kind()` or by the fixed reason string.

use thiserror::Error;

/// Errors produced by `Transport` construction and request execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A required argument (endpoint, payload, method) was missing or unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body was not valid JSON.
    #[error("failed to parse JSON from request {payload} at {endpoint}: {detail}")]
    Parse {
        payload: String,
        endpoint: String,
        detail: String,
    },

    /// The transport primitive reported an abort that was not requested by `cancel()`.
    #[error("Request aborted")]
    Aborted,

    #[error("Network failure")]
    NetworkFailure,

    #[error("Request timeout")]
    Timeout,

    /// The caller cancelled the request before it settled.
    #[error("Cancelled")]
    Cancelled,
}

/// Fieldless discriminant of `TransportError`, for matching without
/// destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Serialization,
    Parse,
    Aborted,
    NetworkFailure,
    Timeout,
    Cancelled,
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TransportError::Serialization(_) => ErrorKind::Serialization,
            TransportError::Parse { .. } => ErrorKind::Parse,
            TransportError::Aborted => ErrorKind::Aborted,
            TransportError::NetworkFailure => ErrorKind::NetworkFailure,
            TransportError::Timeout => ErrorKind::Timeout,
            TransportError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// True for errors raised before a request exists.
    pub fn is_synchronous(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidArgument | ErrorKind::Serialization
        )
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}
