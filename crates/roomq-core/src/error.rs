//! Shared error type across RoomQ crates.

use thiserror::Error;

/// Machine-readable error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Token failed signature/format/claim checks.
    InvalidToken,
    /// Remote service rejected the api key.
    InvalidApiKey,
    /// Locker quota exceeded.
    ReachedLimit,
    /// Room is administratively stopped.
    QueueStopped,
    /// Token is not in serving state on the backend.
    NotServing,
    /// Invalid input / configuration.
    BadRequest,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Transport failure or unmapped HTTP status.
    Http,
    /// Remote answered with a body we could not decode.
    Protocol,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::InvalidApiKey => "INVALID_API_KEY",
            ErrorCode::ReachedLimit => "REACHED_LIMIT",
            ErrorCode::QueueStopped => "QUEUE_STOPPED",
            ErrorCode::NotServing => "NOT_SERVING",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Http => "HTTP",
            ErrorCode::Protocol => "PROTOCOL",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RoomQError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum RoomQError {
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("reached limit")]
    ReachedLimit,
    #[error("queue stopped")]
    QueueStopped,
    #[error("not serving")]
    NotServing,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("http error (status={status:?}): {message}")]
    Http {
        status: Option<u16>,
        message: String,
    },
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RoomQError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomQError::InvalidToken => ErrorCode::InvalidToken,
            RoomQError::InvalidApiKey => ErrorCode::InvalidApiKey,
            RoomQError::ReachedLimit => ErrorCode::ReachedLimit,
            RoomQError::QueueStopped => ErrorCode::QueueStopped,
            RoomQError::NotServing => ErrorCode::NotServing,
            RoomQError::BadRequest(_) => ErrorCode::BadRequest,
            RoomQError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            RoomQError::Http { .. } => ErrorCode::Http,
            RoomQError::Protocol(_) => ErrorCode::Protocol,
            RoomQError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status carried by a transport error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RoomQError::Http { status, .. } => *status,
            _ => None,
        }
    }
}
