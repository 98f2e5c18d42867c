use serde::Serialize;
use thiserror::Error;

use crate::common::types::now_ms;

/// Failures a player operation reports back to its caller.
///
/// None of these are fatal to the session; they are surfaced to the
/// requesting client or command only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("could not resolve `{0}` to a playable track")]
    ResolutionFailed(String),
    #[error("track {0} is not in the queue")]
    TrackNotFound(String),
    #[error("{0} is out of range")]
    InvalidRange(String),
    #[error("cannot {0} in the current player state")]
    InvalidState(&'static str),
    #[error("the player has been destroyed")]
    Destroyed,
}

impl PlayerError {
    /// Stable code sent to dashboard clients in `error{code,message}`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ResolutionFailed(_) => "RESOLUTION_FAILED",
            Self::TrackNotFound(_) => "TRACK_NOT_FOUND",
            Self::InvalidRange(_) => "INVALID_RANGE",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Destroyed => "SESSION_DESTROYED",
        }
    }
}

/// JSON error body returned by the REST boundary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    pub status: u16,
    /// HTTP reason phrase.
    pub error: String,
    pub message: String,
    /// Request path that caused the error.
    pub path: String,
}

impl ErrorResponse {
    fn with_status(status: u16, error: &str, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: now_ms(),
            status,
            error: error.into(),
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_status(400, "Bad Request", message, path)
    }

    pub fn not_found(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_status(404, "Not Found", message, path)
    }

    pub fn bad_gateway(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_status(502, "Bad Gateway", message, path)
    }

    pub fn unprocessable(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_status(422, "Unprocessable Entity", message, path)
    }
}
