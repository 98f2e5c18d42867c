pub mod info;
pub mod sessions;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::common::errors::{ErrorResponse, PlayerError};

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Maps a player failure onto the REST error body.
pub fn player_error(error: &PlayerError, path: &str) -> ErrorResponse {
    match error {
        PlayerError::ResolutionFailed(_) => ErrorResponse::unprocessable(error.to_string(), path),
        PlayerError::TrackNotFound(_) | PlayerError::Destroyed => {
            ErrorResponse::not_found(error.to_string(), path)
        }
        PlayerError::InvalidRange(_) | PlayerError::InvalidState(_) => {
            ErrorResponse::bad_request(error.to_string(), path)
        }
    }
}
