use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::player_error;
use crate::{
    common::{
        errors::ErrorResponse,
        types::{ChannelId, GuildId, SessionId},
    },
    protocol::models::{SessionSnapshot, Track},
    session::{CloseReason, Created, Session, SessionLabels},
    transport::state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub guild_id: GuildId,
    #[serde(default)]
    pub guild_name: String,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub channel_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session: SessionSnapshot,
    /// Shareable dashboard link.
    pub dashboard_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTrackRequest {
    pub query: String,
    #[serde(default)]
    pub requested_by: String,
}

#[derive(Debug, Serialize)]
pub struct AddTrackResponse {
    pub tracks: Vec<Track>,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    pub skipped: bool,
}

#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    pub alone: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    pub alone_timer: bool,
}

fn session_response(state: &AppState, session: &Session) -> SessionResponse {
    SessionResponse {
        session: session.snapshot(),
        dashboard_url: state.config.server.dashboard_link(&session.id),
    }
}

fn session_not_found(id: &str, path: &str) -> Response {
    ErrorResponse::not_found(format!("Session not found: {id}"), path).into_response()
}

fn guild_not_found(guild_id: &str, path: &str) -> Response {
    ErrorResponse::not_found(format!("No session for guild: {guild_id}"), path).into_response()
}

/// POST /v1/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<CreateSessionRequest>,
) -> Response {
    if body.guild_id.is_empty() || body.channel_id.is_empty() {
        return ErrorResponse::bad_request("guildId and channelId are required", uri.path()).into_response();
    }

    let labels = SessionLabels {
        guild_name: body.guild_name,
        channel_name: body.channel_name,
    };
    match state
        .registry
        .create_session(body.guild_id.clone(), body.channel_id, labels)
        .await
    {
        Ok(Created { session, is_new }) => {
            let status = if is_new { StatusCode::CREATED } else { StatusCode::OK };
            (status, Json(session_response(&state, &session))).into_response()
        }
        Err(e) => {
            error!("Voice connect failed: guild={} err={}", body.guild_id, e);
            ErrorResponse::bad_gateway(format!("Could not join voice: {e}"), uri.path()).into_response()
        }
    }
}

/// GET /v1/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    match state.registry.get_by_id(&SessionId::from(id.as_str())) {
        Some(session) => Json(session_response(&state, &session)).into_response(),
        None => session_not_found(&id, uri.path()),
    }
}

/// DELETE /v1/sessions/{id}
pub async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    if state
        .registry
        .destroy_session(&SessionId::from(id.as_str()), CloseReason::Stopped)
    {
        info!("Session {} stopped by host", id);
        StatusCode::NO_CONTENT.into_response()
    } else {
        session_not_found(&id, uri.path())
    }
}

/// GET /v1/guilds/{guild_id}/session
pub async fn get_guild_session(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    match state.registry.get_by_guild(&GuildId::from(guild_id.as_str())) {
        Some(session) => Json(session_response(&state, &session)).into_response(),
        None => guild_not_found(&guild_id, uri.path()),
    }
}

/// POST /v1/sessions/{id}/tracks
pub async fn add_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<AddTrackRequest>,
) -> Response {
    let query = body.query.trim();
    if query.is_empty() {
        return ErrorResponse::bad_request("query must not be empty", uri.path()).into_response();
    }
    let Some(player) = state.registry.player(&SessionId::from(id.as_str())) else {
        return session_not_found(&id, uri.path());
    };

    match player.add_track(query, &body.requested_by).await {
        Ok(tracks) => Json(AddTrackResponse { tracks }).into_response(),
        Err(e) => player_error(&e, uri.path()).into_response(),
    }
}

/// POST /v1/sessions/{id}/skip
pub async fn skip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    match state.registry.player(&SessionId::from(id.as_str())) {
        Some(player) => Json(SkipResponse {
            skipped: player.skip(),
        })
        .into_response(),
        None => session_not_found(&id, uri.path()),
    }
}

/// PUT /v1/guilds/{guild_id}/presence
///
/// `alone: true` arms the alone timer, `false` disarms it.
pub async fn update_presence(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<PresenceRequest>,
) -> Response {
    let Some(session) = state.registry.get_by_guild(&GuildId::from(guild_id.as_str())) else {
        return guild_not_found(&guild_id, uri.path());
    };

    if body.alone {
        state
            .registry
            .start_alone_timeout(&session.id, state.config.session.alone_timeout());
    } else {
        state.registry.cancel_alone_timeout(&session.id);
    }
    Json(PresenceResponse {
        alone_timer: session.has_alone_timer(),
    })
    .into_response()
}

/// POST /v1/guilds/{guild_id}/voice-disconnect
pub async fn voice_disconnect(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let Some(session) = state.registry.get_by_guild(&GuildId::from(guild_id.as_str())) else {
        return guild_not_found(&guild_id, uri.path());
    };
    state
        .registry
        .destroy_session(&session.id, CloseReason::VoiceDisconnected);
    StatusCode::NO_CONTENT.into_response()
}
