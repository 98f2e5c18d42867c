use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use super::{
    middleware::{add_response_headers, check_auth},
    routes::{info, sessions},
    state::AppState,
    websocket_server::websocket_handler,
};

const API_V1: &str = "/v1";

/// REST routes for the chat-command layer. All of them require the
/// configured password.
pub fn rest_router(state: Arc<AppState>) -> Router {
    let v1_routes = Router::new()
        .route("/info", get(info::get_info))
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/{session_id}",
            get(sessions::get_session).delete(sessions::stop_session),
        )
        .route("/sessions/{session_id}/tracks", post(sessions::add_track))
        .route("/sessions/{session_id}/skip", post(sessions::skip))
        .route("/guilds/{guild_id}/session", get(sessions::get_guild_session))
        .route("/guilds/{guild_id}/presence", put(sessions::update_presence))
        .route(
            "/guilds/{guild_id}/voice-disconnect",
            post(sessions::voice_disconnect),
        );

    Router::new()
        .nest(API_V1, v1_routes)
        .route("/version", get(info::get_version))
        .layer(middleware::from_fn_with_state(state.clone(), check_auth))
        .layer(middleware::from_fn(add_response_headers))
        .with_state(state)
}

/// The full application: REST routes plus the dashboard gateway on `/ws`,
/// which is admitted by session id instead of the password.
pub fn router(state: Arc<AppState>) -> Router {
    let gateway = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state.clone());

    Router::new()
        .merge(gateway)
        .merge(rest_router(state))
        .layer(TraceLayer::new_for_http())
}
