use std::sync::Arc;

use axum::{Json, extract::State};

use crate::{
    protocol::info::{GitInfo, Info, build_time},
    transport::state::AppState,
};

/// GET /v1/info
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<Info> {
    Json(Info {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git: GitInfo::from_build_env(),
        build_time: build_time(),
        uptime: state.started_at.elapsed().as_millis() as u64,
        sessions: state.registry.len(),
        connected_clients: state.hub.total_clients(),
    })
}

/// GET /version
pub async fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
