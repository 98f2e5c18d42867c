use std::sync::Arc;

use tokio::time::Instant;

use super::hub::ClientHub;
use crate::{configs::Config, lyrics::LyricsProvider, session::SessionRegistry, sources::SearchProvider};

/// Top-level application state shared by every route.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub hub: Arc<ClientHub>,
    pub search: Arc<dyn SearchProvider>,
    pub lyrics: Arc<dyn LyricsProvider>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<SessionRegistry>,
        search: Arc<dyn SearchProvider>,
        lyrics: Arc<dyn LyricsProvider>,
    ) -> Arc<Self> {
        let hub = Arc::new(ClientHub::new(config.gateway.outbound_backlog));
        Arc::new(Self {
            config,
            registry,
            hub,
            search,
            lyrics,
            started_at: Instant::now(),
        })
    }
}
