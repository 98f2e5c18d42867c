use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    common::cache::{MemoryCache, TtlCache},
    configs::LyricsConfig,
    protocol::models::LyricsData,
};

pub mod clean;
pub mod lrclib;
pub mod lyricsovh;
pub mod lyrist;

use self::{
    clean::{clean_artist, clean_title, simplify_artist, simplify_title},
    lrclib::LrcLibProvider,
    lyricsovh::LyricsOvhProvider,
    lyrist::LyristProvider,
};

const USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; Legato/", env!("CARGO_PKG_VERSION"), ")");

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the provider can search with an empty artist.
    fn supports_title_only(&self) -> bool {
        false
    }

    async fn load_lyrics(&self, title: &str, artist: &str) -> Option<LyricsData>;
}

/// Tries providers in configured order, first with cleaned metadata, then
/// with simplified metadata, then title only. The first useful hit wins and
/// is cached.
pub struct LyricsManager {
    pub providers: Vec<Arc<dyn LyricsProvider>>,
    cache: MemoryCache<String, LyricsData>,
    timeout: Duration,
    cache_ttl: Duration,
}

impl LyricsManager {
    pub fn new(config: &LyricsConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .unwrap_or_default();

        let mut providers: Vec<Arc<dyn LyricsProvider>> = Vec::new();

        macro_rules! register_provider {
            ($key:expr, $name:literal, $ctor:expr) => {
                if $key == $name {
                    providers.push(Arc::new($ctor));
                    info!("Loaded lyrics provider: {}", $name);
                    continue;
                }
            };
        }

        for key in &config.providers {
            let key = key.to_ascii_lowercase();
            register_provider!(key, "lyricsovh", LyricsOvhProvider::new(client.clone()));
            register_provider!(key, "lyrist", LyristProvider::new(client.clone()));
            register_provider!(key, "lrclib", LrcLibProvider::new(client.clone()));
            warn!("Unknown lyrics provider `{}` ignored", key);
        }

        Self::with_providers(providers, config.timeout(), config.cache_ttl())
    }

    pub fn with_providers(
        providers: Vec<Arc<dyn LyricsProvider>>,
        timeout: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            providers,
            cache: MemoryCache::new(),
            timeout,
            cache_ttl,
        }
    }

    fn cache_key(title: &str, artist: &str) -> String {
        format!("{}-{}", title.to_lowercase(), artist.to_lowercase())
    }

    fn attempts(title: &str, artist: &str) -> Vec<(String, String)> {
        let cleaned = (clean_title(title), clean_artist(artist));
        let simplified = (simplify_title(&cleaned.0), simplify_artist(&cleaned.1));
        let title_only = (cleaned.0.clone(), String::new());

        let mut attempts = vec![cleaned];
        if simplified != attempts[0] {
            attempts.push(simplified);
        }
        if !attempts[0].1.is_empty() {
            attempts.push(title_only);
        }
        attempts
    }

    async fn try_provider(&self, provider: &Arc<dyn LyricsProvider>, title: &str, artist: &str) -> Option<LyricsData> {
        match tokio::time::timeout(self.timeout, provider.load_lyrics(title, artist)).await {
            Ok(found) => found,
            Err(_) => {
                debug!("Lyrics provider {} timed out", provider.name());
                None
            }
        }
    }
}

#[async_trait]
impl LyricsProvider for LyricsManager {
    fn name(&self) -> &'static str {
        "manager"
    }

    fn supports_title_only(&self) -> bool {
        true
    }

    async fn load_lyrics(&self, title: &str, artist: &str) -> Option<LyricsData> {
        let key = Self::cache_key(title, artist);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Lyrics cache hit: {}", key);
            return Some(hit);
        }

        for (t, a) in Self::attempts(title, artist) {
            if t.is_empty() {
                continue;
            }
            for provider in &self.providers {
                if a.is_empty() && !provider.supports_title_only() {
                    continue;
                }
                if let Some(found) = self.try_provider(provider, &t, &a).await {
                    info!("Lyrics found via {} for \"{}\" by \"{}\"", provider.name(), t, a);
                    self.cache.put(key, found.clone(), self.cache_ttl);
                    return Some(found);
                }
            }
        }

        debug!("Lyrics not found for \"{}\" by \"{}\"", title, artist);
        None
    }
}
