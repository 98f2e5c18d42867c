use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    /// Lifetime of a resolved direct-media URL.
    pub url_cache_ttl_secs: u64,
    /// Upper bound for a single resolver invocation.
    pub resolve_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            url_cache_ttl_secs: 300,
            resolve_timeout_secs: 20,
        }
    }
}

impl PipelineConfig {
    pub fn url_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.url_cache_ttl_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}
