use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LyricsConfig {
    /// Providers tried in order; the first non-empty answer wins.
    pub providers: Vec<String>,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                "lyricsovh".to_string(),
                "lyrist".to_string(),
                "lrclib".to_string(),
            ],
            timeout_secs: 8,
            cache_ttl_secs: 60 * 60,
        }
    }
}

impl LyricsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub timeout_secs: u64,
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            default_limit: 20,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
