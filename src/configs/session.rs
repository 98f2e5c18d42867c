use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Hard lifetime of a session.
    pub ttl_secs: u64,
    /// How long the bot may sit alone in a channel before the session ends.
    pub alone_timeout_secs: u64,
    /// How often expired sessions are collected.
    pub sweep_interval_secs: u64,
    /// How long a dropped voice connection may take to come back.
    pub voice_reconnect_window_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            alone_timeout_secs: 5 * 60,
            sweep_interval_secs: 60,
            voice_reconnect_window_ms: 5_000,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn alone_timeout(&self) -> Duration {
        Duration::from_secs(self.alone_timeout_secs)
    }

    pub fn voice_reconnect_window(&self) -> Duration {
        Duration::from_millis(self.voice_reconnect_window_ms)
    }
}
