use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PlayerConfig {
    pub position_interval_ms: u64,
    /// Maximum number of entries taken from one playlist reference.
    pub playlist_limit: usize,
    pub default_volume: u8,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: 1_000,
            playlist_limit: 50,
            default_volume: 100,
        }
    }
}

impl PlayerConfig {
    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms.max(100))
    }
}
