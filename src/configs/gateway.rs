use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub max_clients_per_session: usize,
    pub ping_interval_secs: u64,
    /// A connection silent for longer than this is closed.
    pub client_timeout_secs: u64,
    pub max_message_bytes: usize,
    /// Position ticks are dropped for a client whose outbound queue is
    /// deeper than this.
    pub outbound_backlog: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_clients_per_session: 10,
            ping_interval_secs: 30,
            client_timeout_secs: 60,
            max_message_bytes: 1024 * 1024,
            outbound_backlog: 64,
        }
    }
}

impl GatewayConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs.max(1))
    }
}
