use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret expected in the `Authorization` header of REST calls.
    pub password: String,
    /// Public dashboard origin; share links are `{dashboard_url}/session/{id}`.
    pub dashboard_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            password: "youshallnotpass".to_string(),
            dashboard_url: "http://localhost:3000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn dashboard_link(&self, session_id: &str) -> String {
        format!("{}/session/{}", self.dashboard_url.trim_end_matches('/'), session_id)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct VoiceConfig {
    /// UDP address receiving 20 ms PCM frames from the bundled voice bridge.
    pub bridge_addr: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            bridge_addr: "127.0.0.1:5004".to_string(),
        }
    }
}
