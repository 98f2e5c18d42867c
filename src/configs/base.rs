use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub player: PlayerConfig,
    pub pipeline: PipelineConfig,
    pub gateway: GatewayConfig,
    pub search: SearchConfig,
    pub lyrics: LyricsConfig,
    pub voice: VoiceConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads `config.toml`, falling back to `config.default.toml` and then
    /// to built-in defaults when neither file exists.
    pub fn load() -> AnyResult<Self> {
        let config_path = ["config.toml", "config.default.toml"]
            .into_iter()
            .find(|p| std::path::Path::new(p).exists());

        let Some(config_path) = config_path else {
            println!("No config.toml found, using built-in defaults");
            return Ok(Self::default());
        };

        println!("Loading configuration from: {config_path}");
        let config_str = std::fs::read_to_string(config_path)?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(source: &str) -> AnyResult<Self> {
        let config: Config = toml::from_str(source)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.session.ttl_secs, 24 * 60 * 60);
        assert_eq!(config.gateway.max_clients_per_session, 10);
        assert_eq!(config.player.playlist_limit, 50);
        assert_eq!(config.pipeline.url_cache_ttl_secs, 300);
    }

    #[test]
    fn shipped_default_file_matches_builtins() {
        let shipped = Config::from_toml(include_str!("../../config.default.toml")).unwrap();
        let builtin = Config::default();
        assert_eq!(shipped.server.port, builtin.server.port);
        assert_eq!(shipped.session.ttl_secs, builtin.session.ttl_secs);
        assert_eq!(shipped.gateway.outbound_backlog, builtin.gateway.outbound_backlog);
        assert_eq!(shipped.lyrics.providers, builtin.lyrics.providers);
        assert_eq!(shipped.voice.bridge_addr, builtin.voice.bridge_addr);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 4000
            password = "hunter2"

            [gateway]
            max_clients_per_session = 3

            [lyrics]
            providers = ["lrclib"]
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.gateway.max_clients_per_session, 3);
        assert_eq!(config.gateway.ping_interval_secs, 30);
        assert_eq!(config.lyrics.providers, vec!["lrclib".to_string()]);
    }
}
