use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;

use crate::common::types::{ChannelId, GuildId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("voice connection is disconnected")]
    Disconnected,
    #[error("voice i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for VoiceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Connection lifecycle as observed by the session watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStatus {
    Connecting,
    Signalling,
    Ready,
    Disconnected,
    Destroyed,
}

impl VoiceStatus {
    /// States from which the connection is expected to come back on its own.
    pub fn is_recovering(self) -> bool {
        matches!(self, Self::Connecting | Self::Signalling | Self::Ready)
    }
}

/// Sink for 20 ms frames of 48 kHz stereo s16le PCM.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    async fn send_pcm(&self, frame: Bytes) -> Result<(), VoiceError>;

    fn status(&self) -> watch::Receiver<VoiceStatus>;

    /// Releases the connection. Idempotent.
    fn disconnect(&self);
}

/// Opens voice connections for new sessions.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: &GuildId,
        channel_id: &ChannelId,
    ) -> Result<std::sync::Arc<dyn VoiceConnection>, VoiceError>;
}
