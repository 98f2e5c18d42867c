use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    net::UdpSocket,
    sync::{Mutex, watch},
    time::{Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::connection::{VoiceConnection, VoiceConnector, VoiceError, VoiceStatus};
use crate::{
    audio::constants::FRAME_DURATION_MS,
    common::types::{ChannelId, GuildId},
};

/// Forwards raw PCM frames over UDP to an external voice sidecar, paced to
/// real time. Each datagram is the guild id length-prefixed, then one frame.
pub struct UdpBridge {
    guild_id: GuildId,
    socket: UdpSocket,
    pacer: Mutex<Interval>,
    status: watch::Sender<VoiceStatus>,
}

impl UdpBridge {
    pub async fn connect(guild_id: GuildId, target: SocketAddr) -> Result<Self, VoiceError> {
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(target).await?;

        let mut pacer = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));
        // Catch up after short stalls so no gap is audible.
        pacer.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let (status, _) = watch::channel(VoiceStatus::Ready);
        info!("Voice bridge ready: guild={} target={}", guild_id, target);

        Ok(Self {
            guild_id,
            socket,
            pacer: Mutex::new(pacer),
            status,
        })
    }

    fn datagram(&self, frame: &[u8]) -> Vec<u8> {
        let guild = self.guild_id.as_bytes();
        let mut out = Vec::with_capacity(1 + guild.len() + frame.len());
        out.push(guild.len().min(u8::MAX as usize) as u8);
        out.extend_from_slice(&guild[..guild.len().min(u8::MAX as usize)]);
        out.extend_from_slice(frame);
        out
    }
}

#[async_trait]
impl VoiceConnection for UdpBridge {
    async fn send_pcm(&self, frame: Bytes) -> Result<(), VoiceError> {
        if *self.status.borrow() == VoiceStatus::Destroyed {
            return Err(VoiceError::Disconnected);
        }

        self.pacer.lock().await.tick().await;

        match self.socket.send(&self.datagram(&frame)).await {
            Ok(_) => {
                self.status.send_if_modified(|s| {
                    let changed = *s == VoiceStatus::Disconnected;
                    if changed {
                        *s = VoiceStatus::Ready;
                    }
                    changed
                });
                Ok(())
            }
            Err(e) => {
                warn!("Voice bridge send failed: guild={} err={}", self.guild_id, e);
                self.status.send_if_modified(|s| {
                    let changed = *s == VoiceStatus::Ready;
                    if changed {
                        *s = VoiceStatus::Disconnected;
                    }
                    changed
                });
                Err(e.into())
            }
        }
    }

    fn status(&self) -> watch::Receiver<VoiceStatus> {
        self.status.subscribe()
    }

    fn disconnect(&self) {
        if self.status.send_replace(VoiceStatus::Destroyed) != VoiceStatus::Destroyed {
            debug!("Voice bridge closed: guild={}", self.guild_id);
        }
    }
}

pub struct UdpBridgeConnector {
    target: SocketAddr,
}

impl UdpBridgeConnector {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }
}

#[async_trait]
impl VoiceConnector for UdpBridgeConnector {
    async fn connect(
        &self,
        guild_id: &GuildId,
        _channel_id: &ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        let bridge = UdpBridge::connect(guild_id.clone(), self.target).await?;
        Ok(Arc::new(bridge))
    }
}
