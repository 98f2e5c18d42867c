use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    common::types::{ChannelId, GuildId, SessionId},
    player::{Player, PlayerObserver},
    protocol::models::SessionSnapshot,
};

/// Guild and channel names shown on the dashboard.
#[derive(Debug, Clone, Default)]
pub struct SessionLabels {
    pub guild_name: String,
    pub channel_name: String,
}

/// One guild's playback context.
pub struct Session {
    pub id: SessionId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub labels: SessionLabels,
    /// Epoch milliseconds.
    pub created_at: u64,
    /// Epoch milliseconds.
    pub expires_at: u64,
    pub(super) deadline: Instant,
    pub(super) player: Arc<Player>,
    pub(super) observer: OnceLock<Arc<dyn PlayerObserver>>,
    pub(super) alone_timer: Mutex<Option<CancellationToken>>,
    /// Cancels the voice watchdog.
    pub(super) watchdog: CancellationToken,
}

impl Session {
    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Wires the session's single event subscriber. The first call installs
    /// the observer built by `make`; later calls return it unchanged.
    pub fn attach_observer(
        &self,
        make: impl FnOnce() -> Arc<dyn PlayerObserver>,
    ) -> Arc<dyn PlayerObserver> {
        let mut installed = false;
        let observer = self.observer.get_or_init(|| {
            installed = true;
            make()
        });
        if installed {
            self.player.set_observer(observer.clone());
        }
        observer.clone()
    }

    pub fn observer(&self) -> Option<&Arc<dyn PlayerObserver>> {
        self.observer.get()
    }

    pub fn has_alone_timer(&self) -> bool {
        self.alone_timer.lock().is_some()
    }

    pub(super) fn cancel_alone_timer(&self) -> bool {
        match self.alone_timer.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            guild_id: self.guild_id.clone(),
            guild_name: self.labels.guild_name.clone(),
            channel_id: self.channel_id.clone(),
            channel_name: self.labels.channel_name.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            queue: self.player.snapshot(),
        }
    }
}
