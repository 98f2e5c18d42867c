use std::{
    sync::{Arc, OnceLock, Weak},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    CloseReason,
    context::{Session, SessionLabels},
};
use crate::{
    audio::AudioBackend,
    common::types::{ChannelId, GuildId, SessionId, now_ms},
    configs::{PlayerConfig, SessionConfig},
    player::Player,
    sources::TrackResolver,
    voice::{VoiceConnector, VoiceError, VoiceStatus},
};

/// Result of [`SessionRegistry::create_session`].
pub struct Created {
    pub session: Arc<Session>,
    /// False when the guild already had a live session.
    pub is_new: bool,
}

/// All live sessions, indexed by public id and by guild. A guild has at most
/// one session.
pub struct SessionRegistry {
    me: Weak<SessionRegistry>,
    sessions: DashMap<SessionId, Arc<Session>>,
    by_guild: DashMap<GuildId, SessionId>,
    connector: Arc<dyn VoiceConnector>,
    resolver: Arc<dyn TrackResolver>,
    backend: AudioBackend,
    session_config: SessionConfig,
    player_config: PlayerConfig,
}

impl SessionRegistry {
    pub fn new(
        connector: Arc<dyn VoiceConnector>,
        resolver: Arc<dyn TrackResolver>,
        backend: AudioBackend,
        session_config: SessionConfig,
        player_config: PlayerConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            sessions: DashMap::new(),
            by_guild: DashMap::new(),
            connector,
            resolver,
            backend,
            session_config,
            player_config,
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns the guild's live session, or connects voice and creates one.
    pub async fn create_session(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        labels: SessionLabels,
    ) -> Result<Created, VoiceError> {
        if let Some(session) = self.get_by_guild(&guild_id) {
            return Ok(Created {
                session,
                is_new: false,
            });
        }

        let voice = self.connector.connect(&guild_id, &channel_id).await?;

        let id = self.allocate_id();
        let player = Player::new(
            id.clone(),
            self.backend.clone(),
            self.resolver.clone(),
            voice.clone(),
            &self.player_config,
        );

        let ttl = self.session_config.ttl();
        let created_at = now_ms();
        let session = Arc::new(Session {
            id: id.clone(),
            guild_id: guild_id.clone(),
            channel_id,
            labels,
            created_at,
            expires_at: created_at + ttl.as_millis() as u64,
            deadline: Instant::now() + ttl,
            player,
            observer: OnceLock::new(),
            alone_timer: Mutex::new(None),
            watchdog: CancellationToken::new(),
        });

        // A concurrent create for the same guild may have won while voice was
        // connecting.
        let replaced = match self.by_guild.entry(guild_id.clone()) {
            Entry::Occupied(mut slot) => {
                let live = self
                    .sessions
                    .get(slot.get())
                    .map(|s| s.value().clone())
                    .filter(|s| !s.is_expired());
                if let Some(existing) = live {
                    drop(slot);
                    session.player.destroy();
                    return Ok(Created {
                        session: existing,
                        is_new: false,
                    });
                }
                Some(slot.insert(id.clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
                None
            }
        };
        self.sessions.insert(id.clone(), session.clone());

        if let Some(old) = replaced {
            self.destroy_session(&old, CloseReason::Expired);
        }

        self.spawn_voice_watchdog(&session, voice.status());
        info!(
            "Session created: id={} guild={} channel={}",
            id, guild_id, session.channel_id
        );
        Ok(Created {
            session,
            is_new: true,
        })
    }

    fn allocate_id(&self) -> SessionId {
        loop {
            let id = SessionId::generate();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn get_by_guild(&self, guild_id: &GuildId) -> Option<Arc<Session>> {
        let id = self.by_guild.get(guild_id)?.value().clone();
        self.get_by_id(&id)
    }

    /// Looks up a session. An expired session is absent even before the
    /// sweeper collects it.
    pub fn get_by_id(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.sessions.get(id)?.value().clone();
        if session.is_expired() {
            debug!("Session {} is past its ttl", id);
            return None;
        }
        Some(session)
    }

    pub fn player(&self, id: &SessionId) -> Option<Arc<Player>> {
        self.get_by_id(id).map(|s| s.player.clone())
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Tears a session down and tells its subscriber why. Returns false if
    /// the session was already gone.
    pub fn destroy_session(&self, id: &SessionId, reason: CloseReason) -> bool {
        let Some((_, session)) = self.sessions.remove(id) else {
            return false;
        };
        self.by_guild.remove_if(&session.guild_id, |_, v| v == id);

        session.cancel_alone_timer();
        session.watchdog.cancel();
        session.player.destroy();
        if let Some(observer) = session.observer() {
            observer.on_session_closed(reason.as_str());
        }

        info!(
            "Session destroyed: id={} guild={} reason={}",
            id,
            session.guild_id,
            reason.as_str()
        );
        true
    }

    pub fn destroy_all(&self, reason: CloseReason) -> usize {
        self.session_ids()
            .iter()
            .filter(|id| self.destroy_session(id, reason))
            .count()
    }

    /// Arms the session's one-shot alone timer, replacing any armed one. On
    /// fire the session is torn down with [`CloseReason::Alone`].
    pub fn start_alone_timeout(&self, id: &SessionId, duration: Duration) -> bool {
        let Some(session) = self.get_by_id(id) else {
            return false;
        };

        let token = CancellationToken::new();
        if let Some(previous) = session.alone_timer.lock().replace(token.clone()) {
            previous.cancel();
        }

        let registry = self.me.clone();
        let session = Arc::downgrade(&session);
        let timer_id = id.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(duration) => {}
            }

            // A re-arm may have raced the sleep.
            if let Some(session) = session.upgrade() {
                let mut slot = session.alone_timer.lock();
                if token.is_cancelled() {
                    return;
                }
                slot.take();
            }
            if let Some(registry) = registry.upgrade() {
                info!("Alone timeout fired: session={}", timer_id);
                registry.destroy_session(&timer_id, CloseReason::Alone);
            }
        });
        debug!("Alone timer armed: session={} after={:?}", id, duration);
        true
    }

    pub fn cancel_alone_timeout(&self, id: &SessionId) -> bool {
        let cancelled = self
            .sessions
            .get(id)
            .is_some_and(|s| s.value().cancel_alone_timer());
        if cancelled {
            debug!("Alone timer cancelled: session={}", id);
        }
        cancelled
    }

    /// Destroys sessions whose ttl has elapsed.
    pub fn sweep_expired(&self) -> usize {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|e| e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();
        expired
            .iter()
            .filter(|id| self.destroy_session(id, CloseReason::Expired))
            .count()
    }

    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let registry = self.me.clone();
        let period = Duration::from_secs(self.session_config.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticks.tick() => {}
                }
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let swept = registry.sweep_expired();
                if swept > 0 {
                    info!("Swept {} expired session(s)", swept);
                }
            }
        })
    }

    /// Watches the voice connection. A drop that does not recover within
    /// the reconnect window ends the session.
    fn spawn_voice_watchdog(&self, session: &Session, mut status: watch::Receiver<VoiceStatus>) {
        let registry = self.me.clone();
        let id = session.id.clone();
        let token = session.watchdog.clone();
        let window = self.session_config.voice_reconnect_window();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    changed = status.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }

                let current = *status.borrow_and_update();
                let lost = match current {
                    VoiceStatus::Destroyed => true,
                    VoiceStatus::Disconnected => {
                        warn!("Voice connection dropped: session={}", id);
                        let recovered = async {
                            status.wait_for(|s| s.is_recovering()).await.is_ok()
                        };
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return,
                            res = tokio::time::timeout(window, recovered) => !matches!(res, Ok(true)),
                        }
                    }
                    _ => false,
                };

                if lost {
                    if let Some(registry) = registry.upgrade() {
                        registry.destroy_session(&id, CloseReason::VoiceDisconnected);
                    }
                    return;
                }
                debug!("Voice status for session {}: {:?}", id, current);
            }
        });
    }
}
