use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{observer::PlayerObserver, queue::QueueState, ticker};
use crate::{
    audio::{AudioBackend, AudioPipeline, EndCallback, StartOutcome, StreamEnd, StreamGate, Ticket},
    common::{
        errors::PlayerError,
        types::{SessionId, TrackId},
    },
    configs::PlayerConfig,
    protocol::models::{RepeatMode, Track},
    sources::TrackResolver,
    voice::VoiceConnection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Idle,
    Playing,
    Paused,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartKind {
    Fresh,
    Seek,
}

struct Inner {
    queue: QueueState,
    /// Position is `now - anchor` while playing.
    anchor: Instant,
    /// Frozen position while paused.
    paused_at: Duration,
    ticker: Option<CancellationToken>,
    /// Consecutive tracks that failed to produce audio.
    failed_run: usize,
    destroyed: bool,
}

impl Inner {
    fn elapsed(&self) -> Duration {
        if self.queue.is_paused {
            self.paused_at
        } else if self.queue.is_playing {
            self.anchor.elapsed()
        } else {
            Duration::ZERO
        }
    }

    fn position_secs(&self) -> u64 {
        let duration = self.queue.current().map(|t| t.duration).unwrap_or(0);
        let secs = self.elapsed().as_secs();
        if duration > 0 { secs.min(duration) } else { secs }
    }

    fn set_anchor(&mut self, at: Duration) {
        let now = Instant::now();
        self.anchor = now.checked_sub(at).unwrap_or(now);
        self.paused_at = at;
    }

    fn stop_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }

    fn status(&self) -> PlayerStatus {
        if self.destroyed {
            PlayerStatus::Destroyed
        } else if self.queue.is_paused {
            PlayerStatus::Paused
        } else if self.queue.is_playing {
            PlayerStatus::Playing
        } else {
            PlayerStatus::Idle
        }
    }
}

/// The playback state machine of one session.
///
/// All state lives behind one lock that is never held across an await, so
/// operations on one player are serialized while resolution and stream
/// start-up run concurrently. A newer stream start always supersedes an
/// older one still in flight.
pub struct Player {
    session_id: SessionId,
    me: Weak<Player>,
    inner: Mutex<Inner>,
    pipeline: AudioPipeline,
    resolver: Arc<dyn TrackResolver>,
    voice: Arc<dyn VoiceConnection>,
    observer: RwLock<Option<Arc<dyn PlayerObserver>>>,
    position_interval: Duration,
    playlist_limit: usize,
}

impl Player {
    pub fn new(
        session_id: SessionId,
        backend: AudioBackend,
        resolver: Arc<dyn TrackResolver>,
        voice: Arc<dyn VoiceConnection>,
        config: &PlayerConfig,
    ) -> Arc<Self> {
        let volume = config.default_volume.min(100);
        Arc::new_cyclic(|me| Self {
            session_id,
            me: me.clone(),
            inner: Mutex::new(Inner {
                queue: QueueState::new(volume),
                anchor: Instant::now(),
                paused_at: Duration::ZERO,
                ticker: None,
                failed_run: 0,
                destroyed: false,
            }),
            pipeline: AudioPipeline::new(backend, volume),
            resolver,
            voice,
            observer: RwLock::new(None),
            position_interval: config.position_interval(),
            playlist_limit: config.playlist_limit.max(1),
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub(crate) fn set_observer(&self, observer: Arc<dyn PlayerObserver>) {
        *self.observer.write() = Some(observer);
    }

    fn emit(&self, f: impl FnOnce(&dyn PlayerObserver)) {
        if let Some(observer) = self.observer.read().as_ref() {
            f(observer.as_ref());
        }
    }

    fn emit_queue(&self, inner: &mut Inner) {
        inner.queue.position = inner.position_secs();
        self.emit(|o| o.on_queue_changed(&inner.queue));
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Copy of the queue with the live position filled in.
    pub fn snapshot(&self) -> QueueState {
        let inner = self.inner.lock();
        let mut queue = inner.queue.clone();
        queue.position = inner.position_secs();
        queue
    }

    pub fn current_track(&self) -> Option<Track> {
        self.inner.lock().queue.current().cloned()
    }

    pub fn position(&self) -> u64 {
        self.inner.lock().position_secs()
    }

    pub fn status(&self) -> PlayerStatus {
        self.inner.lock().status()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    // ── Stream lifecycle ─────────────────────────────────────────────────────

    /// Supersedes the current stream and starts the cursor track at `at`.
    fn start_locked(&self, inner: &mut Inner, at: Duration, kind: StartKind) {
        let Some(track) = inner.queue.current().cloned() else {
            self.finish_locked(inner, None);
            return;
        };

        let ticket = self.pipeline.begin();
        inner.stop_ticker();
        inner.queue.is_playing = true;
        inner.queue.is_paused = false;
        inner.set_anchor(at);
        self.emit_queue(inner);

        let Some(player) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            player.run_start(ticket, track, at, kind).await;
        });
    }

    async fn run_start(self: Arc<Self>, ticket: Ticket, track: Track, at: Duration, kind: StartKind) {
        let me = Arc::downgrade(&self);
        let on_end: EndCallback = Box::new(move |end| {
            if let Some(player) = me.upgrade() {
                player.on_stream_end(ticket, end);
            }
        });

        let outcome = self
            .pipeline
            .start_stream(ticket, &track.url, at.as_secs_f64(), self.voice.clone(), on_end)
            .await;

        match outcome {
            Ok(StartOutcome::Started(gate)) => self.on_stream_started(ticket, &track, at, kind, gate),
            Ok(StartOutcome::Superseded) => {}
            Err(e) => {
                error!(
                    "Failed to start stream: session={} track={} err={}",
                    self.session_id, track.title, e
                );
                self.on_stream_end(ticket, StreamEnd::Failed(e.to_string()));
            }
        }
    }

    fn on_stream_started(&self, ticket: Ticket, track: &Track, at: Duration, kind: StartKind, gate: StreamGate) {
        let mut inner = self.inner.lock();
        if inner.destroyed || !self.pipeline.is_current(ticket) {
            return;
        }

        if inner.queue.is_paused {
            self.pipeline.set_paused(true);
        } else {
            inner.set_anchor(at);
            self.start_ticker(&mut inner);
        }

        if kind == StartKind::Fresh {
            info!("Playback started: session={} track={}", self.session_id, track.title);
            self.emit(|o| o.on_track_started(track));
        }
        gate.open();
    }

    fn on_stream_end(&self, ticket: Ticket, end: StreamEnd) {
        let mut inner = self.inner.lock();
        if inner.destroyed || !self.pipeline.is_current(ticket) {
            return;
        }

        match &end {
            StreamEnd::Failed(reason) => {
                inner.failed_run += 1;
                warn!("Track unplayable: session={} reason={}", self.session_id, reason);
            }
            StreamEnd::Finished | StreamEnd::Stopped => inner.failed_run = 0,
        }
        debug!("Stream ended: session={} end={:?}", self.session_id, end);
        self.track_end_locked(&mut inner);
    }

    /// Picks what plays after the current track, for natural ends, skips
    /// and failures alike.
    fn track_end_locked(&self, inner: &mut Inner) {
        inner.stop_ticker();
        let ended = inner.queue.current().cloned();
        inner.queue.position = 0;
        inner.paused_at = Duration::ZERO;

        let len = inner.queue.len();
        let cursor = inner.queue.current_index;
        let next = if len == 0 || inner.failed_run >= len {
            None
        } else if inner.queue.repeat_mode == RepeatMode::One {
            Some(cursor)
        } else if inner.queue.has_next() {
            Some(cursor + 1)
        } else if inner.queue.repeat_mode == RepeatMode::All {
            Some(0)
        } else {
            None
        };

        match next {
            Some(index) => {
                if let Some(track) = &ended {
                    self.emit(|o| o.on_track_ended(track, false));
                }
                inner.queue.current_index = index;
                self.start_locked(inner, Duration::ZERO, StartKind::Fresh);
            }
            None => {
                if inner.failed_run > 0 && len > 0 {
                    warn!(
                        "Every queued track failed to play, going idle: session={}",
                        self.session_id
                    );
                }
                self.finish_locked(inner, ended.as_ref());
            }
        }
    }

    fn finish_locked(&self, inner: &mut Inner, ended: Option<&Track>) {
        self.pipeline.stop();
        inner.stop_ticker();
        inner.failed_run = 0;
        inner.queue.is_playing = false;
        inner.queue.is_paused = false;
        inner.queue.position = 0;
        inner.paused_at = Duration::ZERO;

        if let Some(track) = ended {
            self.emit(|o| o.on_track_ended(track, true));
        }
        self.emit_queue(inner);
        info!("Queue finished: session={}", self.session_id);
    }

    fn start_ticker(&self, inner: &mut Inner) {
        inner.stop_ticker();
        let token = CancellationToken::new();
        inner.ticker = Some(token.clone());
        ticker::spawn(self.me.clone(), self.position_interval, token);
    }

    /// Called by the ticker. Returns false once the ticker should stop.
    pub(super) fn publish_position(&self, token: &CancellationToken) -> bool {
        let mut inner = self.inner.lock();
        if token.is_cancelled() || inner.destroyed {
            return false;
        }
        let Some(duration) = inner.queue.current().map(|t| t.duration) else {
            return false;
        };

        let position = inner.position_secs();
        inner.queue.position = position;
        self.emit(|o| o.on_position_tick(position, duration));
        true
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// Resolves `query` (a playlist expands to at most `playlist_limit`
    /// tracks) and appends the result. Playback starts when the queue was
    /// empty and idle, or when a playlist lands on an idle player.
    pub async fn add_track(&self, query: &str, requested_by: &str) -> Result<Vec<Track>, PlayerError> {
        if self.is_destroyed() {
            return Err(PlayerError::Destroyed);
        }

        let mut tracks = self
            .resolver
            .resolve(query, requested_by, self.playlist_limit)
            .await
            .map_err(|e| {
                warn!("Could not resolve query `{}`: {}", query, e);
                PlayerError::ResolutionFailed(query.to_owned())
            })?;
        tracks.truncate(self.playlist_limit);
        if tracks.is_empty() {
            return Err(PlayerError::ResolutionFailed(query.to_owned()));
        }

        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(PlayerError::Destroyed);
        }

        let was_empty = inner.queue.is_empty();
        let idle = !inner.queue.is_playing;
        let first_new = inner.queue.len();
        for track in &tracks {
            inner.queue.append(track.clone());
        }
        info!(
            "Queued {} track(s): session={} first={}",
            tracks.len(),
            self.session_id,
            tracks[0].title
        );

        if idle && (was_empty || tracks.len() > 1) {
            inner.queue.current_index = first_new;
            inner.failed_run = 0;
            self.start_locked(&mut inner, Duration::ZERO, StartKind::Fresh);
        } else {
            self.emit_queue(&mut inner);
        }
        Ok(tracks)
    }

    /// Starts `track_id`, or restarts the cursor track when `None`.
    pub fn play(&self, track_id: Option<&TrackId>) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(PlayerError::Destroyed);
        }

        if let Some(id) = track_id {
            let index = inner
                .queue
                .index_of(id)
                .ok_or_else(|| PlayerError::TrackNotFound(id.to_string()))?;
            inner.queue.current_index = index;
        }
        if inner.queue.is_empty() {
            return Err(PlayerError::TrackNotFound("queue is empty".into()));
        }

        inner.failed_run = 0;
        self.start_locked(&mut inner, Duration::ZERO, StartKind::Fresh);
        Ok(())
    }

    pub fn pause(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.destroyed || !inner.queue.is_playing || inner.queue.is_paused {
            return false;
        }

        let at = inner.anchor.elapsed();
        inner.paused_at = at;
        inner.queue.is_paused = true;
        inner.stop_ticker();
        self.pipeline.set_paused(true);
        self.emit_queue(&mut inner);
        true
    }

    pub fn resume(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.destroyed || !inner.queue.is_paused {
            return false;
        }

        let at = inner.paused_at;
        inner.set_anchor(at);
        inner.queue.is_paused = false;
        self.pipeline.set_paused(false);
        if self.pipeline.has_active_stream() {
            self.start_ticker(&mut inner);
        }
        self.emit_queue(&mut inner);
        true
    }

    /// Ends the current track through the regular track-end transition.
    pub fn skip(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.destroyed || inner.queue.is_empty() || !inner.queue.is_playing {
            return false;
        }

        // The stream's end callback performs the transition.
        if self.pipeline.skip() {
            return true;
        }

        // Still resolving: nothing to cancel, transition directly.
        inner.failed_run = 0;
        self.track_end_locked(&mut inner);
        true
    }

    pub fn previous(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.destroyed || inner.queue.is_empty() {
            return false;
        }

        let index = if inner.queue.current_index > 0 {
            inner.queue.current_index - 1
        } else if inner.queue.repeat_mode == RepeatMode::All {
            inner.queue.len() - 1
        } else {
            return false;
        };

        inner.queue.current_index = index;
        inner.failed_run = 0;
        self.start_locked(&mut inner, Duration::ZERO, StartKind::Fresh);
        true
    }

    /// Restarts the current track at `position` seconds.
    pub fn seek(&self, position: f64) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(PlayerError::Destroyed);
        }
        let Some(duration) = inner.queue.current().map(|t| t.duration) else {
            return Err(PlayerError::TrackNotFound("no current track".into()));
        };
        if !position.is_finite() || position < 0.0 || position > duration as f64 {
            return Err(PlayerError::InvalidRange(format!(
                "seek to {position}s in a {duration}s track"
            )));
        }

        self.start_locked(&mut inner, Duration::from_secs_f64(position), StartKind::Seek);
        Ok(())
    }

    /// Clamps to [0, 100] and applies the gain to the live stream.
    pub fn set_volume(&self, volume: f64) -> u8 {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return inner.queue.volume;
        }

        let volume = if volume.is_finite() {
            volume.round().clamp(0.0, 100.0) as u8
        } else {
            inner.queue.volume
        };
        inner.queue.volume = volume;
        self.pipeline.set_volume(volume);
        self.emit_queue(&mut inner);
        volume
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return;
        }
        inner.queue.repeat_mode = mode;
        self.emit_queue(&mut inner);
    }

    /// Shuffles everything but the current track and toggles the shuffle flag.
    pub fn shuffle(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.destroyed || !inner.queue.shuffle_remaining(&mut rand::thread_rng()) {
            return false;
        }
        inner.queue.shuffle = !inner.queue.shuffle;
        self.emit_queue(&mut inner);
        true
    }

    pub fn remove_track(&self, track_id: &TrackId) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(PlayerError::Destroyed);
        }
        if inner.queue.index_of(track_id).is_none() {
            return Err(PlayerError::TrackNotFound(track_id.to_string()));
        }
        if !inner.queue.remove_by_id(track_id) {
            return Err(PlayerError::InvalidRange(
                "the playing track cannot be removed".into(),
            ));
        }
        self.emit_queue(&mut inner);
        Ok(())
    }

    pub fn reorder_queue(&self, from: usize, to: usize) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(PlayerError::Destroyed);
        }
        inner.queue.move_track(from, to)?;
        self.emit_queue(&mut inner);
        Ok(())
    }

    /// Stops ticking, kills the stream and releases the voice connection.
    /// Returns false if the player was already destroyed.
    pub fn destroy(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return false;
        }
        inner.destroyed = true;
        inner.stop_ticker();
        inner.queue.is_playing = false;
        inner.queue.is_paused = false;
        self.pipeline.stop();
        self.voice.disconnect();
        info!("Player destroyed: session={}", self.session_id);
        true
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.destroyed {
            inner.stop_ticker();
            self.voice.disconnect();
        }
    }
}
