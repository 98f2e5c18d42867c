//! Fakes and fixtures shared by the integration tests.
//!
//! Nothing here spawns yt-dlp, ffmpeg or a real voice connection. Streams are
//! in-memory duplex pipes the test feeds or closes by hand.

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::{
    io::{AsyncWriteExt, DuplexStream},
    sync::watch,
};

use legato::{
    audio::{
        AudioBackend, PcmReader, PipelineError, StreamResolver, TranscodeProcess, Transcoder,
        constants::FRAME_BYTES,
    },
    common::{
        cache::MemoryCache,
        types::{ChannelId, GuildId, TrackId, now_ms},
    },
    configs::{Config, PlayerConfig, SessionConfig},
    lyrics::LyricsProvider,
    player::{Player, PlayerObserver, PlayerStatus, QueueState},
    protocol::models::{LyricsData, SearchResult, SearchSource, Track, TrackSource},
    session::{Session, SessionLabels, SessionRegistry},
    sources::{SearchProvider, SourceError, TrackResolver},
    transport::AppState,
    voice::{VoiceConnection, VoiceConnector, VoiceError, VoiceStatus},
};

pub const GUILD: &str = "100000000000000001";
pub const CHANNEL: &str = "200000000000000002";

/// Builds a track. `A@200` becomes title `A` lasting 200 s; without a
/// suffix the track lasts 180 s.
pub fn track(desc: &str, requested_by: &str) -> Track {
    let (title, duration) = match desc.rsplit_once('@') {
        Some((title, secs)) => (title, secs.parse().unwrap_or(180)),
        None => (desc, 180),
    };
    Track {
        id: TrackId::generate(),
        title: title.to_string(),
        artist: "Tester".to_string(),
        duration,
        thumbnail: String::new(),
        url: format!("fake://{title}"),
        source: TrackSource::Youtube,
        requested_by: requested_by.to_string(),
        requested_at: now_ms(),
    }
}

/// `missing…` fails, `playlist:N` and `broken-playlist:N` expand to N
/// tracks, anything else is one track.
pub struct FakeResolver;

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, query: &str, requested_by: &str, limit: usize) -> Result<Vec<Track>, SourceError> {
        if query.starts_with("missing") {
            return Err(SourceError::NotFound(query.to_string()));
        }
        for (prefix, stem) in [("playlist:", "P"), ("broken-playlist:", "broken-P")] {
            if let Some(n) = query.strip_prefix(prefix) {
                let n: usize = n.parse().unwrap_or(1);
                return Ok((0..n.min(limit))
                    .map(|i| track(&format!("{stem}{i}"), requested_by))
                    .collect());
            }
        }
        Ok(vec![track(query, requested_by)])
    }
}

/// URLs containing `broken` fail to resolve, URLs containing `slow` take
/// 200 ms.
pub struct FakeStreamResolver;

#[async_trait]
impl StreamResolver for FakeStreamResolver {
    async fn resolve(&self, source_url: &str) -> Result<String, PipelineError> {
        if source_url.contains("slow") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if source_url.contains("broken") {
            return Err(PipelineError::Resolve(format!("{source_url} is gone")));
        }
        Ok(format!("{source_url}#media"))
    }
}

struct Feed {
    media_url: String,
    start_secs: f64,
    writer: Option<DuplexStream>,
}

#[derive(Default)]
struct TranscoderState {
    live: AtomicUsize,
    spawned: AtomicUsize,
    feeds: Mutex<Vec<Feed>>,
}

/// Hands out in-memory pipes and counts live processes.
#[derive(Default, Clone)]
pub struct FakeTranscoder {
    state: Arc<TranscoderState>,
}

impl FakeTranscoder {
    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn spawned(&self) -> usize {
        self.state.spawned.load(Ordering::SeqCst)
    }

    pub fn last_start_secs(&self) -> Option<f64> {
        self.state.feeds.lock().last().map(|f| f.start_secs)
    }

    pub fn last_media_url(&self) -> Option<String> {
        self.state.feeds.lock().last().map(|f| f.media_url.clone())
    }

    /// Feeds one frame to the newest stream and closes it, which ends the
    /// track normally.
    pub async fn finish_latest(&self) {
        let writer = self.state.feeds.lock().last_mut().and_then(|f| f.writer.take());
        if let Some(mut writer) = writer {
            let _ = writer.write_all(&vec![0u8; FRAME_BYTES]).await;
            let _ = writer.shutdown().await;
        }
    }

    /// Closes the newest stream before any audio, which the pump reports
    /// as a failure.
    pub fn fail_latest(&self) {
        let writer = self.state.feeds.lock().last_mut().and_then(|f| f.writer.take());
        drop(writer);
    }
}

struct FakeProcess {
    state: Arc<TranscoderState>,
    output: Option<DuplexStream>,
    running: bool,
}

impl TranscodeProcess for FakeProcess {
    fn take_output(&mut self) -> Option<PcmReader> {
        self.output.take().map(|o| Box::new(o) as PcmReader)
    }

    fn terminate(&mut self) {
        if self.running {
            self.running = false;
            self.state.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_running(&mut self) -> bool {
        self.running
    }
}

impl Drop for FakeProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl Transcoder for FakeTranscoder {
    fn spawn(&self, media_url: &str, start_secs: f64) -> Result<Box<dyn TranscodeProcess>, PipelineError> {
        let (writer, output) = tokio::io::duplex(64 * 1024);
        self.state.live.fetch_add(1, Ordering::SeqCst);
        self.state.spawned.fetch_add(1, Ordering::SeqCst);
        self.state.feeds.lock().push(Feed {
            media_url: media_url.to_string(),
            start_secs,
            writer: Some(writer),
        });
        Ok(Box::new(FakeProcess {
            state: self.state.clone(),
            output: Some(output),
            running: true,
        }))
    }
}

pub struct FakeVoice {
    pub frames: AtomicUsize,
    pub disconnected: AtomicBool,
    status: watch::Sender<VoiceStatus>,
}

impl FakeVoice {
    pub fn new() -> Self {
        Self {
            frames: AtomicUsize::new(0),
            disconnected: AtomicBool::new(false),
            status: watch::channel(VoiceStatus::Ready).0,
        }
    }

    pub fn set_status(&self, status: VoiceStatus) {
        self.status.send_replace(status);
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeVoice {
    async fn send_pcm(&self, _frame: Bytes) -> Result<(), VoiceError> {
        if self.is_disconnected() {
            return Err(VoiceError::Disconnected);
        }
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn status(&self) -> watch::Receiver<VoiceStatus> {
        self.status.subscribe()
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub voices: Mutex<Vec<Arc<FakeVoice>>>,
    pub fail: AtomicBool,
}

impl FakeConnector {
    pub fn last_voice(&self) -> Arc<FakeVoice> {
        self.voices.lock().last().cloned().expect("no voice connection opened")
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(&self, _guild_id: &GuildId, _channel_id: &ChannelId) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Io("voice server unreachable".into()));
        }
        let voice = Arc::new(FakeVoice::new());
        self.voices.lock().push(voice.clone());
        Ok(voice)
    }
}

pub struct FakeSearch;

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str, source: SearchSource, limit: usize) -> Result<Vec<SearchResult>, SourceError> {
        if !matches!(source, SearchSource::Youtube | SearchSource::All) {
            return Ok(Vec::new());
        }
        Ok((0..limit.min(3))
            .map(|i| SearchResult {
                id: format!("vid{i}"),
                title: format!("{query} #{i}"),
                artist: "Tester".to_string(),
                duration: 200,
                thumbnail: String::new(),
                url: format!("https://www.youtube.com/watch?v=vid{i}"),
                source: TrackSource::Youtube,
            })
            .collect())
    }
}

pub struct FakeLyrics;

#[async_trait]
impl LyricsProvider for FakeLyrics {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn load_lyrics(&self, title: &str, artist: &str) -> Option<LyricsData> {
        (title == "Known").then(|| LyricsData {
            title: title.to_string(),
            artist: artist.to_string(),
            lyrics: "la la la, la la la, la la la la la la".to_string(),
            thumbnail: None,
            source: "fake".to_string(),
            url: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Queue(QueueState),
    Started(Track),
    Ended(Track, bool),
    Tick(u64, u64),
    Closed(String),
}

/// Records every observer call in order.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn started_titles(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Started(t) => Some(t.title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn closed_reason(&self) -> Option<String> {
        self.events.lock().iter().find_map(|e| match e {
            Event::Closed(reason) => Some(reason.clone()),
            _ => None,
        })
    }

    pub fn queue_finished(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| matches!(e, Event::Ended(_, true)))
    }
}

impl PlayerObserver for Recorder {
    fn on_queue_changed(&self, queue: &QueueState) {
        self.events.lock().push(Event::Queue(queue.clone()));
    }

    fn on_track_started(&self, track: &Track) {
        self.events.lock().push(Event::Started(track.clone()));
    }

    fn on_track_ended(&self, track: &Track, queue_finished: bool) {
        self.events.lock().push(Event::Ended(track.clone(), queue_finished));
    }

    fn on_position_tick(&self, position: u64, duration: u64) {
        self.events.lock().push(Event::Tick(position, duration));
    }

    fn on_session_closed(&self, reason: &str) {
        self.events.lock().push(Event::Closed(reason.to_string()));
    }
}

/// Polls `cond` until it holds or two seconds pass.
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub connector: Arc<FakeConnector>,
    pub transcoder: FakeTranscoder,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default(), PlayerConfig::default())
    }

    pub fn with_config(session: SessionConfig, player: PlayerConfig) -> Self {
        let connector = Arc::new(FakeConnector::default());
        let transcoder = FakeTranscoder::default();
        let backend = AudioBackend {
            resolver: Arc::new(FakeStreamResolver),
            url_cache: Arc::new(MemoryCache::<String, String>::new()),
            transcoder: Arc::new(transcoder.clone()),
            url_ttl: Duration::from_secs(300),
        };
        let registry = SessionRegistry::new(connector.clone(), Arc::new(FakeResolver), backend, session, player);
        Self {
            registry,
            connector,
            transcoder,
        }
    }

    pub async fn session(&self, guild: &str) -> Arc<Session> {
        self.registry
            .create_session(
                GuildId::from(guild),
                ChannelId::from(CHANNEL),
                SessionLabels {
                    guild_name: "Test Guild".into(),
                    channel_name: "Music".into(),
                },
            )
            .await
            .expect("session should be created")
            .session
    }

    /// Creates a session and subscribes a recorder to its player.
    pub async fn recorded(&self) -> (Arc<Session>, Arc<Player>, Arc<Recorder>) {
        let session = self.session(GUILD).await;
        let recorder = Arc::new(Recorder::default());
        let observer = recorder.clone();
        session.attach_observer(move || observer);
        let player = session.player().clone();
        (session, player, recorder)
    }

    pub async fn wait_status(&self, player: &Player, status: PlayerStatus) {
        eventually(&format!("status {status:?}"), || player.status() == status).await;
    }
}

pub fn app_state(harness: &Harness, config: Config) -> Arc<AppState> {
    AppState::new(config, harness.registry.clone(), Arc::new(FakeSearch), Arc::new(FakeLyrics))
}
