use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    error::PipelineError,
    resolver::StreamResolver,
    stream::{EndCallback, Gain, Pump, StreamHandle},
    transcoder::Transcoder,
};
use crate::{common::cache::TtlCache, voice::VoiceConnection};

/// Process-wide collaborators shared by every session's pipeline.
#[derive(Clone)]
pub struct AudioBackend {
    pub resolver: Arc<dyn StreamResolver>,
    pub url_cache: Arc<dyn TtlCache<String, String>>,
    pub transcoder: Arc<dyn Transcoder>,
    pub url_ttl: Duration,
}

/// Identifies one stream start. Only the newest ticket may install a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Releases a freshly installed stream's pump. Dropping it unopened stops the
/// stream before any audio is read.
pub struct StreamGate(oneshot::Sender<()>);

impl StreamGate {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

pub enum StartOutcome {
    Started(StreamGate),
    /// A newer start (or a stop) happened while this one was resolving.
    Superseded,
}

struct State {
    generation: u64,
    active: Option<StreamHandle>,
}

/// Per-session fetch, transcode and stream adapter. Holds at most one live
/// transcode process.
pub struct AudioPipeline {
    backend: AudioBackend,
    gain: Gain,
    state: Mutex<State>,
}

impl AudioPipeline {
    pub fn new(backend: AudioBackend, volume: u8) -> Self {
        Self {
            backend,
            gain: Gain::new(volume),
            state: Mutex::new(State {
                generation: 0,
                active: None,
            }),
        }
    }

    /// Direct media URL for a source URI, served from the shared cache when
    /// possible. A failed resolution evicts the cached entry.
    pub async fn resolve_stream_url(&self, source_url: &str) -> Result<String, PipelineError> {
        let key = source_url.to_owned();
        if let Some(url) = self.backend.url_cache.get(&key) {
            debug!("Stream url cache hit: {}", source_url);
            return Ok(url);
        }

        match self.backend.resolver.resolve(source_url).await {
            Ok(url) => {
                self.backend
                    .url_cache
                    .put(key, url.clone(), self.backend.url_ttl);
                Ok(url)
            }
            Err(e) => {
                self.backend.url_cache.invalidate(&key);
                Err(e)
            }
        }
    }

    /// Supersedes whatever is playing or starting. The previous process, if
    /// any, is signalled before this returns.
    pub fn begin(&self) -> Ticket {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(mut old) = state.active.take() {
            old.stop();
        }
        Ticket(state.generation)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.state.lock().generation == ticket.0
    }

    /// Resolves and spawns the transcoder for `ticket`. The stream is only
    /// installed if no newer ticket was issued while resolving.
    pub async fn start_stream(
        &self,
        ticket: Ticket,
        source_url: &str,
        start_secs: f64,
        voice: Arc<dyn VoiceConnection>,
        on_end: EndCallback,
    ) -> Result<StartOutcome, PipelineError> {
        let media_url = self.resolve_stream_url(source_url).await?;

        let mut state = self.state.lock();
        if state.generation != ticket.0 {
            debug!("Stream start superseded: generation={}", ticket.0);
            return Ok(StartOutcome::Superseded);
        }

        let mut process = self.backend.transcoder.spawn(&media_url, start_secs)?;
        let reader = process.take_output().ok_or(PipelineError::NoOutput)?;

        let cancel = CancellationToken::new();
        let (paused_tx, paused_rx) = watch::channel(false);
        let (gate_tx, gate_rx) = oneshot::channel();

        let pump = Pump {
            reader,
            voice,
            gain: self.gain.clone(),
            paused: paused_rx,
            cancel: cancel.clone(),
            gate: gate_rx,
        };
        tokio::spawn(async move {
            let end = pump.run().await;
            on_end(end);
        });

        state.active = Some(StreamHandle::new(process, cancel, paused_tx));
        Ok(StartOutcome::Started(StreamGate(gate_tx)))
    }

    /// Cancels the active stream without superseding its ticket, so its end
    /// callback still counts as the current track ending.
    pub fn skip(&self) -> bool {
        match self.state.lock().active.take() {
            Some(mut stream) => {
                stream.stop();
                true
            }
            None => false,
        }
    }

    pub fn set_paused(&self, paused: bool) {
        if let Some(stream) = self.state.lock().active.as_ref() {
            stream.set_paused(paused);
        }
    }

    pub fn set_volume(&self, volume: u8) {
        self.gain.set_volume(volume);
    }

    pub fn has_active_stream(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Terminates the active stream, if any. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(mut stream) = state.active.take() {
            stream.stop();
        }
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        if self.state.get_mut().active.is_some() {
            warn!("Audio pipeline dropped with a live stream");
        }
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::{
        audio::transcoder::{PcmReader, TranscodeProcess},
        common::cache::MemoryCache,
        voice::{VoiceError, VoiceStatus},
    };

    struct CountingResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl StreamResolver for CountingResolver {
        async fn resolve(&self, source_url: &str) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PipelineError::Resolve("boom".into()))
            } else {
                Ok(format!("{source_url}#media"))
            }
        }
    }

    struct NullProcess(Arc<AtomicUsize>, bool);

    impl TranscodeProcess for NullProcess {
        fn take_output(&mut self) -> Option<PcmReader> {
            Some(Box::new(tokio::io::empty()))
        }

        fn terminate(&mut self) {
            if self.1 {
                self.1 = false;
                self.0.fetch_sub(1, Ordering::SeqCst);
            }
        }

        fn is_running(&mut self) -> bool {
            self.1
        }
    }

    impl Drop for NullProcess {
        fn drop(&mut self) {
            self.terminate();
        }
    }

    #[derive(Default)]
    struct CountingTranscoder {
        live: Arc<AtomicUsize>,
    }

    impl Transcoder for CountingTranscoder {
        fn spawn(&self, _: &str, _: f64) -> Result<Box<dyn TranscodeProcess>, PipelineError> {
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullProcess(self.live.clone(), true)))
        }
    }

    struct SilentVoice(watch::Sender<VoiceStatus>);

    #[async_trait]
    impl VoiceConnection for SilentVoice {
        async fn send_pcm(&self, _: Bytes) -> Result<(), VoiceError> {
            Ok(())
        }
        fn status(&self) -> watch::Receiver<VoiceStatus> {
            self.0.subscribe()
        }
        fn disconnect(&self) {}
    }

    fn pipeline(fail: bool) -> (AudioPipeline, Arc<CountingResolver>, Arc<AtomicUsize>) {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail,
        });
        let transcoder = CountingTranscoder::default();
        let live = transcoder.live.clone();
        let backend = AudioBackend {
            resolver: resolver.clone(),
            url_cache: Arc::new(MemoryCache::<String, String>::new()),
            transcoder: Arc::new(transcoder),
            url_ttl: Duration::from_secs(300),
        };
        (AudioPipeline::new(backend, 100), resolver, live)
    }

    fn voice() -> Arc<dyn VoiceConnection> {
        Arc::new(SilentVoice(watch::channel(VoiceStatus::Ready).0))
    }

    #[tokio::test]
    async fn resolution_is_cached_per_source() {
        let (p, resolver, _) = pipeline(false);
        let a = p.resolve_stream_url("yt:a").await.unwrap();
        let again = p.resolve_stream_url("yt:a").await.unwrap();
        p.resolve_stream_url("yt:b").await.unwrap();
        assert_eq!(a, again);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_resolution_is_not_cached() {
        let (p, resolver, _) = pipeline(true);
        assert!(p.resolve_stream_url("yt:a").await.is_err());
        assert!(p.resolve_stream_url("yt:a").await.is_err());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_ticket_spawns_nothing() {
        let (p, _, live) = pipeline(false);
        let first = p.begin();
        let second = p.begin();

        let outcome = p
            .start_stream(first, "yt:a", 0.0, voice(), Box::new(|_| {}))
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::Superseded));
        assert_eq!(live.load(Ordering::SeqCst), 0);

        let outcome = p
            .start_stream(second, "yt:a", 0.0, voice(), Box::new(|_| {}))
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::Started(_)));
        assert_eq!(live.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn begin_and_stop_release_the_process() {
        let (p, _, live) = pipeline(false);
        let t = p.begin();
        let _gate = p
            .start_stream(t, "yt:a", 0.0, voice(), Box::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(live.load(Ordering::SeqCst), 1);

        let t = p.begin();
        assert_eq!(live.load(Ordering::SeqCst), 0);
        let _gate = p
            .start_stream(t, "yt:a", 0.0, voice(), Box::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(live.load(Ordering::SeqCst), 1);

        p.stop();
        p.stop();
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(!p.has_active_stream());
    }
}
