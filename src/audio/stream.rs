use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use tokio::{
    io::AsyncReadExt,
    sync::{oneshot, watch},
};
use tokio_util::sync::CancellationToken;

use super::{
    constants::{FRAME_BYTES, INT16_MAX_F, INT16_MIN_F},
    transcoder::{PcmReader, TranscodeProcess},
};
use crate::voice::VoiceConnection;

/// Why a stream stopped feeding the voice sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The transcoder reached end of input.
    Finished,
    /// The stream was cancelled from outside (skip, supersede, teardown).
    Stopped,
    Failed(String),
}

pub type EndCallback = Box<dyn FnOnce(StreamEnd) + Send + 'static>;

/// Owns the transcode process and the control surface of its pump task.
/// Dropping or stopping the handle releases both.
pub struct StreamHandle {
    process: Box<dyn TranscodeProcess>,
    cancel: CancellationToken,
    paused: watch::Sender<bool>,
}

impl StreamHandle {
    pub(super) fn new(
        process: Box<dyn TranscodeProcess>,
        cancel: CancellationToken,
        paused: watch::Sender<bool>,
    ) -> Self {
        Self {
            process,
            cancel,
            paused,
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.send_replace(paused);
    }

    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.process.terminate();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Volume as a linear gain stored in f32 bits so the pump can read it per frame.
#[derive(Clone)]
pub struct Gain(Arc<AtomicU32>);

impl Gain {
    pub fn new(volume: u8) -> Self {
        Self(Arc::new(AtomicU32::new(Self::from_volume(volume).to_bits())))
    }

    fn from_volume(volume: u8) -> f32 {
        f32::from(volume.min(100)) / 100.0
    }

    pub fn set_volume(&self, volume: u8) {
        self.0
            .store(Self::from_volume(volume).to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// Scales interleaved s16le samples in place.
pub fn apply_gain(frame: &mut [u8], gain: f32) {
    if (gain - 1.0).abs() <= f32::EPSILON {
        return;
    }
    for sample in frame.chunks_exact_mut(2) {
        let scaled = f32::from(LittleEndian::read_i16(sample)) * gain;
        LittleEndian::write_i16(sample, scaled.clamp(INT16_MIN_F, INT16_MAX_F) as i16);
    }
}

/// Reads up to one frame. A short read at end of input is zero-padded.
async fn read_frame(reader: &mut PcmReader, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled == 0 {
        return Ok(false);
    }
    buf[filled..].fill(0);
    Ok(true)
}

pub(super) struct Pump {
    pub reader: PcmReader,
    pub voice: Arc<dyn VoiceConnection>,
    pub gain: Gain,
    pub paused: watch::Receiver<bool>,
    pub cancel: CancellationToken,
    pub gate: oneshot::Receiver<()>,
}

impl Pump {
    /// Feeds frames to the voice sink until the input ends or the stream is
    /// cancelled. Nothing is read before the gate opens.
    pub async fn run(mut self) -> StreamEnd {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return StreamEnd::Stopped,
            opened = &mut self.gate => {
                if opened.is_err() {
                    return StreamEnd::Stopped;
                }
            }
        }

        let mut buf = vec![0u8; FRAME_BYTES];
        let mut frames = 0u64;

        loop {
            while *self.paused.borrow_and_update() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return StreamEnd::Stopped,
                    changed = self.paused.changed() => {
                        if changed.is_err() {
                            return StreamEnd::Stopped;
                        }
                    }
                }
            }

            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamEnd::Stopped,
                r = read_frame(&mut self.reader, &mut buf) => r,
            };

            match read {
                Ok(true) => {}
                Ok(false) if frames == 0 => {
                    return StreamEnd::Failed("transcoder produced no audio".into());
                }
                Ok(false) => return StreamEnd::Finished,
                Err(e) => return StreamEnd::Failed(e.to_string()),
            }

            apply_gain(&mut buf, self.gain.get());

            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamEnd::Stopped,
                r = self.voice.send_pcm(Bytes::copy_from_slice(&buf)) => r,
            };
            if let Err(e) = sent {
                return StreamEnd::Failed(e.to_string());
            }
            frames += 1;
        }
    }
}
