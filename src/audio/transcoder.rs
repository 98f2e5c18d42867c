use std::process::Stdio;

use tokio::{
    io::AsyncRead,
    process::{Child, Command},
};
use tracing::{debug, warn};

use super::{
    constants::{CHANNELS, FFMPEG_RECONNECT_ARGS, TARGET_SAMPLE_RATE},
    error::PipelineError,
};

pub type PcmReader = Box<dyn AsyncRead + Send + Unpin>;

/// A running fetch+transcode process. Dropping the handle terminates it.
pub trait TranscodeProcess: Send {
    /// Hands out the s16le output pipe. Only the first call returns it.
    fn take_output(&mut self) -> Option<PcmReader>;

    /// Asks the process to exit without waiting for it.
    fn terminate(&mut self);

    fn is_running(&mut self) -> bool;
}

/// Spawns transcode processes. Spawning is synchronous so that it can happen
/// inside the pipeline's critical section.
pub trait Transcoder: Send + Sync {
    fn spawn(&self, media_url: &str, start_secs: f64) -> Result<Box<dyn TranscodeProcess>, PipelineError>;
}

pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(media_url: &str, start_secs: f64) -> Vec<String> {
        let mut args: Vec<String> = FFMPEG_RECONNECT_ARGS.iter().map(|s| s.to_string()).collect();
        if start_secs > 0.0 {
            args.push("-ss".into());
            args.push(format!("{start_secs:.3}"));
        }
        for arg in ["-i", media_url, "-loglevel", "error", "-f", "s16le", "-ar"] {
            args.push(arg.to_string());
        }
        args.push(TARGET_SAMPLE_RATE.to_string());
        args.push("-ac".into());
        args.push(CHANNELS.to_string());
        args.push("pipe:1".into());
        args
    }
}

impl Transcoder for FfmpegTranscoder {
    fn spawn(&self, media_url: &str, start_secs: f64) -> Result<Box<dyn TranscodeProcess>, PipelineError> {
        let child = Command::new(&self.program)
            .args(Self::args(media_url, start_secs))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PipelineError::Spawn(e.to_string()))?;

        debug!("ffmpeg started: pid={:?} offset={}s", child.id(), start_secs);
        Ok(Box::new(FfmpegProcess { child }))
    }
}

pub struct FfmpegProcess {
    child: Child,
}

impl TranscodeProcess for FfmpegProcess {
    fn take_output(&mut self) -> Option<PcmReader> {
        self.child
            .stdout
            .take()
            .map(|out| Box::new(out) as PcmReader)
    }

    fn terminate(&mut self) {
        if !self.is_running() {
            return;
        }

        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                // SAFETY: `pid` belongs to a child we spawned and have not reaped yet.
                unsafe {
                    libc::kill(pid as i32, libc::SIGTERM);
                }
                return;
            }
        }

        if let Err(e) = self.child.start_kill() {
            warn!("Failed to kill ffmpeg: {}", e);
        }
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
