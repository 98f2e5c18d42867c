use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::PipelineError;

/// Turns a track's source page URI into a direct media URL.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, source_url: &str) -> Result<String, PipelineError>;
}

/// Resolves through `yt-dlp --get-url`.
pub struct YtDlpStreamResolver {
    program: String,
    timeout: Duration,
}

impl YtDlpStreamResolver {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl StreamResolver for YtDlpStreamResolver {
    async fn resolve(&self, source_url: &str) -> Result<String, PipelineError> {
        debug!("Resolving stream url for {}", source_url);

        let output = Command::new(&self.program)
            .args(["--format", "bestaudio", "--get-url", "--no-warnings", "--no-playlist"])
            .arg(source_url)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| PipelineError::Timeout("yt-dlp"))?
            .map_err(|e| PipelineError::Resolve(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Resolve(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| PipelineError::Resolve("yt-dlp returned no url".into()))
    }
}
