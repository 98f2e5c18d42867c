use thiserror::Error;

/// Failure while bringing up a stream. The player absorbs every variant as
/// "this track is unplayable" and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("stream url resolution failed: {0}")]
    Resolve(String),
    #[error("failed to spawn transcoder: {0}")]
    Spawn(String),
    #[error("transcoder produced no output pipe")]
    NoOutput,
    #[error("{0} timed out")]
    Timeout(&'static str),
}
