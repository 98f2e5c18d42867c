use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("resolver process failed: {0}")]
    Process(String),
    #[error("resolver timed out")]
    Timeout,
    #[error("could not parse resolver output: {0}")]
    Parse(String),
    #[error("nothing found for `{0}`")]
    NotFound(String),
}
