pub mod constants;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod stream;
pub mod transcoder;

pub use error::PipelineError;
pub use pipeline::{AudioBackend, AudioPipeline, StartOutcome, StreamGate, Ticket};
pub use resolver::{StreamResolver, YtDlpStreamResolver};
pub use stream::{EndCallback, StreamEnd};
pub use transcoder::{FfmpegTranscoder, PcmReader, TranscodeProcess, Transcoder};
