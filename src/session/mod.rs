pub mod context;
pub mod registry;

pub use context::{Session, SessionLabels};
pub use registry::{Created, SessionRegistry};

/// Why a session ended. Sent to dashboard clients in `disconnect{reason}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The host stopped playback.
    Stopped,
    /// Nobody else was in the voice channel.
    Alone,
    Expired,
    VoiceDisconnected,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Alone => "alone_timeout",
            Self::Expired => "expired",
            Self::VoiceDisconnected => "voice_disconnected",
            Self::Shutdown => "shutdown",
        }
    }
}
