pub mod close_codes;
pub mod info;
pub mod messages;
pub mod models;

pub use messages::{Envelope, InboundCommand, MessageError, OutgoingEvent, OutgoingMessage};
pub use models::{LyricsData, RepeatMode, SearchResult, SearchSource, SessionSnapshot, Track, TrackSource};
