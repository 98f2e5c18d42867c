use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::{
    common::types::{SessionId, TrackId, now_ms},
    player::queue::QueueState,
    protocol::models::{LyricsData, RepeatMode, SearchResult, SearchSource, SessionSnapshot, Track},
};

/// Raw frame as sent by a dashboard client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("invalid payload for `{kind}`: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

impl MessageError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "PARSE_ERROR",
            Self::UnknownType(_) => "UNKNOWN_TYPE",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
        }
    }
}

/// A validated command from a dashboard client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    Connect,
    Play { track_id: Option<TrackId> },
    Pause,
    Resume,
    Skip,
    Previous,
    Seek { position: f64 },
    Volume { volume: f64 },
    AddTrack { query: String },
    RemoveTrack { track_id: TrackId },
    ReorderQueue { from_index: usize, to_index: usize },
    Shuffle,
    Repeat { mode: RepeatMode },
    Search { query: String, source: SearchSource },
    LyricsRequest { title: String, artist: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayPayload {
    #[serde(default)]
    track_id: Option<TrackId>,
}

#[derive(Deserialize)]
struct SeekPayload {
    position: f64,
}

#[derive(Deserialize)]
struct VolumePayload {
    volume: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTrackPayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    search_query: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveTrackPayload {
    track_id: TrackId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderPayload {
    from_index: usize,
    to_index: usize,
}

#[derive(Deserialize)]
struct RepeatPayload {
    mode: RepeatMode,
}

#[derive(Deserialize)]
struct SearchPayload {
    query: String,
    #[serde(default)]
    source: SearchSource,
}

#[derive(Deserialize)]
struct LyricsPayload {
    title: String,
    artist: String,
}

impl Envelope {
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        serde_json::from_str(text).map_err(|e| MessageError::Malformed(e.to_string()))
    }

    fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        let value = self.payload.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| MessageError::InvalidPayload {
            kind: self.kind.clone(),
            reason: e.to_string(),
        })
    }

    fn invalid(&self, reason: &str) -> MessageError {
        MessageError::InvalidPayload {
            kind: self.kind.clone(),
            reason: reason.to_owned(),
        }
    }

    pub fn into_command(self) -> Result<InboundCommand, MessageError> {
        let cmd = match self.kind.as_str() {
            "connect" => InboundCommand::Connect,
            "play" => {
                let p: Option<PlayPayload> = match self.payload {
                    None | Some(Value::Null) => None,
                    Some(_) => Some(self.decode_payload()?),
                };
                InboundCommand::Play {
                    track_id: p.and_then(|p| p.track_id),
                }
            }
            "pause" => InboundCommand::Pause,
            "resume" => InboundCommand::Resume,
            "skip" => InboundCommand::Skip,
            "previous" => InboundCommand::Previous,
            "shuffle" => InboundCommand::Shuffle,
            "seek" => {
                let p: SeekPayload = self.decode_payload()?;
                InboundCommand::Seek { position: p.position }
            }
            "volume" => {
                let p: VolumePayload = self.decode_payload()?;
                if !p.volume.is_finite() {
                    return Err(self.invalid("volume must be a number"));
                }
                InboundCommand::Volume { volume: p.volume }
            }
            "add_track" => {
                let p: AddTrackPayload = self.decode_payload()?;
                let non_blank = |q: Option<String>| {
                    q.map(|q| q.trim().to_owned()).filter(|q| !q.is_empty())
                };
                let query = non_blank(p.url)
                    .or_else(|| non_blank(p.search_query))
                    .ok_or_else(|| self.invalid("either url or searchQuery is required"))?;
                InboundCommand::AddTrack { query }
            }
            "remove_track" => {
                let p: RemoveTrackPayload = self.decode_payload()?;
                InboundCommand::RemoveTrack { track_id: p.track_id }
            }
            "reorder_queue" => {
                let p: ReorderPayload = self.decode_payload()?;
                InboundCommand::ReorderQueue {
                    from_index: p.from_index,
                    to_index: p.to_index,
                }
            }
            "repeat" => {
                let p: RepeatPayload = self.decode_payload()?;
                InboundCommand::Repeat { mode: p.mode }
            }
            "search" => {
                let p: SearchPayload = self.decode_payload()?;
                if p.query.trim().is_empty() {
                    return Err(self.invalid("query must not be empty"));
                }
                InboundCommand::Search {
                    query: p.query,
                    source: p.source,
                }
            }
            "lyrics_request" => {
                let p: LyricsPayload = self.decode_payload()?;
                InboundCommand::LyricsRequest {
                    title: p.title,
                    artist: p.artist,
                }
            }
            other => return Err(MessageError::UnknownType(other.to_owned())),
        };
        Ok(cmd)
    }
}

/// Server to client messages. Serialized as `{type, payload}` and wrapped in
/// an [`OutgoingMessage`] carrying the session id and timestamp.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum OutgoingEvent {
    SessionUpdate {
        session: SessionSnapshot,
    },
    QueueUpdate {
        queue: QueueState,
    },
    TrackUpdate {
        track: Option<Track>,
        is_playing: bool,
    },
    PositionUpdate {
        position: u64,
        duration: u64,
    },
    SearchResults {
        results: Vec<SearchResult>,
        query: String,
    },
    LyricsResponse {
        lyrics: Option<LyricsData>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        code: String,
        message: String,
    },
    Disconnect {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl OutgoingEvent {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_owned(),
            message: message.into(),
        }
    }

    /// Position ticks are the only messages that may be dropped under backpressure.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::PositionUpdate { .. })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    #[serde(flatten)]
    pub event: OutgoingEvent,
    pub session_id: SessionId,
    pub timestamp: u64,
}

impl OutgoingMessage {
    pub fn new(session_id: SessionId, event: OutgoingEvent) -> Self {
        Self {
            event,
            session_id,
            timestamp: now_ms(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<InboundCommand, MessageError> {
        Envelope::parse(text)?.into_command()
    }

    #[test]
    fn parses_commands_without_payload() {
        assert_eq!(parse(r#"{"type":"pause","sessionId":"abc"}"#), Ok(InboundCommand::Pause));
        assert_eq!(
            parse(r#"{"type":"play","sessionId":"abc","timestamp":1}"#),
            Ok(InboundCommand::Play { track_id: None })
        );
    }

    #[test]
    fn parses_typed_payloads() {
        assert_eq!(
            parse(r#"{"type":"reorder_queue","payload":{"fromIndex":0,"toIndex":2}}"#),
            Ok(InboundCommand::ReorderQueue { from_index: 0, to_index: 2 })
        );
        assert_eq!(
            parse(r#"{"type":"repeat","payload":{"mode":"all"}}"#),
            Ok(InboundCommand::Repeat { mode: RepeatMode::All })
        );
        assert_eq!(
            parse(r#"{"type":"add_track","payload":{"searchQuery":" lofi "}}"#),
            Ok(InboundCommand::AddTrack { query: "lofi".into() })
        );
        assert_eq!(
            parse(r#"{"type":"add_track","payload":{"url":"","searchQuery":"song"}}"#),
            Ok(InboundCommand::AddTrack { query: "song".into() })
        );
        assert_eq!(
            parse(r#"{"type":"search","payload":{"query":"x"}}"#),
            Ok(InboundCommand::Search { query: "x".into(), source: SearchSource::Youtube })
        );
    }

    #[test]
    fn missing_fields_are_invalid_payloads() {
        let err = parse(r#"{"type":"seek","payload":{}}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYLOAD");

        let err = parse(r#"{"type":"add_track","payload":{}}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYLOAD");

        let err = parse(r#"{"type":"add_track","payload":{"url":" ","searchQuery":""}}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYLOAD");

        let err = parse(r#"{"type":"remove_track"}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYLOAD");
    }

    #[test]
    fn garbage_and_unknown_types_are_reported() {
        assert_eq!(parse("not json").unwrap_err().code(), "PARSE_ERROR");
        assert_eq!(parse(r#"{"type":"explode"}"#).unwrap_err().code(), "UNKNOWN_TYPE");
    }

    #[test]
    fn outgoing_envelope_shape() {
        let msg = OutgoingMessage::new(
            SessionId::from("abcd1234"),
            OutgoingEvent::TrackUpdate {
                track: None,
                is_playing: false,
            },
        );
        let v: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "track_update");
        assert_eq!(v["sessionId"], "abcd1234");
        assert!(v["payload"]["track"].is_null());
        assert_eq!(v["payload"]["isPlaying"], false);
        assert!(v["timestamp"].as_u64().is_some());
    }

    #[test]
    fn disconnect_omits_missing_reason() {
        let msg = OutgoingMessage::new(SessionId::from("s"), OutgoingEvent::Disconnect { reason: None });
        let v: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "disconnect");
        assert!(v["payload"].get("reason").is_none());
    }
}
