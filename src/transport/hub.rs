use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message};
use dashmap::DashMap;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    common::types::SessionId,
    player::{PlayerObserver, QueueState},
    protocol::{OutgoingEvent, OutgoingMessage, close_codes, models::Track},
};

pub type ClientId = Uuid;
pub type ClientSender = flume::Sender<Message>;

#[derive(Debug, PartialEq, Eq)]
pub struct SessionFull;

/// Dashboard connections grouped by session. Every client owns an unbounded
/// outbound queue drained by its socket task.
pub struct ClientHub {
    clients: DashMap<SessionId, DashMap<ClientId, ClientSender>>,
    /// Queue depth above which position ticks are skipped for a client.
    backlog: usize,
}

impl ClientHub {
    pub fn new(backlog: usize) -> Self {
        Self {
            clients: DashMap::new(),
            backlog,
        }
    }

    /// Registers a client unless the session already has `max` of them.
    pub fn join(
        &self,
        session_id: &SessionId,
        max: usize,
    ) -> Result<(ClientId, ClientSender, flume::Receiver<Message>), SessionFull> {
        let set = self.clients.entry(session_id.clone()).or_default();
        if set.len() >= max {
            return Err(SessionFull);
        }

        let id = Uuid::new_v4();
        let (tx, rx) = flume::unbounded();
        set.insert(id, tx.clone());
        Ok((id, tx, rx))
    }

    /// Drops a client. The session's entry goes away with its last client.
    pub fn leave(&self, session_id: &SessionId, client_id: &ClientId) {
        if let Some(set) = self.clients.get(session_id) {
            set.remove(client_id);
        }
        self.clients.remove_if(session_id, |_, set| set.is_empty());
    }

    pub fn client_count(&self, session_id: &SessionId) -> usize {
        self.clients.get(session_id).map(|s| s.len()).unwrap_or(0)
    }

    pub fn total_clients(&self) -> usize {
        self.clients.iter().map(|s| s.value().len()).sum()
    }

    pub fn has_session(&self, session_id: &SessionId) -> bool {
        self.clients.contains_key(session_id)
    }

    /// Serializes once and queues the frame for every client of the session.
    pub fn broadcast(&self, session_id: &SessionId, event: OutgoingEvent) {
        let Some(set) = self.clients.get(session_id) else {
            return;
        };

        let droppable = event.is_droppable();
        let json = match OutgoingMessage::new(session_id.clone(), event).to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize broadcast: session={} err={}", session_id, e);
                return;
            }
        };

        for client in set.iter() {
            if droppable && client.value().len() > self.backlog {
                debug!("Dropping position tick for slow client {}", client.key());
                continue;
            }
            let _ = client.value().send(Message::Text(json.clone().into()));
        }
    }

    /// Sends `disconnect{reason}` followed by a terminal close frame to every
    /// client of the session, then forgets them.
    pub fn close_session(&self, session_id: &SessionId, reason: &str) {
        self.broadcast(
            session_id,
            OutgoingEvent::Disconnect {
                reason: Some(reason.to_owned()),
            },
        );

        let Some((_, set)) = self.clients.remove(session_id) else {
            return;
        };
        for client in set.iter() {
            let _ = client.value().send(Message::Close(Some(CloseFrame {
                code: close_codes::SESSION_NOT_FOUND,
                reason: reason.to_owned().into(),
            })));
        }
        warn!("Closed {} dashboard client(s) of session {}", set.len(), session_id);
    }
}

/// Translates one session's player events into broadcasts.
pub struct SessionBroadcaster {
    session_id: SessionId,
    hub: Arc<ClientHub>,
}

impl SessionBroadcaster {
    pub fn new(session_id: SessionId, hub: Arc<ClientHub>) -> Self {
        Self { session_id, hub }
    }
}

impl PlayerObserver for SessionBroadcaster {
    fn on_queue_changed(&self, queue: &QueueState) {
        self.hub.broadcast(
            &self.session_id,
            OutgoingEvent::QueueUpdate {
                queue: queue.clone(),
            },
        );
    }

    fn on_track_started(&self, track: &Track) {
        self.hub.broadcast(
            &self.session_id,
            OutgoingEvent::TrackUpdate {
                track: Some(track.clone()),
                is_playing: true,
            },
        );
    }

    fn on_track_ended(&self, _track: &Track, queue_finished: bool) {
        if queue_finished {
            self.hub.broadcast(
                &self.session_id,
                OutgoingEvent::TrackUpdate {
                    track: None,
                    is_playing: false,
                },
            );
        }
    }

    fn on_position_tick(&self, position: u64, duration: u64) {
        self.hub
            .broadcast(&self.session_id, OutgoingEvent::PositionUpdate { position, duration });
    }

    fn on_session_closed(&self, reason: &str) {
        self.hub.close_session(&self.session_id, reason);
    }
}
