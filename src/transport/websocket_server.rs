use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    hub::{ClientSender, SessionBroadcaster, SessionFull},
    state::AppState,
};
use crate::{
    common::{errors::PlayerError, types::SessionId},
    protocol::{Envelope, InboundCommand, OutgoingEvent, OutgoingMessage, close_codes},
    session::Session,
};

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let max = state.config.gateway.max_message_bytes;
    ws.max_message_size(max)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

pub async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let Some(session) = admit(&mut socket, &state).await else {
        return;
    };
    let session_id = session.id.clone();
    let gateway = &state.config.gateway;

    let (client_id, tx, rx) = match state.hub.join(&session_id, gateway.max_clients_per_session) {
        Ok(joined) => joined,
        Err(SessionFull) => {
            warn!("Rejecting dashboard client: session={} is full", session_id);
            close(&mut socket, close_codes::MAX_CLIENTS_REACHED, "max clients reached").await;
            return;
        }
    };

    let hub = state.hub.clone();
    let sid = session_id.clone();
    session.attach_observer(move || Arc::new(SessionBroadcaster::new(sid, hub)));

    // The session may have ended while this client was being admitted.
    if state.registry.get_by_id(&session_id).is_none() {
        state.hub.leave(&session_id, &client_id);
        close(&mut socket, close_codes::SESSION_NOT_FOUND, "session not found").await;
        return;
    }

    info!(
        "Dashboard client connected: session={} client={} clients={}",
        session_id,
        client_id,
        state.hub.client_count(&session_id)
    );
    reply(
        &tx,
        &session_id,
        OutgoingEvent::SessionUpdate {
            session: session.snapshot(),
        },
    );

    let timeout = gateway.client_timeout();
    let period = gateway.ping_interval();
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            Ok(msg) = rx.recv_async() => {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = socket.send(msg).await {
                    warn!("Socket send error: session={} client={} err={}", session_id, client_id, e);
                    break;
                }
                if closing {
                    break;
                }
            }
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error: session={} client={} err={}", session_id, client_id, e);
                        break;
                    }
                    None => break,
                };
                last_seen = Instant::now();

                match msg {
                    Message::Text(text) => dispatch(&state, &session, &tx, text.as_str()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > timeout {
                    info!("Dashboard client timed out: session={} client={}", session_id, client_id);
                    close(&mut socket, close_codes::HEARTBEAT_TIMEOUT, "heartbeat timeout").await;
                    break;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.leave(&session_id, &client_id);
    info!(
        "Dashboard client disconnected: session={} client={}",
        session_id, client_id
    );
}

/// Waits for the `connect` frame and resolves the session it names.
async fn admit(socket: &mut WebSocket, state: &AppState) -> Option<Arc<Session>> {
    let first = tokio::time::timeout(state.config.gateway.client_timeout(), next_text(socket)).await;
    let text = match first {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(_) => {
            close(socket, close_codes::HEARTBEAT_TIMEOUT, "no connect received").await;
            return None;
        }
    };

    let envelope = match Envelope::parse(&text) {
        Ok(envelope) if envelope.kind == "connect" => envelope,
        Ok(envelope) => {
            warn!("First dashboard frame was `{}`, expected connect", envelope.kind);
            close(socket, close_codes::POLICY_VIOLATION, "expected connect").await;
            return None;
        }
        Err(e) => {
            warn!("Unparseable connect frame: {}", e);
            close(socket, close_codes::POLICY_VIOLATION, "expected connect").await;
            return None;
        }
    };

    let session = envelope
        .session_id
        .as_ref()
        .and_then(|id| state.registry.get_by_id(id));
    if session.is_none() {
        info!("Dashboard client asked for unknown session {:?}", envelope.session_id);
        close(socket, close_codes::SESSION_NOT_FOUND, "session not found").await;
    }
    session
}

async fn next_text(socket: &mut WebSocket) -> Option<String> {
    loop {
        match socket.recv().await? {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

async fn close(socket: &mut WebSocket, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_owned().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

fn reply(tx: &ClientSender, session_id: &SessionId, event: OutgoingEvent) {
    match OutgoingMessage::new(session_id.clone(), event).to_json() {
        Ok(json) => {
            let _ = tx.send(Message::Text(json.into()));
        }
        Err(e) => warn!("Failed to serialize reply: session={} err={}", session_id, e),
    }
}

/// Turns a no-op transition into an error for the sender.
fn applied(done: bool, action: &'static str) -> Result<(), PlayerError> {
    if done {
        Ok(())
    } else {
        Err(PlayerError::InvalidState(action))
    }
}

fn reply_error(tx: &ClientSender, session_id: &SessionId, error: &PlayerError) {
    reply(tx, session_id, OutgoingEvent::error(error.code(), error.to_string()));
}

/// Relays one client frame into the session's player. Failures go back to
/// the sender only.
fn dispatch(state: &Arc<AppState>, session: &Arc<Session>, tx: &ClientSender, text: &str) {
    let session_id = &session.id;
    let command = match Envelope::parse(text).and_then(Envelope::into_command) {
        Ok(command) => command,
        Err(e) => {
            warn!("Rejected dashboard message: session={} err={}", session_id, e);
            reply(tx, session_id, OutgoingEvent::error(e.code(), e.to_string()));
            return;
        }
    };
    debug!("Dashboard command: session={} cmd={:?}", session_id, command);

    let player = session.player();
    let result = match command {
        InboundCommand::Connect => {
            reply(
                tx,
                session_id,
                OutgoingEvent::SessionUpdate {
                    session: session.snapshot(),
                },
            );
            Ok(())
        }
        InboundCommand::Play { track_id } => player.play(track_id.as_ref()),
        InboundCommand::Pause => applied(player.pause(), "pause"),
        InboundCommand::Resume => applied(player.resume(), "resume"),
        InboundCommand::Skip => applied(player.skip(), "skip"),
        InboundCommand::Previous => applied(player.previous(), "go back"),
        InboundCommand::Seek { position } => player.seek(position),
        InboundCommand::Volume { volume } => {
            player.set_volume(volume);
            Ok(())
        }
        InboundCommand::RemoveTrack { track_id } => player.remove_track(&track_id),
        InboundCommand::ReorderQueue { from_index, to_index } => player.reorder_queue(from_index, to_index),
        InboundCommand::Shuffle => applied(player.shuffle(), "shuffle"),
        InboundCommand::Repeat { mode } => {
            player.set_repeat_mode(mode);
            Ok(())
        }
        InboundCommand::AddTrack { query } => {
            let player = player.clone();
            let tx = tx.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                if let Err(e) = player.add_track(&query, "dashboard").await {
                    reply_error(&tx, &session_id, &e);
                }
            });
            Ok(())
        }
        InboundCommand::Search { query, source } => {
            let state = state.clone();
            let tx = tx.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                let search = state.search.search(&query, source, state.config.search.default_limit);
                match tokio::time::timeout(state.config.search.timeout(), search).await {
                    Ok(Ok(results)) => reply(&tx, &session_id, OutgoingEvent::SearchResults { results, query }),
                    Ok(Err(e)) => {
                        warn!("Search failed: query=`{}` err={}", query, e);
                        reply(&tx, &session_id, OutgoingEvent::error("SEARCH_ERROR", e.to_string()));
                    }
                    Err(_) => {
                        warn!("Search timed out: query=`{}`", query);
                        reply(&tx, &session_id, OutgoingEvent::error("SEARCH_ERROR", "search timed out"));
                    }
                }
            });
            Ok(())
        }
        InboundCommand::LyricsRequest { title, artist } => {
            let state = state.clone();
            let tx = tx.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                let lookup = state.lyrics.load_lyrics(&title, &artist);
                let event = match tokio::time::timeout(state.config.lyrics.timeout(), lookup).await {
                    Ok(lyrics @ Some(_)) => OutgoingEvent::LyricsResponse { lyrics, error: None },
                    Ok(None) | Err(_) => OutgoingEvent::LyricsResponse {
                        lyrics: None,
                        error: Some("lyrics not found".to_owned()),
                    },
                };
                reply(&tx, &session_id, event);
            });
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Command failed: session={} err={}", session_id, e);
        reply_error(tx, session_id, &e);
    }
}
