//! Dashboard-side connection to the sync gateway, with capped exponential
//! reconnects.

pub mod backoff;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{
    Message,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use self::backoff::{Backoff, ReconnectPolicy};
use crate::{
    common::types::{AnyResult, SessionId, now_ms},
    protocol::close_codes,
};

/// Close code recorded when the socket dropped without a close frame.
const ABNORMAL_CLOSE: u16 = 1006;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why [`DashboardClient::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The server closed with a code that forbids retrying.
    Terminal(u16),
    AttemptsExhausted,
    Cancelled,
}

/// Outcome of one connection, telling the outer loop what to do next.
enum SessionOutcome {
    Closed(u16),
    Shutdown,
}

pub struct DashboardClient {
    url: String,
    session_id: SessionId,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    cancel_token: CancellationToken,
}

impl DashboardClient {
    pub fn new(url: impl Into<String>, session_id: SessionId, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: url.into(),
            session_id,
            policy,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|s| {
            let changed = *s != next;
            *s = next;
            changed
        });
    }

    /// Connects and keeps reconnecting until a terminal close, cancellation
    /// or the attempt budget runs out. Server messages are forwarded to
    /// `events`; frames from `commands` are sent as-is.
    pub async fn run(&self, events: flume::Sender<Value>, commands: flume::Receiver<String>) -> StopReason {
        let mut backoff = Backoff::new(self.policy);

        loop {
            if self.cancel_token.is_cancelled() {
                self.set_state(ConnectionState::Disconnected);
                return StopReason::Cancelled;
            }

            self.set_state(ConnectionState::Connecting);
            let outcome = self.connect(&events, &commands, &mut backoff).await;
            self.set_state(ConnectionState::Disconnected);

            match outcome {
                Ok(SessionOutcome::Shutdown) => return StopReason::Cancelled,
                Ok(SessionOutcome::Closed(code)) if close_codes::is_terminal(code) => {
                    info!("[{}] Gateway closed with {}, not reconnecting", self.session_id, code);
                    return StopReason::Terminal(code);
                }
                Ok(SessionOutcome::Closed(code)) => {
                    debug!("[{}] Gateway closed with {}", self.session_id, code);
                }
                Err(e) => warn!("[{}] Gateway connection error: {}", self.session_id, e),
            }

            let Some(delay) = backoff.next() else {
                warn!("[{}] Max reconnect attempts reached", self.session_id);
                return StopReason::AttemptsExhausted;
            };
            debug!(
                "[{}] Reconnecting in {:?} (attempt {})",
                self.session_id,
                delay,
                backoff.attempts()
            );
            tokio::select! {
                _ = self.cancel_token.cancelled() => return StopReason::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect(
        &self,
        events: &flume::Sender<Value>,
        commands: &flume::Receiver<String>,
        backoff: &mut Backoff,
    ) -> AnyResult<SessionOutcome> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        self.set_state(ConnectionState::Connected);
        backoff.reset();

        let hello = json!({
            "type": "connect",
            "sessionId": self.session_id,
            "timestamp": now_ms(),
        });
        write.send(Message::Text(hello.to_string().into())).await?;

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    let frame = CloseFrame {
                        code: CloseCode::from(close_codes::GOING_AWAY),
                        reason: "client shutdown".into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    return Ok(SessionOutcome::Shutdown);
                }
                Ok(command) = commands.recv_async() => {
                    write.send(Message::Text(command.into())).await?;
                }
                msg = read.next() => {
                    let msg = match msg {
                        Some(msg) => msg?,
                        None => return Ok(SessionOutcome::Closed(ABNORMAL_CLOSE)),
                    };
                    match msg {
                        Message::Text(text) => match serde_json::from_str::<Value>(text.as_str()) {
                            Ok(value) => {
                                if events.send(value).is_err() {
                                    return Ok(SessionOutcome::Shutdown);
                                }
                            }
                            Err(e) => warn!("[{}] Unparseable gateway frame: {}", self.session_id, e),
                        },
                        Message::Close(frame) => {
                            let code = frame.map(|f| u16::from(f.code)).unwrap_or(ABNORMAL_CLOSE);
                            return Ok(SessionOutcome::Closed(code));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
