//! WebSocket close codes used by the dashboard gateway.

/// Sent by the dashboard client when it shuts down on its own.
pub const GOING_AWAY: u16 = 1001;
/// The first frame was not a `connect`.
pub const POLICY_VIOLATION: u16 = 1008;
/// The connection stopped answering heartbeats. Clients may reconnect.
pub const HEARTBEAT_TIMEOUT: u16 = 4000;
/// Connection cap for the session reached. Clients must not retry.
pub const MAX_CLIENTS_REACHED: u16 = 4003;
/// Unknown, expired or ended session. Clients must not retry.
pub const SESSION_NOT_FOUND: u16 = 4004;

/// Whether a client should give up instead of reconnecting.
pub fn is_terminal(code: u16) -> bool {
    matches!(code, MAX_CLIENTS_REACHED | SESSION_NOT_FOUND)
}
