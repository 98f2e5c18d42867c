use crate::{player::queue::QueueState, protocol::models::Track};

/// Typed event sink for one session's player.
///
/// Calls are made while the player holds its state lock, so they arrive in
/// transition order. Implementations must not block and must not call back
/// into the player.
pub trait PlayerObserver: Send + Sync {
    fn on_queue_changed(&self, queue: &QueueState);

    fn on_track_started(&self, track: &Track);

    /// `queue_finished` is set when nothing follows and the player went idle.
    fn on_track_ended(&self, track: &Track, queue_finished: bool);

    fn on_position_tick(&self, position: u64, duration: u64);

    /// The owning session was torn down. Fired by the registry.
    fn on_session_closed(&self, _reason: &str) {}
}
