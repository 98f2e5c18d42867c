pub mod engine;
pub mod observer;
pub mod queue;
mod ticker;

pub use engine::{Player, PlayerStatus};
pub use observer::PlayerObserver;
pub use queue::QueueState;
