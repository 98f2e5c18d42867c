pub mod base;
pub mod gateway;
pub mod logging;
pub mod lyrics;
pub mod pipeline;
pub mod player;
pub mod server;
pub mod session;

pub use base::*;
pub use gateway::*;
pub use logging::*;
pub use lyrics::*;
pub use pipeline::*;
pub use player::*;
pub use server::*;
pub use session::*;
