pub mod http_server;
pub mod hub;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod websocket_server;

pub use http_server::{rest_router, router};
pub use hub::{ClientHub, SessionBroadcaster};
pub use state::AppState;
