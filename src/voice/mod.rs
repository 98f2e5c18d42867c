pub mod bridge;
pub mod connection;

pub use bridge::{UdpBridge, UdpBridgeConnector};
pub use connection::{VoiceConnection, VoiceConnector, VoiceError, VoiceStatus};
