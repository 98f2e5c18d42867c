pub mod audio;
pub mod client;
pub mod common;
pub mod configs;
pub mod lyrics;
pub mod player;
pub mod protocol;
pub mod session;
pub mod sources;
pub mod transport;
pub mod voice;
