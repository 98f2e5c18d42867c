pub mod error;
pub mod query;
pub mod ytdlp;

use async_trait::async_trait;

pub use error::SourceError;
pub use ytdlp::YtDlpSource;

use crate::protocol::models::{SearchResult, SearchSource, Track};

/// Turns a user query (video URL, playlist URL or free text) into tracks.
///
/// Playlists expand to at most `limit` tracks; everything else yields one.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str, requested_by: &str, limit: usize) -> Result<Vec<Track>, SourceError>;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, source: SearchSource, limit: usize)
    -> Result<Vec<SearchResult>, SourceError>;
}
