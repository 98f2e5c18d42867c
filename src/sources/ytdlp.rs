use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{
    SearchProvider, TrackResolver,
    error::SourceError,
    query::{QueryKind, classify, extract_video_id, watch_url},
};
use crate::{
    common::types::{TrackId, now_ms},
    protocol::models::{SearchResult, SearchSource, Track, TrackSource},
};

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// One line of `yt-dlp --dump-json` output. Flat playlist entries carry
/// only a subset of these.
#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "ie_key")]
    extractor_key: Option<String>,
}

impl Entry {
    fn source(&self) -> TrackSource {
        match self.extractor_key.as_deref() {
            Some(k) if k.to_ascii_lowercase().starts_with("soundcloud") => TrackSource::Soundcloud,
            _ => TrackSource::Youtube,
        }
    }

    fn page_url(&self) -> String {
        if let Some(url) = &self.webpage_url {
            return url.clone();
        }
        match (&self.url, self.source()) {
            (Some(url), _) if extract_video_id(url).is_some() => watch_url(&self.id),
            (Some(url), TrackSource::Soundcloud) => url.clone(),
            _ => watch_url(&self.id),
        }
    }

    fn thumbnail(&self) -> String {
        self.thumbnail
            .clone()
            .or_else(|| self.thumbnails.last().map(|t| t.url.clone()))
            .unwrap_or_default()
    }

    fn artist(&self) -> String {
        self.channel
            .clone()
            .or_else(|| self.uploader.clone())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_owned())
    }

    fn into_track(self, requested_by: &str) -> Track {
        Track {
            id: TrackId::generate(),
            url: self.page_url(),
            title: self.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
            artist: self.artist(),
            duration: self.duration.unwrap_or(0.0).max(0.0) as u64,
            thumbnail: self.thumbnail(),
            source: self.source(),
            requested_by: requested_by.to_owned(),
            requested_at: now_ms(),
        }
    }

    fn into_search_result(self) -> SearchResult {
        SearchResult {
            url: self.page_url(),
            title: self.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
            artist: self.artist(),
            duration: self.duration.unwrap_or(0.0).max(0.0) as u64,
            thumbnail: self.thumbnail(),
            source: self.source(),
            id: self.id,
        }
    }
}

fn parse_entries(stdout: &str) -> Result<Vec<Entry>, SourceError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str::<Entry>(l).map_err(|e| SourceError::Parse(e.to_string())))
        .collect()
}

/// Track metadata and search backed by the `yt-dlp` executable.
pub struct YtDlpSource {
    program: String,
    timeout: Duration,
}

impl YtDlpSource {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn dump(&self, target: &str, flat: bool, limit: usize) -> Result<Vec<Entry>, SourceError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--dump-json", "--no-warnings", "--skip-download"]);
        if flat {
            cmd.args(["--flat-playlist", "--playlist-end"]).arg(limit.to_string());
        } else {
            cmd.arg("--no-playlist");
        }
        cmd.arg(target).kill_on_drop(true);

        debug!("yt-dlp lookup: {}", target);
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| SourceError::Timeout)?
            .map_err(|e| SourceError::Process(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Process(stderr.trim().to_owned()));
        }

        let mut entries = parse_entries(&String::from_utf8_lossy(&output.stdout))?;
        entries.truncate(limit.max(1));
        Ok(entries)
    }
}

#[async_trait]
impl TrackResolver for YtDlpSource {
    async fn resolve(&self, query: &str, requested_by: &str, limit: usize) -> Result<Vec<Track>, SourceError> {
        let entries = match classify(query) {
            QueryKind::Video(url) | QueryKind::Url(url) => self.dump(&url, false, 1).await?,
            QueryKind::Playlist(url) => self.dump(&url, true, limit).await?,
            QueryKind::Search(text) => self.dump(&format!("ytsearch1:{text}"), true, 1).await?,
        };

        if entries.is_empty() {
            warn!("No results for query: {}", query);
            return Err(SourceError::NotFound(query.to_owned()));
        }

        Ok(entries.into_iter().map(|e| e.into_track(requested_by)).collect())
    }
}

#[async_trait]
impl SearchProvider for YtDlpSource {
    async fn search(
        &self,
        query: &str,
        source: SearchSource,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError> {
        if !matches!(source, SearchSource::Youtube | SearchSource::All) {
            return Ok(Vec::new());
        }

        let entries = match classify(query) {
            QueryKind::Video(url) => self.dump(&url, false, 1).await?,
            _ => {
                self.dump(&format!("ytsearch{limit}:{}", query.trim()), true, limit)
                    .await?
            }
        };

        Ok(entries.into_iter().map(Entry::into_search_result).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_video_entry() {
        let line = r#"{"id":"abc","title":"Song","channel":"Band","duration":212.4,"thumbnail":"https://i/abc.jpg","webpage_url":"https://www.youtube.com/watch?v=abc","extractor_key":"Youtube"}"#;
        let track = parse_entries(line).unwrap().remove(0).into_track("alice");
        assert_eq!(track.title, "Song");
        assert_eq!(track.artist, "Band");
        assert_eq!(track.duration, 212);
        assert_eq!(track.url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(track.source, TrackSource::Youtube);
        assert_eq!(track.requested_by, "alice");
    }

    #[test]
    fn flat_entries_fall_back_to_defaults() {
        let out = "{\"id\":\"v1\",\"url\":\"https://www.youtube.com/watch?v=v1\",\"ie_key\":\"Youtube\",\"thumbnails\":[{\"url\":\"s\"},{\"url\":\"l\"}]}\n\n{\"id\":\"v2\"}\n";
        let results: Vec<_> = parse_entries(out)
            .unwrap()
            .into_iter()
            .map(Entry::into_search_result)
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].thumbnail, "l");
        assert_eq!(results[1].title, UNKNOWN_TITLE);
        assert_eq!(results[1].artist, UNKNOWN_ARTIST);
        assert_eq!(results[1].url, "https://www.youtube.com/watch?v=v2");
    }

    #[test]
    fn soundcloud_entries_keep_their_url() {
        let line = r#"{"id":"123","title":"t","uploader":"u","url":"https://soundcloud.com/u/t","extractor_key":"Soundcloud"}"#;
        let r = parse_entries(line).unwrap().remove(0).into_search_result();
        assert_eq!(r.source, TrackSource::Soundcloud);
        assert_eq!(r.url, "https://soundcloud.com/u/t");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_entries("nope"), Err(SourceError::Parse(_))));
    }

    #[tokio::test]
    async fn unsupported_search_sources_are_empty() {
        let source = YtDlpSource::new("/nonexistent/yt-dlp", Duration::from_secs(1));
        let results = source.search("x", SearchSource::Spotify, 5).await.unwrap();
        assert!(results.is_empty());
    }
}
