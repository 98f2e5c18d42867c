use async_trait::async_trait;
use serde::Deserialize;

use super::{
    LyricsProvider,
    clean::{is_useful, strip_lrc_timestamps},
};
use crate::protocol::models::LyricsData;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    #[serde(default)]
    track_name: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    plain_lyrics: Option<String>,
    #[serde(default)]
    synced_lyrics: Option<String>,
}

impl SearchHit {
    /// Plain lyrics win; synced lyrics are used with their timestamps removed.
    fn text(&self) -> Option<String> {
        let plain = self
            .plain_lyrics
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned);
        plain.or_else(|| self.synced_lyrics.as_deref().map(strip_lrc_timestamps))
    }
}

pub struct LrcLibProvider {
    client: reqwest::Client,
}

impl LrcLibProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn pick(hits: Vec<SearchHit>, title: &str, artist: &str) -> Option<LyricsData> {
        let hit = hits.into_iter().find(|h| h.text().is_some())?;
        let lyrics = hit.text()?;
        if !is_useful(&lyrics) {
            return None;
        }

        Some(LyricsData {
            title: hit.track_name.unwrap_or_else(|| title.to_owned()),
            artist: hit.artist_name.unwrap_or_else(|| artist.to_owned()),
            lyrics,
            thumbnail: None,
            source: "LRClib".to_owned(),
            url: None,
        })
    }
}

#[async_trait]
impl LyricsProvider for LrcLibProvider {
    fn name(&self) -> &'static str {
        "lrclib"
    }

    fn supports_title_only(&self) -> bool {
        true
    }

    async fn load_lyrics(&self, title: &str, artist: &str) -> Option<LyricsData> {
        let mut params = vec![("track_name", title)];
        if !artist.is_empty() {
            params.push(("artist_name", artist));
        }

        let resp = self
            .client
            .get("https://lrclib.net/api/search")
            .query(&params)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }

        let hits: Vec<SearchHit> = resp.json().await.ok()?;
        Self::pick(hits, title, artist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(json: &str) -> Vec<SearchHit> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn prefers_plain_lyrics() {
        let h = hits(
            r#"[{"trackName":"T","artistName":"A","plainLyrics":"plain words that are long enough to count","syncedLyrics":"[00:01.00] synced"}]"#,
        );
        let data = LrcLibProvider::pick(h, "t", "a").unwrap();
        assert_eq!(data.lyrics, "plain words that are long enough to count");
        assert_eq!(data.title, "T");
        assert_eq!(data.source, "LRClib");
    }

    #[test]
    fn falls_back_to_synced_without_timestamps() {
        let h = hits(
            r#"[{"trackName":null},{"syncedLyrics":"[00:01.00] first synced line\n[00:02.50] second synced line"}]"#,
        );
        let data = LrcLibProvider::pick(h, "t", "a").unwrap();
        assert_eq!(data.lyrics, "first synced line\nsecond synced line");
        assert_eq!(data.title, "t");
    }

    #[test]
    fn too_short_is_not_found() {
        let h = hits(r#"[{"plainLyrics":"short"}]"#);
        assert!(LrcLibProvider::pick(h, "t", "a").is_none());
    }
}
