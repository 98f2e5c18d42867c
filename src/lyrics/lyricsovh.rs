use async_trait::async_trait;
use serde::Deserialize;

use super::{LyricsProvider, clean::is_useful};
use crate::protocol::models::LyricsData;

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    lyrics: Option<String>,
}

pub struct LyricsOvhProvider {
    client: reqwest::Client,
}

impl LyricsOvhProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LyricsProvider for LyricsOvhProvider {
    fn name(&self) -> &'static str {
        "lyricsovh"
    }

    async fn load_lyrics(&self, title: &str, artist: &str) -> Option<LyricsData> {
        if artist.is_empty() {
            return None;
        }

        let url = format!(
            "https://api.lyrics.ovh/v1/{}/{}",
            urlencoding::encode(artist),
            urlencoding::encode(title)
        );
        let resp = self.client.get(url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }

        let body: Response = resp.json().await.ok()?;
        let lyrics = body.lyrics?.trim().to_owned();
        if !is_useful(&lyrics) {
            return None;
        }

        Some(LyricsData {
            title: title.to_owned(),
            artist: artist.to_owned(),
            lyrics,
            thumbnail: None,
            source: "Lyrics.ovh".to_owned(),
            url: None,
        })
    }
}
