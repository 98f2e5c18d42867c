use async_trait::async_trait;
use serde::Deserialize;

use super::{LyricsProvider, clean::is_useful};
use crate::protocol::models::LyricsData;

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    lyrics: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

pub struct LyristProvider {
    client: reqwest::Client,
}

impl LyristProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LyricsProvider for LyristProvider {
    fn name(&self) -> &'static str {
        "lyrist"
    }

    async fn load_lyrics(&self, title: &str, artist: &str) -> Option<LyricsData> {
        if artist.is_empty() {
            return None;
        }

        let url = format!(
            "https://lyrist.vercel.app/api/{}/{}",
            urlencoding::encode(title),
            urlencoding::encode(artist)
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
            title: body.title.unwrap_or_else(|| title.to_owned()),
            artist: body.artist.unwrap_or_else(|| artist.to_owned()),
            lyrics,
            thumbnail: body.image,
            source: "Lyrist".to_owned(),
            url: None,
        })
    }
}
