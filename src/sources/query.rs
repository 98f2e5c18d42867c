use std::sync::LazyLock;

use regex::Regex;

static VIDEO_ID_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?:youtube\.com/watch\?(?:[^#]*&)?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#/]+)")
            .expect("valid regex"),
        Regex::new(r"youtube\.com/shorts/([^&\n?#/]+)").expect("valid regex"),
    ]
});

static PLAYLIST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube\.com/playlist\?(?:[^#]*&)?list=([^&\n#]+)").expect("valid regex"));

/// What a user-supplied query refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// A single YouTube video, normalised to its watch URL.
    Video(String),
    Playlist(String),
    /// Some other http(s) URL handed to the resolver as is.
    Url(String),
    /// Free text.
    Search(String),
}

pub fn extract_video_id(url: &str) -> Option<&str> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Rewrites any recognised YouTube video link (watch, youtu.be, embed,
/// shorts) to the canonical watch URL. Other input is returned unchanged.
pub fn normalize_youtube_url(url: &str) -> String {
    match extract_video_id(url) {
        Some(id) => watch_url(id),
        None => url.to_owned(),
    }
}

fn is_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}

pub fn classify(query: &str) -> QueryKind {
    let query = query.trim();
    if let Some(id) = extract_video_id(query) {
        return QueryKind::Video(watch_url(id));
    }
    if PLAYLIST_PATTERN.is_match(query) {
        return QueryKind::Playlist(query.to_owned());
    }
    if is_url(query) {
        return QueryKind::Url(query.to_owned());
    }
    QueryKind::Search(query.to_owned())
}
