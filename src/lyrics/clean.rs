use std::sync::LazyLock;

use regex::Regex;

/// Shorter results are treated as "not found".
pub const MIN_LYRICS_LEN: usize = 30;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
}

static TITLE_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\((?:official|music|lyrics?|audio|video)[^)]*\)",
        r"(?i)\((?:mv|m/v)\)",
        r"(?i)\[(?:official|music|lyrics?|audio|video)[^\]]*\]",
        r"(?i)\[mv\]",
        r"\|.*$",
        r"(?i)\(\s*(?:ft|feat)\.[^)]*\)",
        r"(?i)\b(?:ft|feat)\..*$",
        r"(?i)-\s*Topic$",
        r"\s*\([^)]*\)\s*$",
        r"\s*\[[^\]]*\]\s*$",
    ])
});

static ARTIST_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)-\s*Topic$",
        r"(?i)VEVO$",
        r"(?i)Official$",
        r"\s*\([^)]*\)\s*",
    ])
});

static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());
static TITLE_SEPARATOR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[-–—]").ok());
static ARTIST_SEPARATOR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:,|&|×|\sx\s|\sand\s)\s*").ok());
static LRC_TIMESTAMP: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[\d{1,2}:\d{2}(?:[.:]\d{2,3})?\]").ok());

fn collapse(text: &str) -> String {
    match WHITESPACE.as_ref() {
        Some(re) => re.replace_all(text, " ").trim().to_owned(),
        None => text.trim().to_owned(),
    }
}

fn strip(text: &str, patterns: &[Regex]) -> String {
    let mut out = text.to_owned();
    for re in patterns {
        out = re.replace_all(&out, "").into_owned();
    }
    collapse(&out)
}

fn first_part(text: &str, separator: &Option<Regex>) -> String {
    let head = match separator {
        Some(re) => re.split(text).next().unwrap_or(text),
        None => text,
    };
    collapse(head)
}

/// Drops video decorations such as "(Official Video)", "[MV]" and
/// featured-artist tails.
pub fn clean_title(title: &str) -> String {
    strip(title, &TITLE_NOISE)
}

/// Drops channel decorations such as "- Topic" and "VEVO".
pub fn clean_artist(artist: &str) -> String {
    strip(artist, &ARTIST_NOISE)
}

/// Title up to the first dash.
pub fn simplify_title(title: &str) -> String {
    first_part(title, &TITLE_SEPARATOR)
}

/// First credited artist only.
pub fn simplify_artist(artist: &str) -> String {
    first_part(artist, &ARTIST_SEPARATOR)
}

pub fn strip_lrc_timestamps(lyrics: &str) -> String {
    let text = match LRC_TIMESTAMP.as_ref() {
        Some(re) => re.replace_all(lyrics, "").into_owned(),
        None => lyrics.to_owned(),
    };
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

pub fn is_useful(lyrics: &str) -> bool {
    lyrics.trim().chars().count() >= MIN_LYRICS_LEN
}
