use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static VIDEO_ID_PATTERN: OnceLock<Regex> = OnceLock::new();

fn video_id_pattern() -> &'static Regex {
    VIDEO_ID_PATTERN
        .get_or_init(|| Regex::new(r"v=([A-Za-z0-9_-]{11})").expect("video id pattern is valid"))
}

/// Identifier of the video the panel is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Extract the 11-character id from a watch-page URL, or `None` when
    /// the URL is not a video page.
    pub fn from_url(url: &str) -> Option<Self> {
        video_id_pattern()
            .captures(url)
            .map(|captures| Self(captures[1].to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_watch_url() {
        let id = VideoId::from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn keeps_id_when_more_params_follow() {
        let id = VideoId::from_url("https://www.youtube.com/watch?v=abc_DEF1234&t=42s").unwrap();
        assert_eq!(id.as_str(), "abc_DEF1234");
    }

    #[test]
    fn rejects_non_video_urls() {
        assert!(VideoId::from_url("https://www.youtube.com/feed/subscriptions").is_none());
        assert!(VideoId::from_url("https://www.youtube.com/watch?v=tooshort").is_none());
    }
}
