use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::common::errors::{Error, Result};

pub mod info;
pub mod quality;

pub use info::{StreamBase, StreamInfo, StreamKey, StreamManifest, VideoTrack};
pub use quality::VideoQuality;

static VIDEO_ID_REGEX: OnceLock<Regex> = OnceLock::new();

/// Opaque, validated 11-character video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn parse(id: &str) -> Result<Self> {
        let re = VIDEO_ID_REGEX.get_or_init(|| Regex::new(r"^[0-9A-Za-z_-]{11}$").unwrap());
        if re.is_match(id) {
            Ok(Self(id.to_string()))
        } else {
            Err(Error::InvalidVideoId { id: id.to_string() })
        }
    }

    /// Accepts a bare id or any of the common watch URL shapes.
    pub fn from_input(input: &str) -> Result<Self> {
        let candidate = if input.contains("v=") {
            input
                .split("v=")
                .nth(1)
                .unwrap_or(input)
                .split('&')
                .next()
                .unwrap_or(input)
        } else if input.contains("youtu.be/") {
            strip_path_id(input, "youtu.be/")
        } else if input.contains("/live/") {
            strip_path_id(input, "/live/")
        } else if input.contains("/shorts/") {
            strip_path_id(input, "/shorts/")
        } else {
            input
        };
        Self::parse(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

fn strip_path_id<'a>(input: &'a str, marker: &str) -> &'a str {
    input
        .split(marker)
        .nth(1)
        .unwrap_or(input)
        .split('?')
        .next()
        .unwrap_or(input)
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery mode a descriptor was reported through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Progressive,
    Adaptive,
    Hls,
}

/// Audio rendition descriptor, present on multi-language streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    pub language: Option<String>,
    pub id: Option<String>,
    pub is_default: bool,
}

/// Raw per-rendition metadata as reported by the platform, before
/// normalization. Lives only for the duration of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub itag: i64,
    pub url: String,
    pub container: String,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    pub bitrate: u64,
    pub content_length: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality_label: Option<String>,
    pub fps: Option<u32>,
    pub fragments: Option<Vec<String>>,
    pub source: SourceKind,
    pub audio_only: bool,
    pub video_only: bool,
    pub audio_track: Option<AudioTrack>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_id_parses() {
        assert!(VideoId::parse("dQw4w9WgXcQ").is_ok());
        assert!(VideoId::parse("a-b_c-d_e-f").is_ok());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(VideoId::parse("").is_err());
        assert!(VideoId::parse("short").is_err());
        assert!(VideoId::parse("dQw4w9WgXcQQ").is_err());
        assert!(VideoId::parse("dQw4w9WgXc!").is_err());
    }

    #[test]
    fn id_is_extracted_from_urls() {
        let id = VideoId::from_input("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=1s").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");

        let id = VideoId::from_input("https://youtu.be/dQw4w9WgXcQ?si=xyz").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");

        let id = VideoId::from_input("https://www.youtube.com/shorts/dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");

        let id = VideoId::from_input("https://www.youtube.com/live/dQw4w9WgXcQ?feature=share").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }
}
