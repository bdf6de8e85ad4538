use serde::Serialize;

/// Video quality bucket derived from the platform's quality labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoQuality {
    Tiny,
    Small,
    Medium,
    Large,
    Hd720,
    Hd1080,
    Hd1440,
    Hd2160,
    Hd2880,
    Hd4320,
}

impl VideoQuality {
    /// Maps a quality label such as "720p" or "1080p60 HDR" by its leading
    /// digits. Unknown labels land in the nearest bucket below.
    pub fn from_label(label: &str) -> VideoQuality {
        let height: u32 = label
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0);
        match height {
            0..=176 => VideoQuality::Tiny,
            177..=288 => VideoQuality::Small,
            289..=432 => VideoQuality::Medium,
            433..=576 => VideoQuality::Large,
            577..=864 => VideoQuality::Hd720,
            865..=1200 => VideoQuality::Hd1080,
            1201..=1800 => VideoQuality::Hd1440,
            1801..=2400 => VideoQuality::Hd2160,
            2401..=3200 => VideoQuality::Hd2880,
            _ => VideoQuality::Hd4320,
        }
    }

    /// Canonical 16:9 resolution for the bucket, used when the descriptor
    /// carries no dimensions of its own.
    pub fn default_resolution(&self) -> (u32, u32) {
        match self {
            VideoQuality::Tiny => (256, 144),
            VideoQuality::Small => (426, 240),
            VideoQuality::Medium => (640, 360),
            VideoQuality::Large => (854, 480),
            VideoQuality::Hd720 => (1280, 720),
            VideoQuality::Hd1080 => (1920, 1080),
            VideoQuality::Hd1440 => (2560, 1440),
            VideoQuality::Hd2160 => (3840, 2160),
            VideoQuality::Hd2880 => (5120, 2880),
            VideoQuality::Hd4320 => (7680, 4320),
        }
    }
}

/// Frozen per-itag defaults for the handful of muxed renditions whose
/// metadata the platform habitually omits. Label only; dimensions and
/// framerate come from the quality bucket.
pub fn itag_quality_label(itag: i64) -> Option<&'static str> {
    match itag {
        17 => Some("144p"),
        18 => Some("360p"),
        22 => Some("720p"),
        36 => Some("240p"),
        37 => Some("1080p"),
        38 => Some("3072p"),
        43 => Some("360p"),
        44 => Some("480p"),
        45 => Some("720p"),
        46 => Some("1080p"),
        59 => Some("480p"),
        78 => Some("480p"),
        91 => Some("144p"),
        92 => Some("240p"),
        93 => Some("360p"),
        94 => Some("480p"),
        95 => Some("720p"),
        96 => Some("1080p"),
        _ => None,
    }
}
