use super::quality::VideoQuality;
use super::{AudioTrack, VideoId};

/// Fields every rendition carries, regardless of shape.
#[derive(Debug, Clone)]
pub struct StreamBase {
    pub video_id: VideoId,
    pub itag: i64,
    pub url: String,
    pub container: String,
    /// Strictly positive; descriptors without a resolvable size are
    /// discarded during normalization.
    pub file_size: u64,
    pub bitrate: u64,
    pub codecs: String,
}

/// Fields only video-bearing renditions carry.
#[derive(Debug, Clone)]
pub struct VideoTrack {
    pub quality_label: String,
    pub quality: VideoQuality,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// One normalized rendition of a video.
#[derive(Debug, Clone)]
pub enum StreamInfo {
    MuxedProgressive {
        base: StreamBase,
        video: VideoTrack,
    },
    VideoOnlyAdaptive {
        base: StreamBase,
        video: VideoTrack,
        fragments: Option<Vec<String>>,
    },
    AudioOnlyAdaptive {
        base: StreamBase,
        audio_track: Option<AudioTrack>,
        fragments: Option<Vec<String>>,
    },
    HlsMuxed {
        base: StreamBase,
        video: VideoTrack,
    },
    HlsVideoOnly {
        base: StreamBase,
        video: VideoTrack,
    },
    HlsAudio {
        base: StreamBase,
        audio_track: Option<AudioTrack>,
    },
}

/// Manifest uniqueness key: itag alone for video, (itag, track id) for
/// audio so multi-language renditions survive deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub itag: i64,
    pub audio_track: Option<String>,
}

impl StreamInfo {
    pub fn base(&self) -> &StreamBase {
        match self {
            StreamInfo::MuxedProgressive { base, .. }
            | StreamInfo::VideoOnlyAdaptive { base, .. }
            | StreamInfo::AudioOnlyAdaptive { base, .. }
            | StreamInfo::HlsMuxed { base, .. }
            | StreamInfo::HlsVideoOnly { base, .. }
            | StreamInfo::HlsAudio { base, .. } => base,
        }
    }

    pub fn itag(&self) -> i64 {
        self.base().itag
    }

    pub fn url(&self) -> &str {
        &self.base().url
    }

    pub fn file_size(&self) -> u64 {
        self.base().file_size
    }

    pub fn bitrate(&self) -> u64 {
        self.base().bitrate
    }

    pub fn video(&self) -> Option<&VideoTrack> {
        match self {
            StreamInfo::MuxedProgressive { video, .. }
            | StreamInfo::VideoOnlyAdaptive { video, .. }
            | StreamInfo::HlsMuxed { video, .. }
            | StreamInfo::HlsVideoOnly { video, .. } => Some(video),
            _ => None,
        }
    }

    pub fn audio_track(&self) -> Option<&AudioTrack> {
        match self {
            StreamInfo::AudioOnlyAdaptive { audio_track, .. }
            | StreamInfo::HlsAudio { audio_track, .. } => audio_track.as_ref(),
            _ => None,
        }
    }

    pub fn fragments(&self) -> Option<&[String]> {
        match self {
            StreamInfo::VideoOnlyAdaptive { fragments, .. }
            | StreamInfo::AudioOnlyAdaptive { fragments, .. } => fragments.as_deref(),
            _ => None,
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(
            self,
            StreamInfo::AudioOnlyAdaptive { .. } | StreamInfo::HlsAudio { .. }
        )
    }

    pub fn is_video_only(&self) -> bool {
        matches!(
            self,
            StreamInfo::VideoOnlyAdaptive { .. } | StreamInfo::HlsVideoOnly { .. }
        )
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self,
            StreamInfo::HlsMuxed { .. }
                | StreamInfo::HlsVideoOnly { .. }
                | StreamInfo::HlsAudio { .. }
        )
    }

    pub fn key(&self) -> StreamKey {
        let audio_track = if self.is_audio_only() {
            self.audio_track().and_then(|t| t.id.clone())
        } else {
            None
        };
        StreamKey {
            itag: self.itag(),
            audio_track,
        }
    }
}

/// Audio renditions tried first when picking a default track; opus at the
/// front, aac as the compatibility fallback.
pub const AUDIO_ITAG_PRIORITY: &[i64] = &[251, 250, 249, 140];

/// The deduplicated set of renditions for one video, in the order the
/// resolver accumulated them.
#[derive(Debug, Clone, Default)]
pub struct StreamManifest {
    streams: Vec<StreamInfo>,
}

impl StreamManifest {
    pub(crate) fn new(streams: Vec<StreamInfo>) -> Self {
        Self { streams }
    }

    pub fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    pub fn into_streams(self) -> Vec<StreamInfo> {
        self.streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter()
    }

    pub fn by_itag(&self, itag: i64) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.itag() == itag)
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.is_audio_only())
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.video().is_some())
    }

    /// Preferred audio rendition: priority itags first, then the highest
    /// bitrate audio-only stream.
    pub fn best_audio(&self) -> Option<&StreamInfo> {
        for &target in AUDIO_ITAG_PRIORITY {
            if let Some(s) = self.streams.iter().find(|s| s.itag() == target) {
                return Some(s);
            }
        }
        self.audio_streams().max_by_key(|s| s.bitrate())
    }

    /// Highest-quality video rendition, bitrate as the tiebreaker.
    pub fn best_video(&self) -> Option<&StreamInfo> {
        self.video_streams()
            .max_by_key(|s| (s.video().map(|v| v.quality), s.bitrate()))
    }
}

impl IntoIterator for StreamManifest {
    type Item = StreamInfo;
    type IntoIter = std::vec::IntoIter<StreamInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.streams.into_iter()
    }
}
