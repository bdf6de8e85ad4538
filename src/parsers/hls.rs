use std::sync::OnceLock;

use regex::Regex;

use crate::streams::{AudioTrack, SourceKind, StreamDescriptor};

static ITAG_PATH_REGEX: OnceLock<Regex> = OnceLock::new();

/// Master-playlist scan, handling just enough of M3U8 for the platform's
/// live manifests: variant streams plus their alternate audio renditions.
pub fn parse_hls_manifest(text: &str, base_url: &str) -> Vec<StreamDescriptor> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut descriptors = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.starts_with("#EXT-X-MEDIA") {
            let type_ = extract_attr_str(line, "TYPE").unwrap_or_default();
            if type_ == "AUDIO" {
                if let Some(uri) = extract_attr_str(line, "URI") {
                    let url = resolve_url(base_url, &uri);
                    descriptors.push(StreamDescriptor {
                        itag: itag_from_url(&url).unwrap_or(0),
                        url,
                        container: "ts".to_string(),
                        acodec: Some("mp4a.40.2".to_string()),
                        vcodec: None,
                        bitrate: 0,
                        content_length: None,
                        width: None,
                        height: None,
                        quality_label: None,
                        fps: None,
                        fragments: None,
                        source: SourceKind::Hls,
                        audio_only: true,
                        video_only: false,
                        audio_track: Some(AudioTrack {
                            language: extract_attr_str(line, "LANGUAGE")
                                .or_else(|| extract_attr_str(line, "NAME")),
                            id: extract_attr_str(line, "GROUP-ID"),
                            is_default: extract_attr_str(line, "DEFAULT").as_deref() == Some("YES"),
                        }),
                    });
                }
            }
            i += 1;
        } else if line.starts_with("#EXT-X-STREAM-INF") {
            let bandwidth = extract_attr_u64(line, "BANDWIDTH").unwrap_or(0);
            let codecs = extract_attr_str(line, "CODECS").unwrap_or_default();
            let resolution = extract_attr_str(line, "RESOLUTION").and_then(|r| {
                let (w, h) = r.split_once('x')?;
                Some((w.parse().ok()?, h.parse().ok()?))
            });
            let fps = extract_attr_str(line, "FRAME-RATE")
                .and_then(|f| f.parse::<f64>().ok())
                .map(|f| f.round() as u32);

            let has_audio =
                codecs.contains("mp4a") || codecs.contains("opus") || codecs.contains("ac-3");
            let has_video = codecs.contains("avc1")
                || codecs.contains("hvc1")
                || codecs.contains("hev1")
                || codecs.contains("vp09")
                || codecs.contains("av01");

            let mut j = i + 1;
            while j < lines.len() && lines[j].starts_with('#') {
                j += 1;
            }
            if j < lines.len() && !lines[j].is_empty() {
                let url = resolve_url(base_url, lines[j]);
                let (acodec, vcodec) = split_variant_codecs(&codecs, has_audio, has_video);
                descriptors.push(StreamDescriptor {
                    itag: itag_from_url(&url).unwrap_or(0),
                    url,
                    container: "ts".to_string(),
                    acodec,
                    vcodec,
                    bitrate: bandwidth,
                    content_length: None,
                    width: resolution.map(|(w, _)| w),
                    height: resolution.map(|(_, h)| h),
                    quality_label: resolution.map(|(_, h)| format!("{h}p")),
                    fps,
                    fragments: None,
                    source: SourceKind::Hls,
                    audio_only: has_audio && !has_video,
                    video_only: has_video && !has_audio,
                    audio_track: None,
                });
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }

    descriptors
}

fn split_variant_codecs(
    codecs: &str,
    has_audio: bool,
    has_video: bool,
) -> (Option<String>, Option<String>) {
    let mut acodec = None;
    let mut vcodec = None;
    for codec in codecs.split(',').map(str::trim) {
        if codec.is_empty() {
            continue;
        }
        if has_audio && (codec.starts_with("mp4a") || codec.starts_with("opus") || codec.starts_with("ac-3")) {
            acodec.get_or_insert_with(|| codec.to_string());
        } else if has_video {
            vcodec.get_or_insert_with(|| codec.to_string());
        }
    }
    (acodec, vcodec)
}

/// Live URLs carry the itag as a path segment: `.../itag/96/...`.
fn itag_from_url(url: &str) -> Option<i64> {
    let re = ITAG_PATH_REGEX.get_or_init(|| Regex::new(r"/itag/(\d+)").unwrap());
    re.captures(url).and_then(|caps| caps[1].parse().ok())
}

pub(crate) fn extract_attr_u64(line: &str, key: &str) -> Option<u64> {
    extract_attr_str(line, key)?.parse().ok()
}

pub(crate) fn extract_attr_str(line: &str, key: &str) -> Option<String> {
    let key_eq = format!("{}=", key);
    // Attributes follow #TAG: or a comma
    let pos = line
        .find(&format!(":{}", key_eq))
        .map(|p| p + 1)
        .or_else(|| line.find(&format!(",{}", key_eq)).map(|p| p + 1))?;

    let rest = &line[pos + key_eq.len()..];

    if rest.starts_with('"') {
        let end = rest[1..].find('"')?;
        Some(rest[1..1 + end].to_string())
    } else {
        let end = rest.find(',').unwrap_or(rest.len());
        Some(rest[..end].trim().to_string())
    }
}

pub(crate) fn resolve_url(base: &str, maybe_relative: &str) -> String {
    if maybe_relative.starts_with("http://") || maybe_relative.starts_with("https://") {
        return maybe_relative.to_string();
    }

    // Strip query string and fragment from base before resolving.
    let base_clean = base.split('?').next().unwrap_or(base);
    let base_clean = base_clean.split('#').next().unwrap_or(base_clean);

    if maybe_relative.starts_with('/') {
        if let Some(scheme_end) = base_clean.find("://") {
            let host_start = scheme_end + 3;
            let host_end = base_clean[host_start..]
                .find('/')
                .map(|p| host_start + p)
                .unwrap_or(base_clean.len());
            return format!("{}{}", &base_clean[..host_end], maybe_relative);
        }
    }

    let base_dir = base_clean
        .rfind('/')
        .map(|i| &base_clean[..=i])
        .unwrap_or(base_clean);
    format!("{}{}", base_dir, maybe_relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = r#"#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID="234",NAME="English",LANGUAGE="en",DEFAULT=YES,URI="https://manifest.example/hls/itag/234/audio.m3u8"
#EXT-X-STREAM-INF:BANDWIDTH=1500000,CODECS="avc1.4d401f,mp4a.40.2",RESOLUTION=1280x720,FRAME-RATE=30
https://manifest.example/hls/itag/95/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=4000000,CODECS="avc1.640028",RESOLUTION=1920x1080,FRAME-RATE=60,AUDIO="234"
/hls/itag/96/index.m3u8
"#;

    #[test]
    fn variants_and_audio_media_become_descriptors() {
        let descriptors = parse_hls_manifest(MASTER, "https://manifest.example/master.m3u8");
        assert_eq!(descriptors.len(), 3);

        let audio = &descriptors[0];
        assert!(audio.audio_only);
        assert_eq!(audio.itag, 234);
        assert_eq!(audio.source, SourceKind::Hls);
        let track = audio.audio_track.as_ref().unwrap();
        assert_eq!(track.language.as_deref(), Some("en"));
        assert!(track.is_default);

        let muxed = &descriptors[1];
        assert_eq!(muxed.itag, 95);
        assert!(!muxed.audio_only && !muxed.video_only);
        assert_eq!(muxed.acodec.as_deref(), Some("mp4a.40.2"));
        assert_eq!(muxed.vcodec.as_deref(), Some("avc1.4d401f"));
        assert_eq!(muxed.height, Some(720));
        assert_eq!(muxed.fps, Some(30));

        let video = &descriptors[2];
        assert_eq!(video.itag, 96);
        assert!(video.video_only);
        assert_eq!(video.url, "https://manifest.example/hls/itag/96/index.m3u8");
    }

    #[test]
    fn quoted_and_bare_attributes_parse() {
        let line = r#"#EXT-X-STREAM-INF:BANDWIDTH=1500000,CODECS="avc1,mp4a",RESOLUTION=1280x720"#;
        assert_eq!(extract_attr_u64(line, "BANDWIDTH"), Some(1500000));
        assert_eq!(extract_attr_str(line, "CODECS").as_deref(), Some("avc1,mp4a"));
        assert_eq!(extract_attr_str(line, "RESOLUTION").as_deref(), Some("1280x720"));
        assert_eq!(extract_attr_str(line, "MISSING"), None);
    }

    #[test]
    fn relative_urls_resolve_against_base() {
        assert_eq!(
            resolve_url("https://host.example/a/b/master.m3u8?tok=1", "media.m3u8"),
            "https://host.example/a/b/media.m3u8"
        );
        assert_eq!(
            resolve_url("https://host.example/a/b/master.m3u8", "/c/media.m3u8"),
            "https://host.example/c/media.m3u8"
        );
    }
}
