use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::streams::{AudioTrack, SourceKind, StreamDescriptor};

static MIME_REGEX: OnceLock<Regex> = OnceLock::new();

/// Parsed result of one persona query. Best-effort: unknown fields are
/// ignored, a missing playability block means "not playable", missing
/// format arrays mean "no streams".
#[derive(Debug, Clone, Default)]
pub struct PlayerResponse {
    pub is_playable: bool,
    /// Raw playability status token, e.g. "OK" or "LOGIN_REQUIRED".
    pub status: String,
    pub playability_error: Option<String>,
    pub preview_video_id: Option<String>,
    pub dash_manifest_url: Option<String>,
    pub hls_manifest_url: Option<String>,
    pub descriptors: Vec<StreamDescriptor>,
}

pub fn parse_player_response(body: &Value) -> PlayerResponse {
    let playability = body.get("playabilityStatus");
    let status = playability
        .and_then(|p| p.get("status"))
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN");
    let reason = playability
        .and_then(|p| p.get("reason"))
        .and_then(|r| r.as_str())
        .map(|r| r.to_string());
    let preview_video_id = playability
        .and_then(|p| p.get("errorScreen"))
        .and_then(|e| e.get("playerLegacyDesktopYpcTrailerRenderer"))
        .and_then(|t| t.get("trailerVideoId"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());

    let streaming = body.get("streamingData");
    let dash_manifest_url = streaming
        .and_then(|s| s.get("dashManifestUrl"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());
    let hls_manifest_url = streaming
        .and_then(|s| s.get("hlsManifestUrl"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());

    let mut descriptors = Vec::new();
    if let Some(formats) = streaming
        .and_then(|s| s.get("formats"))
        .and_then(|v| v.as_array())
    {
        for format in formats {
            if let Some(d) = descriptor_from_format(format, SourceKind::Progressive) {
                descriptors.push(d);
            }
        }
    }
    if let Some(formats) = streaming
        .and_then(|s| s.get("adaptiveFormats"))
        .and_then(|v| v.as_array())
    {
        for format in formats {
            if let Some(d) = descriptor_from_format(format, SourceKind::Adaptive) {
                descriptors.push(d);
            }
        }
    }

    PlayerResponse {
        is_playable: status == "OK",
        status: status.to_string(),
        playability_error: reason,
        preview_video_id,
        dash_manifest_url,
        hls_manifest_url,
        descriptors,
    }
}

/// One `formats`/`adaptiveFormats` entry. Returns `None` when no URL can
/// be recovered; everything else is best-effort.
fn descriptor_from_format(format: &Value, source: SourceKind) -> Option<StreamDescriptor> {
    let itag = format.get("itag").and_then(|v| v.as_i64())?;
    let url = format
        .get("url")
        .and_then(|u| u.as_str())
        .map(|u| u.to_string())
        .or_else(|| {
            let cipher = format
                .get("signatureCipher")
                .or_else(|| format.get("cipher"))
                .and_then(|c| c.as_str())?;
            decode_signature_cipher(cipher).map(|(url, _sig)| url)
        })?;

    let mime = format
        .get("mimeType")
        .and_then(|m| m.as_str())
        .unwrap_or("");
    let (is_audio_mime, container, codec_list) = split_mime(mime);

    let (acodec, vcodec) = classify_codecs(&codec_list, is_audio_mime);

    let audio_track = format.get("audioTrack").map(|track| AudioTrack {
        language: track
            .get("displayName")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string()),
        id: track
            .get("id")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string()),
        is_default: track
            .get("audioIsDefault")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    });

    Some(StreamDescriptor {
        itag,
        url,
        container,
        audio_only: acodec.is_some() && vcodec.is_none(),
        video_only: vcodec.is_some() && acodec.is_none(),
        acodec,
        vcodec,
        bitrate: format
            .get("bitrate")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        content_length: format
            .get("contentLength")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok()),
        width: format.get("width").and_then(|v| v.as_u64()).map(|v| v as u32),
        height: format.get("height").and_then(|v| v.as_u64()).map(|v| v as u32),
        quality_label: format
            .get("qualityLabel")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string()),
        fps: format.get("fps").and_then(|v| v.as_u64()).map(|v| v as u32),
        fragments: None,
        source,
        audio_track,
    })
}

/// `video/mp4; codecs="avc1.4d401f, mp4a.40.2"` -> (false, "mp4", [codecs]).
fn split_mime(mime: &str) -> (bool, String, Vec<String>) {
    let re = MIME_REGEX.get_or_init(|| {
        Regex::new(r#"^(audio|video)/([^;]+)(?:;\s*codecs="([^"]*)")?"#).unwrap()
    });
    match re.captures(mime) {
        Some(caps) => {
            let is_audio = &caps[1] == "audio";
            let container = caps[2].trim().to_string();
            let codecs = caps
                .get(3)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            (is_audio, container, codecs)
        }
        None => (false, String::new(), Vec::new()),
    }
}

fn is_audio_codec(codec: &str) -> bool {
    codec.starts_with("mp4a")
        || codec.starts_with("opus")
        || codec.starts_with("vorbis")
        || codec.starts_with("ac-3")
        || codec.starts_with("ec-3")
}

fn classify_codecs(codecs: &[String], audio_mime: bool) -> (Option<String>, Option<String>) {
    let mut acodec = None;
    let mut vcodec = None;
    for codec in codecs {
        if is_audio_codec(codec) {
            acodec.get_or_insert_with(|| codec.clone());
        } else {
            vcodec.get_or_insert_with(|| codec.clone());
        }
    }
    // Audio mime with an unrecognized codec token is still audio.
    if audio_mime && acodec.is_none() {
        acodec = vcodec.take();
    }
    (acodec, vcodec)
}

/// Recovers the plain URL (and the raw signature) out of a form-encoded
/// `signatureCipher`/`cipher` blob.
pub fn decode_signature_cipher(cipher_str: &str) -> Option<(String, Option<String>)> {
    let mut url = None;
    let mut sig = None;

    for part in cipher_str.split('&') {
        if let Some((k, v)) = part.split_once('=') {
            let decoded = urlencoding::decode(v).ok()?.to_string();
            match k {
                "url" => url = Some(decoded),
                "s" => sig = Some(decoded),
                _ => {}
            }
        }
    }

    url.map(|u| (u, sig))
}
