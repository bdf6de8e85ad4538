use quick_xml::Reader;
use quick_xml::events::Event;

use crate::common::errors::{Error, Result};
use crate::streams::{SourceKind, StreamDescriptor};

/// Walks a DASH MPD and emits one adaptive descriptor per
/// `<Representation>`. Only the attributes the platform actually populates
/// are read; everything else is skipped.
pub fn parse_dash_manifest(xml: &str) -> Result<Vec<StreamDescriptor>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut descriptors = Vec::new();
    let mut adaptation_mime = String::new();
    let mut current: Option<PartialRepresentation> = None;
    let mut in_base_url = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|_| Error::Parse { what: "dash manifest" })?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    b"AdaptationSet" => {
                        adaptation_mime.clear();
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"mimeType" {
                                if let Ok(v) = attr.unescape_value() {
                                    adaptation_mime = v.to_string();
                                }
                            }
                        }
                    }
                    b"Representation" => {
                        let mut rep = PartialRepresentation::default();
                        for attr in e.attributes().flatten() {
                            let Ok(value) = attr.unescape_value() else {
                                continue;
                            };
                            match attr.key.as_ref() {
                                b"id" => rep.itag = value.parse().ok(),
                                b"codecs" => rep.codecs = Some(value.to_string()),
                                b"bandwidth" => rep.bitrate = value.parse().unwrap_or(0),
                                b"width" => rep.width = value.parse().ok(),
                                b"height" => rep.height = value.parse().ok(),
                                b"frameRate" => rep.fps = value.parse().ok(),
                                b"mimeType" => rep.mime = Some(value.to_string()),
                                _ => {}
                            }
                        }
                        if !empty {
                            current = Some(rep);
                        }
                    }
                    b"BaseURL" => {
                        if !empty {
                            in_base_url = current.is_some();
                        }
                    }
                    b"SegmentURL" => {
                        if let Some(rep) = current.as_mut() {
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() == b"media" {
                                    if let Ok(v) = attr.unescape_value() {
                                        rep.fragments.push(v.to_string());
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                if in_base_url {
                    if let (Some(rep), Ok(text)) = (current.as_mut(), t.unescape()) {
                        rep.base_url.push_str(text.trim());
                    }
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"BaseURL" => in_base_url = false,
                b"Representation" => {
                    if let Some(rep) = current.take() {
                        if let Some(d) = rep.into_descriptor(&adaptation_mime) {
                            descriptors.push(d);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(descriptors)
}

#[derive(Default)]
struct PartialRepresentation {
    itag: Option<i64>,
    codecs: Option<String>,
    bitrate: u64,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    mime: Option<String>,
    base_url: String,
    fragments: Vec<String>,
}

impl PartialRepresentation {
    fn into_descriptor(self, adaptation_mime: &str) -> Option<StreamDescriptor> {
        let itag = self.itag?;
        if self.base_url.is_empty() {
            return None;
        }

        let mime = self.mime.as_deref().unwrap_or(adaptation_mime);
        let is_audio = mime.starts_with("audio/") || self.width.is_none();
        let container = mime
            .split('/')
            .nth(1)
            .unwrap_or("mp4")
            .split(';')
            .next()
            .unwrap_or("mp4")
            .to_string();

        Some(StreamDescriptor {
            itag,
            url: self.base_url,
            container,
            acodec: if is_audio { self.codecs.clone() } else { None },
            vcodec: if is_audio { None } else { self.codecs },
            bitrate: self.bitrate,
            content_length: None,
            width: self.width,
            height: self.height,
            quality_label: self.height.map(|h| format!("{h}p")),
            fps: self.fps,
            fragments: if self.fragments.is_empty() {
                None
            } else {
                Some(self.fragments)
            },
            source: SourceKind::Adaptive,
            audio_only: is_audio,
            video_only: !is_audio,
            audio_track: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MPD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:DASH:schema:MPD:2011" mediaPresentationDuration="PT212S">
  <Period>
    <AdaptationSet mimeType="audio/mp4" subsegmentAlignment="true">
      <Representation id="140" codecs="mp4a.40.2" bandwidth="129000">
        <BaseURL>https://host.example/videoplayback/id/140/</BaseURL>
        <SegmentList>
          <SegmentURL media="sq/0"/>
          <SegmentURL media="sq/1"/>
        </SegmentList>
      </Representation>
    </AdaptationSet>
    <AdaptationSet mimeType="video/mp4" subsegmentAlignment="true">
      <Representation id="136" codecs="avc1.4d401f" bandwidth="1200000" width="1280" height="720" frameRate="30">
        <BaseURL>https://host.example/videoplayback/id/136/</BaseURL>
      </Representation>
      <Representation id="999"/>
    </AdaptationSet>
  </Period>
</MPD>"#;

    #[test]
    fn representations_become_adaptive_descriptors() {
        let descriptors = parse_dash_manifest(MPD).unwrap();
        assert_eq!(descriptors.len(), 2);

        let audio = &descriptors[0];
        assert_eq!(audio.itag, 140);
        assert!(audio.audio_only);
        assert_eq!(audio.acodec.as_deref(), Some("mp4a.40.2"));
        assert_eq!(audio.container, "mp4");
        assert_eq!(audio.source, SourceKind::Adaptive);
        assert_eq!(audio.fragments.as_ref().unwrap().len(), 2);

        let video = &descriptors[1];
        assert_eq!(video.itag, 136);
        assert!(video.video_only);
        assert_eq!(video.width, Some(1280));
        assert_eq!(video.fps, Some(30));
        assert_eq!(video.quality_label.as_deref(), Some("720p"));
        assert!(video.fragments.is_none());
    }

    #[test]
    fn truncated_document_yields_nothing() {
        let descriptors = parse_dash_manifest("<MPD><Period><AdaptationSet>").unwrap();
        assert!(descriptors.is_empty());
    }
}
