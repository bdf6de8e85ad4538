use std::sync::Arc;

use crate::common::errors::{Error, Result};
use crate::common::http::HttpClient;
use crate::parsers::player::{PlayerResponse, parse_player_response};
use crate::parsers::watch_page::WatchPage;
use crate::parsers::{dash, hls};
use crate::personas::Persona;
use crate::streams::{StreamDescriptor, VideoId};

const WATCH_PAGE_COOKIES: &str = "PREF=hl=en&tz=UTC; CONSENT=YES+cb.20210328-17-p0.en+FX+100";

/// Player-endpoint and manifest access for one (video, persona) pair.
pub struct PlayerClient {
    http: Arc<HttpClient>,
}

impl PlayerClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// One persona query against the internal player endpoint. A response
    /// with no stream array but a DASH/HLS URL is still valid; failure is
    /// only declared when the payload itself is unparsable.
    pub async fn get_player_response(
        &self,
        video_id: &VideoId,
        persona: Persona,
        signature_timestamp: Option<u32>,
    ) -> Result<PlayerResponse> {
        let config = persona.config();
        let body = config.player_body(video_id.as_str(), signature_timestamp);

        let response = self
            .http
            .post_json(
                &config.player_endpoint(),
                &[
                    ("User-Agent", config.user_agent),
                    ("X-YouTube-Client-Name", config.client_id),
                    ("X-YouTube-Client-Version", config.client_version),
                    ("X-Goog-Api-Format-Version", "2"),
                ],
                &body,
            )
            .await?;

        if !response.is_object() {
            return Err(Error::Parse {
                what: "player response",
            });
        }

        tracing::debug!(
            "player response for {} via {}: playable={}",
            video_id,
            persona.name(),
            response["playabilityStatus"]["status"] == "OK"
        );
        Ok(parse_player_response(&response))
    }

    pub async fn get_watch_page(&self, video_id: &VideoId) -> Result<WatchPage> {
        let url = format!(
            "https://www.youtube.com/watch?v={}&bpctr=9999999999&has_verified=1",
            video_id
        );
        let html = self
            .http
            .get(
                &url,
                &[
                    ("Cookie", WATCH_PAGE_COOKIES),
                    ("Accept-Language", "en-US,en;q=0.9"),
                ],
            )
            .await?;
        Ok(WatchPage::new(html))
    }

    pub async fn get_dash_descriptors(&self, url: &str) -> Result<Vec<StreamDescriptor>> {
        let xml = self.http.get(url, &[]).await?;
        dash::parse_dash_manifest(&xml)
    }

    pub async fn get_hls_descriptors(&self, url: &str) -> Result<Vec<StreamDescriptor>> {
        let text = self.http.get(url, &[]).await?;
        Ok(hls::parse_hls_manifest(&text, url))
    }
}
