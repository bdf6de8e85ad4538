use serde_json::{Value, json};

pub const INNERTUBE_API: &str = "https://www.youtube.com";

/// Frozen payload template for one synthetic client identity. Field names
/// and values are embedded bit-exact into the player endpoint body; this
/// table is the sole touch-point when the platform shifts its
/// expectations.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_name: &'static str,
    pub client_version: &'static str,
    pub client_id: &'static str,
    pub user_agent: &'static str,
    pub api_key: &'static str,
    pub os_name: Option<&'static str>,
    pub os_version: Option<&'static str>,
    pub device_make: Option<&'static str>,
    pub device_model: Option<&'static str>,
    pub platform: Option<&'static str>,
    pub android_sdk_version: Option<&'static str>,
    pub hl: &'static str,
    pub gl: &'static str,
    pub utc_offset_minutes: Option<i32>,
    pub third_party_embed_url: Option<&'static str>,
}

pub const BASE_CLIENT_CONFIG: ClientConfig = ClientConfig {
    client_name: "",
    client_version: "",
    client_id: "",
    user_agent: "",
    api_key: "",
    os_name: None,
    os_version: None,
    device_make: None,
    device_model: None,
    platform: None,
    android_sdk_version: None,
    hl: "en",
    gl: "US",
    utc_offset_minutes: None,
    third_party_embed_url: None,
};

impl ClientConfig {
    pub fn build_context(&self) -> Value {
        let mut client = json!({
            "clientName": self.client_name,
            "clientVersion": self.client_version,
            "userAgent": self.user_agent,
            "hl": self.hl,
            "gl": self.gl,
        });

        if let Some(obj) = client.as_object_mut() {
            if let Some(v) = self.os_name {
                obj.insert("osName".to_string(), v.into());
            }
            if let Some(v) = self.os_version {
                obj.insert("osVersion".to_string(), v.into());
            }
            if let Some(v) = self.device_make {
                obj.insert("deviceMake".to_string(), v.into());
            }
            if let Some(v) = self.device_model {
                obj.insert("deviceModel".to_string(), v.into());
            }
            if let Some(v) = self.platform {
                obj.insert("platform".to_string(), v.into());
            }
            if let Some(v) = self.android_sdk_version {
                obj.insert("androidSdkVersion".to_string(), v.into());
            }
            if let Some(v) = self.utc_offset_minutes {
                obj.insert("utcOffsetMinutes".to_string(), v.into());
            }
        }

        let mut context = json!({
            "client": client,
            "user": { "lockedSafetyMode": false },
            "request": { "useSsl": true }
        });

        if let Some(url) = self.third_party_embed_url {
            if let Some(obj) = context.as_object_mut() {
                obj.insert("thirdParty".to_string(), json!({ "embedUrl": url }));
            }
        }

        context
    }

    /// Full player endpoint body for one request: the frozen template plus
    /// the video id, consent flags, and an optional signature timestamp.
    pub fn player_body(&self, video_id: &str, signature_timestamp: Option<u32>) -> Value {
        let mut body = json!({
            "context": self.build_context(),
            "videoId": video_id,
            "contentCheckOk": true,
            "racyCheckOk": true
        });

        if let Some(sts) = signature_timestamp {
            if let Some(obj) = body.as_object_mut() {
                obj.insert(
                    "playbackContext".to_string(),
                    json!({
                        "contentPlaybackContext": {
                            "signatureTimestamp": sts
                        }
                    }),
                );
            }
        }

        body
    }

    pub fn player_endpoint(&self) -> String {
        format!(
            "{}/youtubei/v1/player?key={}&prettyPrint=false",
            INNERTUBE_API, self.api_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::Persona;

    #[test]
    fn context_embeds_template_fields_verbatim() {
        let config = Persona::Ios.config();
        let context = config.build_context();
        assert_eq!(context["client"]["clientName"], "IOS");
        assert_eq!(context["client"]["deviceMake"], "Apple");
        assert_eq!(context["user"]["lockedSafetyMode"], false);
        assert!(context.get("thirdParty").is_none());
    }

    #[test]
    fn embedded_persona_carries_third_party_url() {
        let context = Persona::TvEmbedded.config().build_context();
        assert_eq!(context["thirdParty"]["embedUrl"], "https://www.youtube.com/tv");
    }

    #[test]
    fn player_body_injects_video_id_and_sts() {
        let body = Persona::Web.config().player_body("dQw4w9WgXcQ", Some(19834));
        assert_eq!(body["videoId"], "dQw4w9WgXcQ");
        assert_eq!(body["contentCheckOk"], true);
        assert_eq!(
            body["playbackContext"]["contentPlaybackContext"]["signatureTimestamp"],
            19834
        );

        let body = Persona::Ios.config().player_body("dQw4w9WgXcQ", None);
        assert!(body.get("playbackContext").is_none());
    }
}
