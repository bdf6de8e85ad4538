pub mod android;
pub mod common;
pub mod ios;
pub mod tv_embedded;
pub mod web;

pub use common::{ClientConfig, INNERTUBE_API};

/// A synthetic client identity. Each variant maps to one frozen payload
/// template in its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persona {
    Ios,
    Android,
    TvEmbedded,
    Web,
}

impl Persona {
    pub fn from_name(name: &str) -> Option<Persona> {
        match name.to_uppercase().as_str() {
            "IOS" => Some(Persona::Ios),
            "ANDROID" => Some(Persona::Android),
            "TV_EMBEDDED" | "TVEMBEDDED" => Some(Persona::TvEmbedded),
            "WEB" => Some(Persona::Web),
            _ => {
                tracing::warn!("Unknown persona: {}", name);
                None
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Persona::Ios => "ios",
            Persona::Android => "android",
            Persona::TvEmbedded => "tvEmbedded",
            Persona::Web => "web",
        }
    }

    pub fn config(&self) -> &'static ClientConfig {
        match self {
            Persona::Ios => &ios::CONFIG,
            Persona::Android => &android::CONFIG,
            Persona::TvEmbedded => &tv_embedded::CONFIG,
            Persona::Web => &web::CONFIG,
        }
    }

    /// Whether signed URLs from this persona must be repaired through the
    /// watch page's descrambler.
    pub fn requires_cipher(&self) -> bool {
        matches!(self, Persona::TvEmbedded | Persona::Web)
    }

    pub fn default_chain() -> Vec<Persona> {
        vec![Persona::Ios, Persona::Android]
    }

    pub fn fallback_chain() -> Vec<Persona> {
        vec![Persona::TvEmbedded]
    }

    /// Resolves configured persona names, skipping unknown entries; an
    /// empty outcome falls back to the default chain.
    pub fn resolve_chain(names: &[String]) -> Vec<Persona> {
        let mut chain = Vec::new();
        for name in names {
            if let Some(persona) = Persona::from_name(name) {
                if !chain.contains(&persona) {
                    chain.push(persona);
                }
            }
        }
        if chain.is_empty() {
            tracing::warn!("No valid personas configured, falling back to the default chain");
            chain = Persona::default_chain();
        }
        chain
    }
}

/// Media byte requests replay the UA of the persona that minted the URL;
/// the platform echoes the client name in the `c` query parameter.
pub fn user_agent_for_url(url: &str) -> Option<&'static str> {
    if !(url.contains("googlevideo.com") || url.contains("youtube.com")) {
        return None;
    }

    extract_param(url, "c=").and_then(|client| match client {
        "IOS" => Some(Persona::Ios.config().user_agent),
        "ANDROID" => Some(Persona::Android.config().user_agent),
        "TVHTML5_SIMPLY_EMBEDDED_PLAYER" => Some(Persona::TvEmbedded.config().user_agent),
        "WEB" => Some(Persona::Web.config().user_agent),
        _ => None,
    })
}

fn extract_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let query_start = url.find('?')?;
    let query = &url[query_start + 1..];

    for part in query.split('&') {
        if let Some(val) = part.strip_prefix(key) {
            return Some(val.split('#').next().unwrap_or(val));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for persona in [
            Persona::Ios,
            Persona::Android,
            Persona::TvEmbedded,
            Persona::Web,
        ] {
            assert_eq!(Persona::from_name(persona.name()), Some(persona));
        }
        assert_eq!(Persona::from_name("betamax"), None);
    }

    #[test]
    fn chain_resolution_skips_unknown_and_dedupes() {
        let chain = Persona::resolve_chain(&[
            "web".to_string(),
            "betamax".to_string(),
            "WEB".to_string(),
            "ios".to_string(),
        ]);
        assert_eq!(chain, vec![Persona::Web, Persona::Ios]);

        let chain = Persona::resolve_chain(&["betamax".to_string()]);
        assert_eq!(chain, Persona::default_chain());
    }

    #[test]
    fn cipher_capability_matches_table() {
        assert!(!Persona::Ios.requires_cipher());
        assert!(!Persona::Android.requires_cipher());
        assert!(Persona::TvEmbedded.requires_cipher());
        assert!(Persona::Web.requires_cipher());
    }

    #[test]
    fn media_ua_follows_the_minting_persona() {
        let url = "https://rr3.googlevideo.com/videoplayback?expire=1&c=IOS&itag=140";
        assert_eq!(
            user_agent_for_url(url),
            Some(Persona::Ios.config().user_agent)
        );
        assert_eq!(user_agent_for_url("https://elsewhere.example/file?c=IOS"), None);
    }
}
