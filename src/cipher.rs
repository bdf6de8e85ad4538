use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::common::errors::{Error, Result};
use crate::common::http::HttpClient;
use crate::evaluator::ScriptEvaluator;
use crate::parsers::watch_page::{WatchPage, find_matching_brace};

static DESCRAMBLER_REGEX: OnceLock<Regex> = OnceLock::new();
static DESCRAMBLER_LEGACY_REGEX: OnceLock<Regex> = OnceLock::new();
static STS_REGEX: OnceLock<Regex> = OnceLock::new();

/// Per-call descrambling state: the extracted routine, the signature
/// timestamp, and the ciphertext cache. Single-owner; one vault exists per
/// resolution and needs no locking.
#[derive(Default)]
pub struct CipherVault {
    descrambler: Option<String>,
    signature_timestamp: Option<u32>,
    n_cache: HashMap<String, String>,
}

impl CipherVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.descrambler.is_some()
    }

    pub fn signature_timestamp(&self) -> Option<u32> {
        self.signature_timestamp
    }

    pub fn n_cache_len(&self) -> usize {
        self.n_cache.len()
    }

    /// Installs an already-extracted routine, bypassing the watch-page
    /// fetch. Intended for captured script snapshots.
    pub fn install_descrambler(&mut self, source: String) {
        self.descrambler = Some(source);
    }

    /// Fetches the base player script pointed at by the watch page and
    /// extracts the descrambling routine. Idempotent per vault.
    pub async fn load(&mut self, http: &HttpClient, watch_page: &WatchPage) -> Result<()> {
        if self.descrambler.is_some() {
            return Ok(());
        }

        let script_url = watch_page.player_script_url().ok_or(Error::Parse {
            what: "player script url",
        })?;
        tracing::debug!("fetching base player script: {}", script_url);
        let script = http.get(&script_url, &[]).await?;

        self.signature_timestamp = extract_signature_timestamp(&script);
        self.descrambler = Some(extract_descrambler(&script).ok_or(Error::DescramblerNotFound)?);
        Ok(())
    }

    /// Descrambles one `n` ciphertext, consulting the per-call cache
    /// before touching the evaluator.
    pub async fn descramble(&mut self, evaluator: &ScriptEvaluator, n: &str) -> Result<String> {
        if let Some(plain) = self.n_cache.get(n) {
            return Ok(plain.clone());
        }

        let descrambler = self.descrambler.as_deref().ok_or(Error::DescramblerNotFound)?;
        let plain = evaluator.run(descrambler, &[n]).await?;
        self.n_cache.insert(n.to_string(), plain.clone());
        Ok(plain)
    }
}

/// Scans the player script for the descrambling routine: an anonymous
/// function that splits its argument into a scratch array via
/// `slice(0,0)` and returns the joined result. This is a pattern, not a
/// literal; the platform rotates the surrounding names.
pub fn extract_descrambler(script: &str) -> Option<String> {
    let primary = DESCRAMBLER_REGEX.get_or_init(|| {
        Regex::new(
            r#"function\s*\(\s*([\w$]+)\s*\)\s*\{\s*var\s+[\w$]+\s*=\s*\1\.split\(\s*\1\.slice\(0,0\)\s*\)"#,
        )
        .unwrap()
    });
    let legacy = DESCRAMBLER_LEGACY_REGEX.get_or_init(|| {
        Regex::new(r#"function\s*\(\s*([\w$]+)\s*\)\s*\{\s*var\s+[\w$]+\s*=\s*\1\.split\(\s*""\s*\)"#)
            .unwrap()
    });

    let start = primary
        .find(script)
        .or_else(|| legacy.find(script))?
        .start();

    let candidate = &script[start..];
    let brace_offset = candidate.find('{')?;
    let body = find_matching_brace(&candidate[brace_offset..])?;
    let source = format!("{}{}", &candidate[..brace_offset], body);

    // The routine must produce the joined scratch array, otherwise we
    // matched an unrelated splitter.
    if !source.contains(".join(") {
        return None;
    }
    Some(source)
}

/// The signature timestamp the platform expects back in
/// `playbackContext`; also embedded in the player script.
pub fn extract_signature_timestamp(script: &str) -> Option<u32> {
    let re =
        STS_REGEX.get_or_init(|| Regex::new(r#"(?:signatureTimestamp|sts):(\d{4,6})"#).unwrap());
    re.captures(script).and_then(|caps| caps[1].parse().ok())
}

pub fn query_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let query = url.split('?').nth(1)?;
    for part in query.split('&') {
        if let Some((k, v)) = part.split_once('=') {
            if k == key {
                return Some(v);
            }
        }
    }
    None
}

/// Replaces the value of `key` in-place, leaving the rest of the URL
/// byte-identical.
pub fn set_query_param(url: &str, key: &str, value: &str) -> String {
    let Some(query_start) = url.find('?') else {
        return url.to_string();
    };
    let (prefix, query) = url.split_at(query_start + 1);

    let parts: Vec<String> = query
        .split('&')
        .map(|part| match part.split_once('=') {
            Some((k, _)) if k == key => format!("{k}={value}"),
            _ => part.to_string(),
        })
        .collect();

    format!("{}{}", prefix, parts.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trimmed to the shape of the real routine: scratch array from
    // slice(0,0), an interior transform table, joined result.
    const SCRIPT: &str = r#"var zta=function(h){return h.reverse()};
var Ona=function(a){var b=a.split(a.slice(0,0)),c=[174417725,function(d,e){e=(e%d.length+d.length)%d.length;d.splice(e,1)},b,null];c[3]=c;c[1](c[2],2);return b.join("")};
var sig={signatureTimestamp:19834};"#;

    #[test]
    fn descrambler_is_extracted_and_balanced() {
        let source = extract_descrambler(SCRIPT).unwrap();
        assert!(source.starts_with("function"));
        assert!(source.ends_with('}'));
        assert!(source.contains("a.split(a.slice(0,0))"));
        assert!(source.contains(r#"return b.join("")"#));
        // The next statement must not leak in.
        assert!(!source.contains("signatureTimestamp"));
    }

    #[test]
    fn splitters_without_join_are_rejected() {
        let script = r#"var f=function(a){var b=a.split(a.slice(0,0));return b.length};"#;
        assert!(extract_descrambler(script).is_none());
        assert!(extract_descrambler("no functions here").is_none());
    }

    #[test]
    fn signature_timestamp_is_scraped() {
        assert_eq!(extract_signature_timestamp(SCRIPT), Some(19834));
        assert_eq!(extract_signature_timestamp("sts:20001,"), Some(20001));
        assert_eq!(extract_signature_timestamp("nothing"), None);
    }

    #[test]
    fn query_params_read_and_replace() {
        let url = "https://host.example/videoplayback?itag=140&n=AbC123&sig=ok";
        assert_eq!(query_param(url, "n"), Some("AbC123"));
        assert_eq!(query_param(url, "missing"), None);

        let swapped = set_query_param(url, "n", "xyz");
        assert_eq!(
            swapped,
            "https://host.example/videoplayback?itag=140&n=xyz&sig=ok"
        );
        assert_eq!(set_query_param("https://host.example/plain", "n", "x"),
            "https://host.example/plain");
    }

    #[tokio::test]
    async fn vault_caches_descrambled_values() {
        use crate::configs::EvaluatorConfig;

        let mut vault = CipherVault::new();
        vault.install_descrambler(extract_descrambler(SCRIPT).unwrap());
        assert!(vault.is_loaded());

        let evaluator = ScriptEvaluator::new(&EvaluatorConfig::default());
        let first = vault.descramble(&evaluator, "abcdef").await.unwrap();
        let second = vault.descramble(&evaluator, "abcdef").await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first, "abcdef");
        assert_eq!(vault.n_cache_len(), 1);
    }
}
