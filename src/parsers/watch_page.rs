use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

static JS_URL_REGEX: OnceLock<Regex> = OnceLock::new();
static VIDEO_ID_REGEX: OnceLock<Regex> = OnceLock::new();

/// The HTML watch page, held verbatim. Field extraction is lazy; the page
/// is only scanned when the resolver actually needs a field.
pub struct WatchPage {
    html: String,
}

impl WatchPage {
    pub fn new(html: String) -> Self {
        Self { html }
    }

    /// The inline player response, bounded by the `ytInitialPlayerResponse`
    /// sentinel and a matching close brace.
    pub fn player_response(&self) -> Option<Value> {
        let start = self.html.find("ytInitialPlayerResponse")?;
        let rest = &self.html[start + "ytInitialPlayerResponse".len()..];
        let rest = rest.trim_start().strip_prefix('=')?.trim_start();
        let json = find_matching_brace(rest)?;
        serde_json::from_str(json).ok()
    }

    /// Absolute URL of the base player script.
    pub fn player_script_url(&self) -> Option<String> {
        let re = JS_URL_REGEX
            .get_or_init(|| Regex::new(r#""(?:jsUrl|PLAYER_JS_URL)"\s*:\s*"(/s/player/[^"]+)""#).unwrap());
        if let Some(caps) = re.captures(&self.html) {
            return Some(format!("https://www.youtube.com{}", &caps[1]));
        }

        // Older pages only carry the player hash in asset paths.
        self.html.split("/s/player/").skip(1).find_map(|part| {
            let hash: String = part
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            if hash.len() >= 6 {
                Some(format!(
                    "https://www.youtube.com/s/player/{hash}/player_ias.vflset/en_US/base.js"
                ))
            } else {
                None
            }
        })
    }

    /// The video id echoed back inside the page.
    pub fn video_id(&self) -> Option<String> {
        let re = VIDEO_ID_REGEX
            .get_or_init(|| Regex::new(r#""videoId"\s*:\s*"([0-9A-Za-z_-]{11})""#).unwrap());
        re.captures(&self.html).map(|caps| caps[1].to_string())
    }
}

/// Returns the balanced `{...}` prefix of `s`, respecting strings and
/// escapes.
pub(crate) fn find_matching_brace(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, ch) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
