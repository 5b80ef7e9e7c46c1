//! Media identifier extraction

use once_cell::sync::Lazy;
use regex::Regex;

/// Length of a canonical identifier
pub const ID_LEN: usize = 11;

/// Host prefix: `youtube.com` (any subdomain, nocookie variant) or `youtu.be`,
/// at the start of input or after `/` or `.`
const HOST: &str = r"(?:^|[/.])(?:youtube(?:-nocookie)?\.com|youtu\.be)";

/// Identifier capture followed by a non-identifier character or the end, so
/// that `watch?v=<11 chars>junk` does not yield a truncated id
const ID_CAPTURE: &str = r"([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)";

/// Recognized URL shapes on YouTube hosts; the identifier is capture group 1.
static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"{}/watch/?\?(?:[^#]*&)?v={}", HOST, ID_CAPTURE),
        format!(r"(?:^|[/.])youtu\.be/{}", ID_CAPTURE),
        format!(r"{}/(?:shorts|embed|v|live)/{}", HOST, ID_CAPTURE),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Extract the canonical identifier from arbitrary input.
///
/// Accepts watch, `youtu.be`, shorts, embed, `/v/` and live links on YouTube
/// hosts, or a bare 11-character identifier. Anything else, including the same
/// path shapes on other hosts, yields `None`.
pub fn extract_id(input: &str) -> Option<String> {
    let trimmed = input.trim();

    for pattern in ID_PATTERNS.iter() {
        if let Some(id) = pattern.captures(trimmed).and_then(|caps| caps.get(1)) {
            return Some(id.as_str().to_string());
        }
    }

    if is_bare_id(trimmed) {
        return Some(trimmed.to_string());
    }

    None
}

/// True for exactly 11 characters from `[A-Za-z0-9_-]`
pub fn is_bare_id(value: &str) -> bool {
    value.len() == ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
