//! Data structures shared by the adapters, the engine and the selector

use crate::extractor::id::extract_id;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Canonical watch URL used when only a bare identifier is known
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Immutable reference to the media item a caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub raw_input: String,
    pub canonical_id: Option<String>,
}

impl MediaReference {
    /// Build a reference from user input, parsing the identifier once
    pub fn new(input: &str) -> Self {
        Self {
            raw_input: input.to_string(),
            canonical_id: extract_id(input),
        }
    }

    /// True when the raw input is an absolute http(s) URL
    pub fn is_web_url(&self) -> bool {
        is_web_url(self.raw_input.trim())
    }

    /// URL handed to url-based providers.
    ///
    /// The raw input when it is already a web URL, otherwise the canonical
    /// watch URL rebuilt from the identifier.
    pub fn target_url(&self) -> Option<String> {
        let trimmed = self.raw_input.trim();
        if is_web_url(trimmed) {
            return Some(trimmed.to_string());
        }
        self.canonical_id
            .as_ref()
            .map(|id| format!("{}{}", WATCH_URL_PREFIX, id))
    }
}

/// Request shape of an upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Stream metadata looked up by identifier (GET, id in path)
    IdBased,
    /// Conversion service fed the full URL plus the desired output (POST)
    UrlBased,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdBased => write!(f, "id-based"),
            Self::UrlBased => write!(f, "url-based"),
        }
    }
}

/// Static configuration entry for one upstream provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    #[serde(
        rename = "timeout_ms",
        with = "duration_ms",
        default = "default_attempt_timeout"
    )]
    pub per_attempt_timeout: Duration,
    #[serde(default)]
    pub priority: u32,
}

impl ProviderSpec {
    pub fn new(name: &str, kind: ProviderKind, endpoint: &str, per_attempt_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            kind,
            endpoint: endpoint.to_string(),
            per_attempt_timeout,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Serde helper storing a `Duration` as integer milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// One normalized, directly playable audio stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioCandidate {
    pub url: String,
    /// Bitrate in kbps, 0 when upstream did not report one
    pub bitrate_kbps: u32,
    /// Container such as `webm`, `m4a`, `mp3`; `None` when unknown
    pub container: Option<String>,
    pub source_provider: String,
}

impl AudioCandidate {
    /// Build a candidate if `url` is an absolute http(s) URL
    pub fn new(
        url: &str,
        bitrate_kbps: u32,
        container: Option<String>,
        source_provider: &str,
    ) -> Option<Self> {
        let url = url.trim();
        if !is_web_url(url) {
            return None;
        }
        Some(Self {
            url: url.to_string(),
            bitrate_kbps,
            container,
            source_provider: source_provider.to_string(),
        })
    }

    pub fn is_playable(&self) -> bool {
        is_web_url(&self.url)
    }
}

impl fmt::Display for AudioCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} kbps, {}) via {}",
            self.url,
            self.bitrate_kbps,
            self.container.as_deref().unwrap_or("unknown"),
            self.source_provider
        )
    }
}

fn is_web_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}
