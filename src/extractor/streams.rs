//! Id-based adapter: stream metadata looked up by identifier
//!
//! Speaks the Piped `/streams/{id}` shape (`audioStreams`) and the Invidious
//! `/api/v1/videos/{id}` shape (`adaptiveFormats`). Both are decoded into the
//! same candidate list.

use crate::extractor::http::fetch_json;
use crate::extractor::models::{AudioCandidate, MediaReference, ProviderKind, ProviderSpec};
use crate::extractor::outcome::{AttemptOutcome, FailureReason};
use crate::extractor::traits::{attempt_timeout, ProviderAdapter};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tokio::time::Instant;
use tracing::debug;

/// Placeholder replaced by the identifier in an endpoint template
const ID_PLACEHOLDER: &str = "{id}";

pub struct StreamsAdapter {
    client: Client,
}

impl StreamsAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for StreamsAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::IdBased
    }

    async fn attempt(
        &self,
        reference: &MediaReference,
        spec: &ProviderSpec,
        deadline: Instant,
    ) -> AttemptOutcome {
        let Some(id) = reference.canonical_id.as_deref() else {
            return AttemptOutcome::failure(&spec.name, FailureReason::UnsupportedInput);
        };

        let url = streams_url(&spec.endpoint, id);
        debug!("[{}] GET {}", spec.name, url);

        let request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");

        match fetch_json::<StreamsResponse>(request, attempt_timeout(spec, deadline)).await {
            Ok(body) => AttemptOutcome::from_candidates(&spec.name, decode_streams(body, &spec.name)),
            Err(reason) => AttemptOutcome::failure(&spec.name, reason),
        }
    }
}

/// Build the request URL for `id`: fill the `{id}` placeholder, or append `/<id>`
pub fn streams_url(endpoint: &str, id: &str) -> String {
    if endpoint.contains(ID_PLACEHOLDER) {
        endpoint.replace(ID_PLACEHOLDER, id)
    } else {
        format!("{}/{}", endpoint.trim_end_matches('/'), id)
    }
}

// ============================================================
// Response shapes
// ============================================================

/// Metadata response; either list may be absent
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamsResponse {
    /// Piped: every entry is audio-only
    #[serde(default, deserialize_with = "null_as_empty")]
    pub audio_streams: Vec<StreamEntry>,
    /// Invidious: audio and video mixed, filtered by `type`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub adaptive_formats: Vec<StreamEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEntry {
    #[serde(default)]
    pub url: Option<String>,
    /// Bits per second, number or numeric string
    #[serde(default, deserialize_with = "lenient_u64")]
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Invidious puts the mime type (with codecs) here
    #[serde(default, rename = "type")]
    pub format_type: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
}

impl StreamEntry {
    fn mime(&self) -> Option<&str> {
        self.mime_type.as_deref().or(self.format_type.as_deref())
    }

    fn is_audio(&self) -> bool {
        self.mime()
            .map(|m| m.trim().to_ascii_lowercase().starts_with("audio/"))
            .unwrap_or(false)
    }

    fn into_candidate(self, provider: &str) -> Option<AudioCandidate> {
        let container = self
            .container
            .as_deref()
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .or_else(|| self.mime().and_then(container_from_mime));
        let url = self.url?;
        AudioCandidate::new(&url, bps_to_kbps(self.bitrate), container, provider)
    }
}

/// Normalize a decoded response into candidates.
///
/// `audioStreams` entries are taken as-is; `adaptiveFormats` entries only when
/// their mime type is `audio/*`. Entries without a valid URL are dropped.
pub fn decode_streams(body: StreamsResponse, provider: &str) -> Vec<AudioCandidate> {
    let piped = body.audio_streams.into_iter();
    let invidious = body.adaptive_formats.into_iter().filter(StreamEntry::is_audio);

    piped
        .chain(invidious)
        .filter_map(|entry| entry.into_candidate(provider))
        .collect()
}

/// Bits per second to kbps rounded to nearest; absent maps to 0 (unknown)
fn bps_to_kbps(bps: Option<u64>) -> u32 {
    bps.map(|b| ((b + 500) / 1000).min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

/// Container implied by a mime type such as `audio/webm; codecs="opus"`
fn container_from_mime(mime: &str) -> Option<String> {
    let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
    let container = match essence.as_str() {
        "audio/webm" => "webm",
        "audio/mp4" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        _ => return None,
    };
    Some(container.to_string())
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept a number or a numeric string; anything else maps to `None`
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
