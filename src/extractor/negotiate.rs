//! Url-based adapter: conversion services negotiated by URL and output format
//!
//! Two request styles share one reply decoder:
//! - endpoints containing `{url}` are quick converters: the target URL is
//!   percent-encoded into the placeholder and fetched with GET;
//! - any other endpoint receives a POST of
//!   `{url, downloadMode: "audio", audioFormat}`.
//!
//! The reply carries either a direct `url` or a `picker` list of alternatives.

use crate::extractor::http::fetch_json;
use crate::extractor::models::{AudioCandidate, MediaReference, ProviderKind, ProviderSpec};
use crate::extractor::outcome::{AttemptOutcome, FailureReason};
use crate::extractor::traits::{attempt_timeout, ProviderAdapter};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// Placeholder replaced by the percent-encoded target URL in a GET endpoint
const URL_PLACEHOLDER: &str = "{url}";

pub struct NegotiateAdapter {
    client: Client,
    target_container: String,
}

impl NegotiateAdapter {
    pub fn new(client: Client, target_container: &str) -> Self {
        Self {
            client,
            target_container: target_container.to_ascii_lowercase(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for NegotiateAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::UrlBased
    }

    async fn attempt(
        &self,
        reference: &MediaReference,
        spec: &ProviderSpec,
        deadline: Instant,
    ) -> AttemptOutcome {
        let Some(target) = reference.target_url() else {
            return AttemptOutcome::failure(&spec.name, FailureReason::UnsupportedInput);
        };

        let request = if spec.endpoint.contains(URL_PLACEHOLDER) {
            let url = converter_url(&spec.endpoint, &target);
            debug!("[{}] GET {}", spec.name, url);
            self.client.get(url)
        } else {
            debug!("[{}] POST {} for {}", spec.name, spec.endpoint, target);
            let payload = NegotiateRequest {
                url: &target,
                download_mode: "audio",
                audio_format: &self.target_container,
            };
            self.client.post(&spec.endpoint).json(&payload)
        };
        let request = request.header(reqwest::header::ACCEPT, "application/json");

        match fetch_json::<NegotiateResponse>(request, attempt_timeout(spec, deadline)).await {
            Ok(body) => AttemptOutcome::from_candidates(
                &spec.name,
                decode_negotiated(body, &spec.name, &self.target_container),
            ),
            Err(reason) => AttemptOutcome::failure(&spec.name, reason),
        }
    }
}

/// Fill the `{url}` placeholder of a GET converter endpoint
pub fn converter_url(endpoint: &str, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    endpoint.replace(URL_PLACEHOLDER, &encoded)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NegotiateRequest<'a> {
    url: &'a str,
    download_mode: &'a str,
    audio_format: &'a str,
}

// ============================================================
// Response shapes
// ============================================================

/// Conversion response; every field optional
#[derive(Debug, Default, Deserialize)]
pub struct NegotiateResponse {
    /// `tunnel`, `redirect`, `picker`, `error`, ...
    #[serde(default)]
    pub status: Option<String>,
    /// Set by converters answering `{success, url}`
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub picker: Option<Vec<PickerEntry>>,
    /// Shared audio track offered alongside a picker
    #[serde(default)]
    pub audio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PickerEntry {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Normalize a conversion response into candidates.
///
/// An explicit error status or `success: false` yields nothing. A direct
/// `url` wins over everything else; otherwise the shared `audio` track comes
/// first, followed by the picker entries. Bitrate is always 0: these services
/// do not report it.
pub fn decode_negotiated(
    body: NegotiateResponse,
    provider: &str,
    requested_container: &str,
) -> Vec<AudioCandidate> {
    let rejected = body
        .status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("error"))
        .unwrap_or(false)
        || body.success == Some(false);
    if rejected {
        debug!("[{}] upstream reported status={:?}", provider, body.status);
        return Vec::new();
    }

    if let Some(url) = body.url.as_deref() {
        let container = body
            .filename
            .as_deref()
            .and_then(extension_of)
            .or_else(|| Some(requested_container.to_string()));
        if let Some(candidate) = AudioCandidate::new(url, 0, container, provider) {
            return vec![candidate];
        }
    }

    // A dedicated audio track outranks picker clips, which all carry bitrate 0
    let audio = body.audio.as_deref().and_then(|audio| {
        AudioCandidate::new(audio, 0, Some(requested_container.to_string()), provider)
    });

    let picker = body
        .picker
        .unwrap_or_default()
        .into_iter()
        .filter(|entry| !matches!(entry.kind.as_deref(), Some("photo")))
        .filter_map(|entry| entry.url)
        .filter_map(|url| {
            let container = extension_of(&url);
            AudioCandidate::new(&url, 0, container, provider)
        });

    audio.into_iter().chain(picker).collect()
}

/// Lower-cased file extension of a filename or URL path, if it looks like one
fn extension_of(name: &str) -> Option<String> {
    let parsed = url::Url::parse(name).ok();
    let path = match parsed.as_ref() {
        Some(url) => url.path(),
        None => name.split(['?', '#']).next()?,
    };
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let plausible = (2..=4).contains(&ext.len()) && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    plausible.then_some(ext)
}
