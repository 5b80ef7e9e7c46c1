//! Shared HTTP plumbing for provider adapters

use crate::extractor::outcome::FailureReason;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Build the pooled client shared by every adapter.
///
/// No client-wide timeout is set; each request carries its own slice of the
/// resolution budget.
pub fn build_client(user_agent: &str) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(5))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
}

/// Send one request and decode a JSON body of type `T`.
///
/// Maps every failure onto the attempt taxonomy: elapsed timeout,
/// connection/transport failure, non-2xx status, undecodable body.
pub async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<T, FailureReason> {
    if timeout.is_zero() {
        return Err(FailureReason::Timeout);
    }

    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(classify_error)?;

    let status = response.status();
    if !status.is_success() {
        debug!("Upstream answered HTTP {}", status);
        return Err(FailureReason::BadStatus(status.as_u16()));
    }

    let body = response.bytes().await.map_err(classify_error)?;
    serde_json::from_slice(&body).map_err(|e| FailureReason::Parse(e.to_string()))
}

fn classify_error(error: reqwest::Error) -> FailureReason {
    if error.is_timeout() {
        FailureReason::Timeout
    } else if error.is_decode() {
        FailureReason::Parse(error.to_string())
    } else {
        FailureReason::Transport(error.to_string())
    }
}
