use super::messages::{ExtractRequest, ExtractResponse, HealthResponse};
use super::AppState;
use crate::extractor::models::{AudioCandidate, MediaReference};
use crate::extractor::outcome::{AttemptOutcome, ResolutionResult};
use crate::utils::error::ResolverError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info, warn};

/// Successful resolution of one input
#[derive(Debug, Clone)]
pub struct Resolved {
    pub chosen: AudioCandidate,
    pub video_id: Option<String>,
    pub attempts: Vec<AttemptOutcome>,
}

/// Validate `input` and run the engine on it.
///
/// Input without an identifier is only accepted when it is a web URL and at
/// least one url-based provider is configured.
pub async fn resolve_input(state: &AppState, input: &str) -> Result<Resolved, ResolverError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ResolverError::InvalidInput("Missing url".to_string()));
    }

    let reference = MediaReference::new(trimmed);
    if reference.canonical_id.is_none() && !(reference.is_web_url() && state.url_negotiable()) {
        return Err(ResolverError::InvalidInput("Invalid URL".to_string()));
    }

    // Resolution runs on its own task so a panicking adapter surfaces as a 500
    let engine = state.engine.clone();
    let providers = state.providers.clone();
    let budget = state.budget;
    let task_reference = reference.clone();
    let result = tokio::spawn(async move {
        engine.resolve(&task_reference, &providers, budget).await
    })
    .await
    .map_err(|e| ResolverError::Internal(format!("resolution task failed: {}", e)))?;

    match result {
        ResolutionResult::Resolved { chosen, attempts } => Ok(Resolved {
            chosen,
            video_id: reference.canonical_id,
            attempts,
        }),
        ResolutionResult::Failed { attempts } => Err(ResolverError::AllProvidersFailed { attempts }),
    }
}

/// `POST /api/extract`
pub async fn extract(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractResponse>, ResolverError> {
    let Json(request) =
        payload.map_err(|e| ResolverError::InvalidInput(format!("Invalid JSON body: {}", e.body_text())))?;

    info!("Extract request for {:?}", request.url);
    let resolved = resolve_input(&state, &request.url).await?;

    Ok(Json(ExtractResponse::Success {
        stream_url: resolved.chosen.url,
        video_id: resolved.video_id,
        provider: resolved.chosen.source_provider,
    }))
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        providers: state.providers.len(),
    })
}

impl ResolverError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::AllProvidersFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to HTTP callers; the per-provider detail stays in the logs
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(message) => message.clone(),
            Self::AllProvidersFailed { attempts } => {
                format!("No stream found ({} provider attempt(s))", attempts.len())
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ResolverError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match status {
            StatusCode::BAD_REQUEST => info!("Rejected request: {}", self),
            StatusCode::SERVICE_UNAVAILABLE => warn!("{}", self),
            _ => error!("Request failed: {}", self),
        }
        let body = ExtractResponse::Error {
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
