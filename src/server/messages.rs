use serde::{Deserialize, Serialize};

/// Body of `POST /api/extract`
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub url: String,
}

/// Body of every `/api/extract` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExtractResponse {
    Success {
        stream_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video_id: Option<String>,
        provider: String,
    },
    Error {
        message: String,
    },
}

/// Body of `GET /api/health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub providers: usize,
}
