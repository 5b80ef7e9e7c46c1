//! Error handling for audio-resolver

use crate::extractor::outcome::{summarize_attempts, AttemptOutcome};
use thiserror::Error;

/// Main error type for audio-resolver
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No stream found ({} provider attempt(s): {})", .attempts.len(), summarize_attempts(.attempts))]
    AllProvidersFailed { attempts: Vec<AttemptOutcome> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    /// Caller-side problem (bad input) rather than upstream or internal failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
