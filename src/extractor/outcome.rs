//! Attempt and resolution outcomes

use crate::extractor::models::AudioCandidate;
use serde::Serialize;
use thiserror::Error;

/// Why a single provider attempt produced nothing usable
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("input not supported by this provider")]
    UnsupportedInput,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out")]
    Timeout,

    #[error("bad status: HTTP {0}")]
    BadStatus(u16),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no audio candidates")]
    NoCandidates,

    #[error("budget exhausted before attempt")]
    BudgetExhausted,

    #[error("abandoned after another provider succeeded")]
    Abandoned,
}

/// Result of trying one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success {
        provider: String,
        candidates: Vec<AudioCandidate>,
    },
    Failure {
        provider: String,
        reason: FailureReason,
    },
}

impl AttemptOutcome {
    pub fn failure(provider: &str, reason: FailureReason) -> Self {
        Self::Failure {
            provider: provider.to_string(),
            reason,
        }
    }

    /// Wrap decoded candidates, folding an empty list into `NoCandidates`
    pub fn from_candidates(provider: &str, candidates: Vec<AudioCandidate>) -> Self {
        if candidates.is_empty() {
            Self::failure(provider, FailureReason::NoCandidates)
        } else {
            Self::Success {
                provider: provider.to_string(),
                candidates,
            }
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            Self::Success { provider, .. } | Self::Failure { provider, .. } => provider,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason, .. } => Some(reason),
        }
    }
}

/// Final value returned by the resolution engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionResult {
    Resolved {
        chosen: AudioCandidate,
        attempts: Vec<AttemptOutcome>,
    },
    Failed {
        attempts: Vec<AttemptOutcome>,
    },
}

impl ResolutionResult {
    pub fn attempts(&self) -> &[AttemptOutcome] {
        match self {
            Self::Resolved { attempts, .. } | Self::Failed { attempts } => attempts,
        }
    }

    pub fn chosen(&self) -> Option<&AudioCandidate> {
        match self {
            Self::Resolved { chosen, .. } => Some(chosen),
            Self::Failed { .. } => None,
        }
    }

    /// True when the run stopped because the deadline passed, not because
    /// every provider actively failed
    pub fn ran_out_of_time(&self) -> bool {
        self.attempts()
            .iter()
            .any(|a| a.reason() == Some(&FailureReason::BudgetExhausted))
    }
}

/// One-line summary of an attempt list for logs and error messages
pub fn summarize_attempts(attempts: &[AttemptOutcome]) -> String {
    attempts
        .iter()
        .map(|attempt| match attempt {
            AttemptOutcome::Success { provider, candidates } => {
                format!("{}: {} candidate(s)", provider, candidates.len())
            }
            AttemptOutcome::Failure { provider, reason } => format!("{}: {}", provider, reason),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
