use crate::extractor::models::{MediaReference, ProviderKind, ProviderSpec};
use crate::extractor::outcome::AttemptOutcome;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Core trait for all provider adapters
///
/// An adapter knows how to build one request for an upstream kind and how to
/// decode that upstream's response into candidates. It never retries and never
/// returns an error: every failure is folded into the `AttemptOutcome`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Upstream request shape this adapter speaks
    fn kind(&self) -> ProviderKind;

    /// Issue exactly one request to `spec`, bounded by the attempt timeout and `deadline`
    async fn attempt(
        &self,
        reference: &MediaReference,
        spec: &ProviderSpec,
        deadline: Instant,
    ) -> AttemptOutcome;
}

/// Time allowed for one attempt: the provider's own timeout capped by what is
/// left of the global budget
pub fn attempt_timeout(spec: &ProviderSpec, deadline: Instant) -> Duration {
    spec.per_attempt_timeout
        .min(deadline.saturating_duration_since(Instant::now()))
}
