//! Bounded-time, multi-provider resolution engine
//!
//! Providers are grouped into tiers by request shape, ordered within each tier
//! (by priority or per-call shuffle) and cut to a bounded subset. Attempts run
//! one after another (or in small raced batches when `fan_out > 1`) under one
//! global deadline. The first provider that yields candidates wins; every other
//! provider gets an entry in the attempt list, including the ones the deadline
//! prevented from running.

use crate::extractor::models::{AudioCandidate, MediaReference, ProviderKind, ProviderSpec};
use crate::extractor::negotiate::NegotiateAdapter;
use crate::extractor::outcome::{summarize_attempts, AttemptOutcome, FailureReason, ResolutionResult};
use crate::extractor::selector::{select, SelectionPolicy};
use crate::extractor::streams::StreamsAdapter;
use crate::extractor::traits::ProviderAdapter;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Order of providers inside one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierOrdering {
    /// Ascending `priority`, ties in configuration order
    Priority,
    /// Fresh shuffle on every call among providers of equal `priority`;
    /// lower priorities still run first. Spreads load across instances.
    #[default]
    Shuffled,
}

/// Engine policy
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Tier order; kinds not listed run after the listed ones
    pub tier_order: Vec<ProviderKind>,
    pub ordering: TierOrdering,
    /// At most this many providers are tried per tier
    pub max_per_tier: usize,
    /// Providers of one tier raced concurrently (1 = sequential)
    pub fan_out: usize,
    pub selection: SelectionPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tier_order: vec![ProviderKind::UrlBased, ProviderKind::IdBased],
            ordering: TierOrdering::Shuffled,
            max_per_tier: 3,
            fan_out: 1,
            selection: SelectionPolicy::HighestBitrate,
        }
    }
}

/// Resolution engine holding the adapter registry.
///
/// Holds no per-call state, so one instance can serve concurrent calls.
pub struct ResolutionEngine {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    options: EngineOptions,
}

impl ResolutionEngine {
    /// Create an engine with no adapters registered
    pub fn new(options: EngineOptions) -> Self {
        Self {
            adapters: HashMap::new(),
            options,
        }
    }

    /// Create an engine with the id-based and url-based adapters sharing `client`
    pub fn with_default_adapters(options: EngineOptions, client: Client, target_container: &str) -> Self {
        Self::new(options)
            .with_adapter(Arc::new(StreamsAdapter::new(client.clone())))
            .with_adapter(Arc::new(NegotiateAdapter::new(client, target_container)))
    }

    /// Register (or replace) the adapter for its kind
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Tiers in execution order, each already ordered and bounded
    pub fn plan<'a, R: Rng + ?Sized>(
        &self,
        providers: &'a [ProviderSpec],
        rng: &mut R,
    ) -> Vec<Vec<&'a ProviderSpec>> {
        let mut kinds: Vec<ProviderKind> = Vec::new();
        let configured = self.options.tier_order.iter().copied();
        for kind in configured.chain(providers.iter().map(|p| p.kind)) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        let limit = self.options.max_per_tier.max(1);
        kinds
            .into_iter()
            .map(|kind| {
                let mut tier: Vec<&ProviderSpec> =
                    providers.iter().filter(|p| p.kind == kind).collect();
                match self.options.ordering {
                    TierOrdering::Priority => tier.sort_by_key(|p| p.priority),
                    TierOrdering::Shuffled => {
                        // Stable sort keeps the shuffled order inside each priority band
                        tier.shuffle(rng);
                        tier.sort_by_key(|p| p.priority);
                    }
                }
                tier.truncate(limit);
                tier
            })
            .filter(|tier| !tier.is_empty())
            .collect()
    }

    /// Resolve `reference` within `budget`, shuffling with the thread-local RNG
    pub async fn resolve(
        &self,
        reference: &MediaReference,
        providers: &[ProviderSpec],
        budget: Duration,
    ) -> ResolutionResult {
        let plan = self.plan(providers, &mut rand::thread_rng());
        self.execute(reference, plan, budget).await
    }

    /// Same as [`resolve`](Self::resolve) with a caller-supplied RNG
    pub async fn resolve_with_rng<R: Rng + ?Sized>(
        &self,
        reference: &MediaReference,
        providers: &[ProviderSpec],
        budget: Duration,
        rng: &mut R,
    ) -> ResolutionResult {
        let plan = self.plan(providers, rng);
        self.execute(reference, plan, budget).await
    }

    async fn execute(
        &self,
        reference: &MediaReference,
        plan: Vec<Vec<&ProviderSpec>>,
        budget: Duration,
    ) -> ResolutionResult {
        let span = info_span!(
            "resolve",
            request_id = %Uuid::new_v4(),
            media_id = reference.canonical_id.as_deref().unwrap_or("-"),
        );
        self.run_plan(reference, plan, budget).instrument(span).await
    }

    async fn run_plan(
        &self,
        reference: &MediaReference,
        plan: Vec<Vec<&ProviderSpec>>,
        budget: Duration,
    ) -> ResolutionResult {
        let deadline = Instant::now() + budget;
        let total: usize = plan.iter().map(Vec::len).sum();
        let mut attempts: Vec<AttemptOutcome> = Vec::with_capacity(total);
        let batch_size = self.options.fan_out.max(1);

        debug!(
            "Resolving {:?} across {} tier(s), {} provider(s), budget {:?}",
            reference.raw_input,
            plan.len(),
            total,
            budget
        );

        let mut pending = plan.iter().flat_map(|tier| tier.chunks(batch_size));
        while let Some(batch) = pending.next() {
            if Instant::now() >= deadline {
                let skipped = batch.iter().chain(pending.by_ref().flatten());
                for spec in skipped {
                    attempts.push(AttemptOutcome::failure(&spec.name, FailureReason::BudgetExhausted));
                }
                break;
            }

            let outcomes = self.run_batch(reference, batch, deadline).await;
            let winner = outcomes.iter().find_map(|outcome| match outcome {
                AttemptOutcome::Success { candidates, .. } => select(candidates, self.options.selection).cloned(),
                AttemptOutcome::Failure { .. } => None,
            });
            attempts.extend(outcomes);

            if let Some(chosen) = winner {
                info!("Resolved via {}: {}", chosen.source_provider, chosen);
                return ResolutionResult::Resolved { chosen, attempts };
            }
        }

        warn!(
            "Resolution failed after {} attempt(s): {}",
            attempts.len(),
            summarize_attempts(&attempts)
        );
        ResolutionResult::Failed { attempts }
    }

    /// Run one batch; with more than one provider the first success cancels the rest
    async fn run_batch(
        &self,
        reference: &MediaReference,
        batch: &[&ProviderSpec],
        deadline: Instant,
    ) -> Vec<AttemptOutcome> {
        if let [spec] = batch {
            return vec![self.run_one(reference, spec, deadline).await];
        }

        let mut slots: Vec<Option<AttemptOutcome>> = vec![None; batch.len()];
        {
            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .enumerate()
                .map(|(index, spec)| async move { (index, self.run_one(reference, spec, deadline).await) })
                .collect();

            while let Some((index, outcome)) = in_flight.next().await {
                let won = outcome.is_success();
                slots[index] = Some(outcome);
                if won {
                    break;
                }
            }
        }

        slots
            .into_iter()
            .zip(batch)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| AttemptOutcome::failure(&spec.name, FailureReason::Abandoned))
            })
            .collect()
    }

    async fn run_one(
        &self,
        reference: &MediaReference,
        spec: &ProviderSpec,
        deadline: Instant,
    ) -> AttemptOutcome {
        let Some(adapter) = self.adapters.get(&spec.kind) else {
            warn!("No adapter registered for {} provider {}", spec.kind, spec.name);
            return AttemptOutcome::failure(&spec.name, FailureReason::UnsupportedInput);
        };

        let started = Instant::now();
        let attempt_deadline = (started + spec.per_attempt_timeout).min(deadline);
        let outcome = match timeout_at(attempt_deadline, adapter.attempt(reference, spec, deadline)).await {
            Ok(outcome) => keep_playable(outcome),
            Err(_) => AttemptOutcome::failure(&spec.name, FailureReason::Timeout),
        };

        match &outcome {
            AttemptOutcome::Success { candidates, .. } => debug!(
                "[{}] {} candidate(s) in {:?}",
                spec.name,
                candidates.len(),
                started.elapsed()
            ),
            AttemptOutcome::Failure { reason, .. } => {
                warn!("[{}] attempt failed after {:?}: {}", spec.name, started.elapsed(), reason)
            }
        }
        outcome
    }
}

/// Drop candidates without a usable URL; an emptied success becomes `NoCandidates`
fn keep_playable(outcome: AttemptOutcome) -> AttemptOutcome {
    match outcome {
        AttemptOutcome::Success { provider, candidates } => {
            let playable: Vec<AudioCandidate> =
                candidates.into_iter().filter(AudioCandidate::is_playable).collect();
            AttemptOutcome::from_candidates(&provider, playable)
        }
        failure => failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    /// Scripted adapter: per-provider delay and outcome, records call order
    struct ScriptedAdapter {
        kind: ProviderKind,
        script: HashMap<String, (Duration, Option<Vec<(String, u32)>>)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedAdapter {
        fn new(kind: ProviderKind) -> Self {
            Self {
                kind,
                script: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn on(mut self, name: &str, delay_ms: u64, candidates: Option<Vec<(&str, u32)>>) -> Self {
            let candidates =
                candidates.map(|list| list.into_iter().map(|(u, b)| (u.to_string(), b)).collect());
            self.script
                .insert(name.to_string(), (Duration::from_millis(delay_ms), candidates));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn attempt(
            &self,
            _reference: &MediaReference,
            spec: &ProviderSpec,
            _deadline: Instant,
        ) -> AttemptOutcome {
            self.calls.lock().unwrap().push(spec.name.clone());
            let (delay, candidates) = self.script.get(&spec.name).cloned().unwrap_or_default();
            tokio::time::sleep(delay).await;
            match candidates {
                Some(list) => AttemptOutcome::from_candidates(
                    &spec.name,
                    list.iter()
                        .filter_map(|(url, bitrate)| {
                            AudioCandidate::new(&format!("https://cdn.example.com/{}", url), *bitrate, None, &spec.name)
                        })
                        .collect(),
                ),
                None => AttemptOutcome::failure(&spec.name, FailureReason::NoCandidates),
            }
        }
    }

    fn spec(name: &str, kind: ProviderKind, timeout_ms: u64, priority: u32) -> ProviderSpec {
        ProviderSpec::new(name, kind, "https://upstream.example.com", Duration::from_millis(timeout_ms))
            .with_priority(priority)
    }

    fn priority_options() -> EngineOptions {
        EngineOptions {
            ordering: TierOrdering::Priority,
            ..EngineOptions::default()
        }
    }

    fn reference() -> MediaReference {
        MediaReference::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success_picks_best_candidate() {
        let adapter = Arc::new(
            ScriptedAdapter::new(ProviderKind::IdBased)
                .on("slow", 10_000, None)
                .on("good", 10, Some(vec![("a", 96), ("b", 160)])),
        );
        let engine = ResolutionEngine::new(priority_options()).with_adapter(adapter.clone());
        let providers = vec![
            spec("slow", ProviderKind::IdBased, 1_000, 0),
            spec("good", ProviderKind::IdBased, 1_000, 1),
        ];

        let result = engine.resolve(&reference(), &providers, Duration::from_secs(5)).await;

        let chosen = result.chosen().expect("resolved");
        assert_eq!(chosen.url, "https://cdn.example.com/b");
        assert_eq!(result.attempts().len(), 2);
        assert_eq!(result.attempts()[0].reason(), Some(&FailureReason::Timeout));
        assert!(result.attempts()[1].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_no_candidates_fails_with_full_list() {
        let adapter = Arc::new(
            ScriptedAdapter::new(ProviderKind::UrlBased)
                .on("a", 5, None)
                .on("b", 5, None)
                .on("c", 5, None),
        );
        let engine = ResolutionEngine::new(priority_options()).with_adapter(adapter);
        let providers = vec![
            spec("a", ProviderKind::UrlBased, 1_000, 0),
            spec("b", ProviderKind::UrlBased, 1_000, 1),
            spec("c", ProviderKind::UrlBased, 1_000, 2),
        ];

        let result = engine.resolve(&reference(), &providers, Duration::from_secs(5)).await;

        assert!(result.chosen().is_none());
        assert_eq!(result.attempts().len(), 3);
        assert!(result
            .attempts()
            .iter()
            .all(|a| a.reason() == Some(&FailureReason::NoCandidates)));
        assert!(!result.ran_out_of_time());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_records_remaining_providers() {
        let adapter = Arc::new(
            ScriptedAdapter::new(ProviderKind::IdBased)
                .on("first", 10_000, None)
                .on("second", 10, Some(vec![("x", 128)])),
        );
        let engine = ResolutionEngine::new(priority_options()).with_adapter(adapter.clone());
        let providers = vec![
            spec("first", ProviderKind::IdBased, 5_000, 0),
            spec("second", ProviderKind::IdBased, 5_000, 1),
        ];

        let start = Instant::now();
        let result = engine.resolve(&reference(), &providers, Duration::from_millis(500)).await;

        assert!(start.elapsed() < Duration::from_millis(600));
        assert!(result.chosen().is_none());
        let attempts = result.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].reason(), Some(&FailureReason::Timeout));
        assert_eq!(attempts[1].provider(), "second");
        assert_eq!(attempts[1].reason(), Some(&FailureReason::BudgetExhausted));
        assert_eq!(adapter.calls(), vec!["first".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_short_circuits_later_tiers() {
        let url_adapter = Arc::new(ScriptedAdapter::new(ProviderKind::UrlBased).on("conv", 5, Some(vec![("c", 0)])));
        let id_adapter = Arc::new(ScriptedAdapter::new(ProviderKind::IdBased).on("piped", 5, Some(vec![("p", 320)])));
        let engine = ResolutionEngine::new(priority_options())
            .with_adapter(url_adapter.clone())
            .with_adapter(id_adapter.clone());
        let providers = vec![
            spec("piped", ProviderKind::IdBased, 1_000, 0),
            spec("conv", ProviderKind::UrlBased, 1_000, 0),
        ];

        let result = engine.resolve(&reference(), &providers, Duration::from_secs(5)).await;

        assert_eq!(result.chosen().unwrap().source_provider, "conv");
        assert_eq!(result.attempts().len(), 1);
        assert!(id_adapter.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_adapter_is_recorded_not_fatal() {
        let id_adapter = Arc::new(ScriptedAdapter::new(ProviderKind::IdBased).on("piped", 5, Some(vec![("p", 64)])));
        let engine = ResolutionEngine::new(priority_options()).with_adapter(id_adapter);
        let providers = vec![
            spec("conv", ProviderKind::UrlBased, 1_000, 0),
            spec("piped", ProviderKind::IdBased, 1_000, 0),
        ];

        let result = engine.resolve(&reference(), &providers, Duration::from_secs(5)).await;

        assert_eq!(result.attempts()[0].reason(), Some(&FailureReason::UnsupportedInput));
        assert_eq!(result.chosen().unwrap().source_provider, "piped");
    }

    #[test]
    fn test_plan_priority_order_and_limit() {
        let engine = ResolutionEngine::new(EngineOptions {
            max_per_tier: 2,
            ..priority_options()
        });
        let providers = vec![
            spec("id-low", ProviderKind::IdBased, 1_000, 5),
            spec("url-b", ProviderKind::UrlBased, 1_000, 2),
            spec("id-high", ProviderKind::IdBased, 1_000, 1),
            spec("url-a", ProviderKind::UrlBased, 1_000, 1),
            spec("url-c", ProviderKind::UrlBased, 1_000, 3),
        ];

        let plan = engine.plan(&providers, &mut StdRng::seed_from_u64(7));
        let names: Vec<Vec<&str>> = plan
            .iter()
            .map(|tier| tier.iter().map(|p| p.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["url-a", "url-b"], vec!["id-high", "id-low"]]);
    }

    #[test]
    fn test_plan_shuffle_is_bounded_and_seeded() {
        let engine = ResolutionEngine::new(EngineOptions {
            max_per_tier: 3,
            tier_order: vec![ProviderKind::IdBased],
            ..EngineOptions::default()
        });
        let providers: Vec<ProviderSpec> = (0..8)
            .map(|i| spec(&format!("p{}", i), ProviderKind::IdBased, 1_000, 0))
            .collect();

        let first = engine.plan(&providers, &mut StdRng::seed_from_u64(42));
        let again = engine.plan(&providers, &mut StdRng::seed_from_u64(42));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].len(), 3);
        assert_eq!(first, again);

        let mut names: Vec<&str> = first[0].iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 3, "sampling is without replacement");
    }

    #[test]
    fn test_plan_shuffle_keeps_priority_bands() {
        let engine = ResolutionEngine::new(EngineOptions {
            max_per_tier: 5,
            tier_order: vec![ProviderKind::UrlBased],
            ..EngineOptions::default()
        });
        let providers = vec![
            spec("cobalt-a", ProviderKind::UrlBased, 1_000, 1),
            spec("cobalt-b", ProviderKind::UrlBased, 1_000, 1),
            spec("quick", ProviderKind::UrlBased, 1_000, 0),
            spec("cobalt-c", ProviderKind::UrlBased, 1_000, 1),
        ];

        for seed in 0..16 {
            let plan = engine.plan(&providers, &mut StdRng::seed_from_u64(seed));
            assert_eq!(plan[0].len(), 4);
            assert_eq!(plan[0][0].name, "quick");
            assert!(plan[0][1..].iter().all(|p| p.priority == 1));
        }
    }

    #[test]
    fn test_plan_appends_unlisted_kinds() {
        let engine = ResolutionEngine::new(EngineOptions {
            tier_order: vec![ProviderKind::IdBased],
            ..priority_options()
        });
        let providers = vec![
            spec("conv", ProviderKind::UrlBased, 1_000, 0),
            spec("piped", ProviderKind::IdBased, 1_000, 0),
        ];
        let plan = engine.plan(&providers, &mut StdRng::seed_from_u64(1));
        assert_eq!(plan[0][0].name, "piped");
        assert_eq!(plan[1][0].name, "conv");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_abandons_slower_providers() {
        let adapter = Arc::new(
            ScriptedAdapter::new(ProviderKind::IdBased)
                .on("slow", 800, Some(vec![("s", 320)]))
                .on("fast", 50, Some(vec![("f", 128)]))
                .on("broken", 10, None),
        );
        let engine = ResolutionEngine::new(EngineOptions {
            fan_out: 3,
            ..priority_options()
        })
        .with_adapter(adapter);
        let providers = vec![
            spec("slow", ProviderKind::IdBased, 1_000, 0),
            spec("fast", ProviderKind::IdBased, 1_000, 1),
            spec("broken", ProviderKind::IdBased, 1_000, 2),
        ];

        let start = Instant::now();
        let result = engine.resolve(&reference(), &providers, Duration::from_secs(5)).await;

        assert!(start.elapsed() < Duration::from_millis(800));
        assert_eq!(result.chosen().unwrap().source_provider, "fast");
        let attempts = result.attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0].reason(), Some(&FailureReason::Abandoned));
        assert!(attempts[1].is_success());
        assert_eq!(attempts[2].reason(), Some(&FailureReason::NoCandidates));
    }

    #[tokio::test]
    async fn test_empty_provider_list_fails() {
        let engine = ResolutionEngine::new(EngineOptions::default());
        let result = engine.resolve(&reference(), &[], Duration::from_secs(1)).await;
        assert!(result.chosen().is_none());
        assert!(result.attempts().is_empty());
    }

    #[test]
    fn test_keep_playable_drops_bad_urls() {
        let outcome = AttemptOutcome::Success {
            provider: "p".to_string(),
            candidates: vec![AudioCandidate {
                url: String::new(),
                bitrate_kbps: 128,
                container: None,
                source_provider: "p".to_string(),
            }],
        };
        assert_eq!(keep_playable(outcome).reason(), Some(&FailureReason::NoCandidates));
    }
}
