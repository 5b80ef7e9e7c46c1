//! Candidate ranking and selection

use crate::extractor::models::AudioCandidate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Which ranked candidate to hand back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Highest bitrate, unknown bitrate last
    #[default]
    HighestBitrate,
    /// Second entry of the ranking (first when only one), trades quality for size
    RunnerUp,
}

/// Rank candidates by bitrate descending with unknown (0) last.
///
/// The sort is stable, so equal bitrates keep upstream order.
pub fn rank(candidates: &[AudioCandidate]) -> Vec<&AudioCandidate> {
    let mut ranked: Vec<&AudioCandidate> = candidates.iter().collect();
    ranked.sort_by_key(|c| Reverse(c.bitrate_kbps));
    ranked
}

/// Pick one candidate according to `policy`; `None` only for an empty list
pub fn select(candidates: &[AudioCandidate], policy: SelectionPolicy) -> Option<&AudioCandidate> {
    let ranked = rank(candidates);
    match policy {
        SelectionPolicy::HighestBitrate => ranked.first().copied(),
        SelectionPolicy::RunnerUp => ranked.get(1).or_else(|| ranked.first()).copied(),
    }
}
