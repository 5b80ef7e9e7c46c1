//! Audio stream resolution: identifier parsing, provider adapters, engine and selection

pub mod engine;
pub mod http;
pub mod id;
pub mod models;
pub mod negotiate;
pub mod outcome;
pub mod selector;
pub mod streams;
pub mod traits;

pub use engine::{EngineOptions, ResolutionEngine, TierOrdering};
pub use id::extract_id;
pub use models::{AudioCandidate, MediaReference, ProviderKind, ProviderSpec};
pub use negotiate::NegotiateAdapter;
pub use outcome::{AttemptOutcome, FailureReason, ResolutionResult};
pub use selector::{select, SelectionPolicy};
pub use streams::StreamsAdapter;
pub use traits::ProviderAdapter;
