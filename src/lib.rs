//! audio-resolver library

pub mod extractor;
pub mod server;
pub mod utils;

// Re-export main types for easier use
pub use extractor::{
    extract_id, AudioCandidate, EngineOptions, MediaReference, ProviderKind, ProviderSpec,
    ResolutionEngine, ResolutionResult,
};
pub use server::AppState;
pub use utils::{AppSettings, ResolverError};
