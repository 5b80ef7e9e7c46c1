//! Utility modules for error handling, configuration and platform paths

pub mod config;
pub mod error;
pub mod platform;

// Re-export for convenience
pub use config::AppSettings;
pub use error::ResolverError;
pub use platform::{config_dir, default_config_path};
