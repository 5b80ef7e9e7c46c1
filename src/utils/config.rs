//! Application configuration

use crate::extractor::engine::{EngineOptions, TierOrdering};
use crate::extractor::http::DEFAULT_USER_AGENT;
use crate::extractor::models::{ProviderKind, ProviderSpec};
use crate::extractor::selector::SelectionPolicy;
use crate::utils::error::ResolverError;
use crate::utils::platform::default_config_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Address the HTTP service listens on
    pub bind: String,

    /// Wall-clock budget for one resolution, all attempts included
    pub global_budget_ms: u64,

    /// Providers tried per tier at most
    pub max_per_tier: usize,

    /// Order inside a tier
    pub ordering: TierOrdering,

    /// Tier order by request shape
    pub tier_order: Vec<ProviderKind>,

    /// Providers of one tier raced concurrently (1 = sequential)
    pub fan_out: usize,

    /// Which ranked candidate is returned
    pub selection: SelectionPolicy,

    /// Container requested from url-based providers
    pub target_container: String,

    /// User-Agent for outbound requests
    pub user_agent: String,

    /// Upstream providers
    pub providers: Vec<ProviderSpec>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            global_budget_ms: 9_000,
            max_per_tier: 3,
            ordering: TierOrdering::Shuffled,
            tier_order: vec![ProviderKind::UrlBased, ProviderKind::IdBased],
            fan_out: 1,
            selection: SelectionPolicy::HighestBitrate,
            target_container: "mp3".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            providers: default_providers(),
        }
    }
}

/// Built-in public instances.
///
/// The quick GET converter sits at priority 0 so it runs ahead of the cobalt
/// instances, which share priority 1 and are shuffled among themselves.
fn default_providers() -> Vec<ProviderSpec> {
    let quick = Duration::from_secs(5);
    let converter = Duration::from_secs(6);
    let metadata = Duration::from_secs(5);
    vec![
        ProviderSpec::new("loader-to", ProviderKind::UrlBased, "https://api.loader.to/api/get?format=mp3&url={url}", quick),
        ProviderSpec::new("cobalt-tools", ProviderKind::UrlBased, "https://api.cobalt.tools/api/json", converter).with_priority(1),
        ProviderSpec::new("cobalt-sh", ProviderKind::UrlBased, "https://cobalt.sh/api/json", converter).with_priority(1),
        ProviderSpec::new("cobalt-wuk", ProviderKind::UrlBased, "https://co.wuk.sh/api/json", converter).with_priority(1),
        ProviderSpec::new("piped-kavin", ProviderKind::IdBased, "https://pipedapi.kavin.rocks/streams/{id}", metadata),
        ProviderSpec::new("piped-adminforge", ProviderKind::IdBased, "https://pipedapi.adminforge.de/streams/{id}", metadata),
        ProviderSpec::new("invidious-nadeko", ProviderKind::IdBased, "https://inv.nadeko.net/api/v1/videos/{id}", metadata),
    ]
}

impl AppSettings {
    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, the per-user config file is
    /// read when present, otherwise built-in defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No config at {:?}, using defaults", default_path);
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings = Self::from_toml_str(&content)
            .with_context(|| format!("invalid TOML in {}", path.display()))?;
        info!("Loaded {} provider(s) from {}", settings.providers.len(), path.display());
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Enforce sane minimums and reject unusable provider lists
    pub fn validate(&mut self) -> Result<(), ResolverError> {
        if self.global_budget_ms == 0 {
            warn!("global_budget_ms was 0, using 1000");
            self.global_budget_ms = 1_000;
        }
        if self.max_per_tier == 0 {
            self.max_per_tier = 1;
        }
        if self.fan_out == 0 {
            self.fan_out = 1;
        }
        if self.target_container.trim().is_empty() {
            self.target_container = "mp3".to_string();
        }

        if self.providers.is_empty() {
            return Err(ResolverError::Config("no providers configured".to_string()));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(ResolverError::Config("provider with empty name".to_string()));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ResolverError::Config(format!(
                    "duplicate provider name: {}",
                    provider.name
                )));
            }
            let endpoint = provider.endpoint.replace("{id}", "id").replace("{url}", "url");
            let endpoint_ok = url::Url::parse(&endpoint)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !endpoint_ok {
                return Err(ResolverError::Config(format!(
                    "provider {} has invalid endpoint: {}",
                    provider.name, provider.endpoint
                )));
            }
            if provider.per_attempt_timeout.is_zero() {
                return Err(ResolverError::Config(format!(
                    "provider {} has zero timeout",
                    provider.name
                )));
            }
        }

        Ok(())
    }

    pub fn global_budget(&self) -> Duration {
        Duration::from_millis(self.global_budget_ms)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            tier_order: self.tier_order.clone(),
            ordering: self.ordering,
            max_per_tier: self.max_per_tier,
            fan_out: self.fan_out,
            selection: self.selection,
        }
    }

    pub fn has_provider_kind(&self, kind: ProviderKind) -> bool {
        self.providers.iter().any(|p| p.kind == kind)
    }
}
