//! HTTP service exposing the resolver
//!
//! Routes:
//! - `POST /api/extract` - resolve `{ "url": ... }` to a playable audio URL
//! - `GET /api/health` - liveness and configured provider count

pub mod handlers;
pub mod messages;

pub use handlers::{resolve_input, Resolved};
pub use messages::{ExtractRequest, ExtractResponse, HealthResponse};

use crate::extractor::engine::ResolutionEngine;
use crate::extractor::http::build_client;
use crate::extractor::models::{ProviderKind, ProviderSpec};
use crate::utils::config::AppSettings;
use crate::utils::error::ResolverError;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ResolutionEngine>,
    pub providers: Arc<[ProviderSpec]>,
    pub budget: Duration,
}

impl AppState {
    pub fn new(engine: ResolutionEngine, providers: Vec<ProviderSpec>, budget: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            providers: providers.into(),
            budget,
        }
    }

    /// Build the engine and default adapters described by `settings`
    pub fn from_settings(settings: &AppSettings) -> Result<Self, ResolverError> {
        let client = build_client(&settings.user_agent)?;
        let engine = ResolutionEngine::with_default_adapters(
            settings.engine_options(),
            client,
            &settings.target_container,
        );
        Ok(Self::new(engine, settings.providers.clone(), settings.global_budget()))
    }

    /// Whether inputs without an identifier can still be sent to a url-based provider
    pub fn url_negotiable(&self) -> bool {
        self.providers.iter().any(|p| p.kind == ProviderKind::UrlBased)
    }
}

/// Create the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/extract", post(handlers::extract))
        .route("/api/health", get(handlers::health))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid bind address: {}", addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(
        "Listening on {} with {} provider(s), budget {:?}",
        listener.local_addr()?,
        state.providers.len(),
        state.budget
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
