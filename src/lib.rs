//! ProfileGate - upstream-fetch protection for profile card rendering
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - POST /api/profile, /api/scrape-twitter                   │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Rate limiter → key normalizer → TTL cache                │
//! │  - Single-flight coalescer                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Upstream Layer                           │
//! │  - Profile provider client (reqwest)                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Rate limiting, normalization, coalescing, orchestration
//! - `upstream`: External profile provider
//! - `data`: Profile models and cache
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod upstream;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; the service behind it is constructed once.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Profile orchestrator (limiter, cache, coalescer, provider)
    pub profiles: Arc<service::ProfileService>,
}

impl AppState {
    /// Initialize application state with the HTTP provider client
    ///
    /// # Errors
    /// Returns error if the upstream client cannot be configured
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let provider = upstream::HttpProfileProvider::new(&config.upstream)?;
        tracing::info!(endpoint = %config.upstream.endpoint, "Upstream client initialized");

        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Initialize application state around an existing provider
    pub fn with_provider(
        config: config::AppConfig,
        provider: Arc<dyn upstream::ProfileProvider>,
    ) -> Self {
        let profiles = service::ProfileService::from_config(&config, provider);

        tracing::info!(
            ttl_secs = config.cache.ttl_secs,
            window_secs = config.rate_limit.window_secs,
            max_requests = config.rate_limit.max_requests,
            "Application state initialized"
        );

        Self {
            config: Arc::new(config),
            profiles: Arc::new(profiles),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.cors);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::profile_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(cors: &config::CorsConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::{AllowOrigin, CorsLayer};

    let origins: Vec<HeaderValue> = cors
        .origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    tracing::info!(origins = ?cors.origins(), "Allowed origins");

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn health_check() -> &'static str {
    "OK"
}
