//! ProfileGate binary entry point

use std::net::SocketAddr;

use profilegate::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start background pruning
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration; missing upstream credentials stop here
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    let default_filter = format!("profilegate={},tower_http=debug", config.logging.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting ProfileGate...");
    profilegate::metrics::init_metrics();

    // 3. Initialize application state
    let state = AppState::new(config.clone())?;

    // 4. Build Axum router
    let app = profilegate::build_router(state.clone());

    // 5. Start background tasks
    spawn_prune_task(state.clone());

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Spawn background task pruning expired cache entries and rate windows
fn spawn_prune_task(state: AppState) {
    tokio::spawn(async move {
        let configured_interval_secs = state.config.cache.prune_interval_secs;
        let interval_secs = configured_interval_secs.max(1);
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        if configured_interval_secs == 0 {
            tracing::warn!("cache.prune_interval_secs=0 is invalid; clamped to 1 second");
        }

        // Consume the immediate first tick
        interval.tick().await;

        loop {
            interval.tick().await;

            let (entries, windows) = state.profiles.prune().await;
            tracing::debug!(
                cache_entries = entries,
                rate_windows = windows,
                "Prune completed"
            );
        }
    });

    tracing::info!("Prune task spawned");
}
