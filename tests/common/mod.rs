//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use profilegate::{AppState, config};
use serde_json::json;
use tokio::net::TcpListener;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_ORIGIN: &str = "https://cards.example.com";

/// Fake profile provider
///
/// Counts calls, can be slowed down or switched into failure mode.
#[derive(Default)]
pub struct StubUpstream {
    calls: AtomicUsize,
    delay_ms: AtomicU64,
    failing: AtomicBool,
}

impl StubUpstream {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

async fn stub_user_info(
    State(stub): State<Arc<StubUpstream>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    stub.calls.fetch_add(1, Ordering::SeqCst);

    let delay = stub.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(TEST_API_KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }

    if stub.failing.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "provider exploded: internal stack trace",
        )
            .into_response();
    }

    let Some(user_name) = params.get("userName") else {
        return (StatusCode::BAD_REQUEST, "missing userName").into_response();
    };

    Json(json!({
        "data": {
            "name": format!("Display {}", user_name),
            "userName": user_name,
            "description": "Test bio",
            "profilePicture": format!("https://pbs.example.com/{}_normal.jpg", user_name),
            "following": 12,
            "followers": "3400",
            "location": "",
            "profile_bio": {
                "entities": {
                    "url": { "urls": [{ "expanded_url": "https://example.org" }] }
                }
            }
        }
    }))
    .into_response()
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub upstream: Arc<StubUpstream>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance with default limits
    pub async fn new() -> Self {
        Self::with_rate_limit(1000).await
    }

    /// Create a test server allowing `max_requests` per client per minute
    pub async fn with_rate_limit(max_requests: u32) -> Self {
        Self::build(max_requests, 5).await
    }

    /// Create a test server whose provider calls give up after
    /// `upstream_timeout_secs`
    pub async fn with_upstream_timeout(upstream_timeout_secs: u64) -> Self {
        Self::build(1000, upstream_timeout_secs).await
    }

    async fn build(max_requests: u32, upstream_timeout_secs: u64) -> Self {
        profilegate::metrics::init_metrics();

        // Start the fake provider
        let upstream = Arc::new(StubUpstream::default());
        let upstream_app = Router::new()
            .route("/twitter/user/info", get(stub_user_info))
            .with_state(Arc::clone(&upstream));
        let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream_listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(upstream_listener, upstream_app).await.unwrap();
        });

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                trust_forwarded_for: false,
            },
            upstream: config::UpstreamConfig {
                endpoint: format!("http://{}/twitter/user/info", upstream_addr),
                api_key: TEST_API_KEY.to_string(),
                api_key_header: "X-API-Key".to_string(),
                handle_param: "userName".to_string(),
                timeout_secs: upstream_timeout_secs,
            },
            cache: config::CacheConfig {
                ttl_secs: 3600,
                prune_interval_secs: 300,
            },
            rate_limit: config::RateLimitConfig {
                window_secs: 60,
                max_requests,
                max_tracked_clients: 10_000,
            },
            profile: config::ProfileConfig {
                allowed_hosts: config::DEFAULT_ALLOWED_HOSTS
                    .iter()
                    .map(|h| h.to_string())
                    .collect(),
            },
            cors: config::CorsConfig {
                allowed_origins: vec![TEST_ORIGIN.to_string()],
                allow_localhost: false,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = profilegate::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr: addr_str,
            state,
            upstream,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST a profile request to `path`
    pub async fn post_profile(&self, path: &str, twitter_url: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&json!({ "twitterUrl": twitter_url }))
            .send()
            .await
            .unwrap()
    }
}
