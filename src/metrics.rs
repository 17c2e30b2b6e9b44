//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use std::sync::Once;

use prometheus::{HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref PROFILE_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("profilegate_profile_requests_total", "Total number of profile requests by outcome"),
        &["outcome"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("profilegate_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("profilegate_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("profilegate_cache_size", "Current number of items in cache"),
        &["cache_name"]
    ).expect("metric can be created");

    // Coalescing Metrics
    pub static ref COALESCED_JOINS_TOTAL: IntCounter = IntCounter::new(
        "profilegate_coalesced_joins_total",
        "Total number of callers that joined an in-flight upstream call"
    ).expect("metric can be created");
    pub static ref IN_FLIGHT_CALLS: IntGauge = IntGauge::new(
        "profilegate_in_flight_calls",
        "Current number of in-flight upstream calls"
    ).expect("metric can be created");

    // Upstream Metrics
    pub static ref UPSTREAM_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("profilegate_upstream_requests_total", "Total number of upstream provider calls"),
        &["status"]
    ).expect("metric can be created");
    pub static ref UPSTREAM_REQUEST_DURATION_SECONDS: prometheus::Histogram = prometheus::Histogram::with_opts(
        HistogramOpts::new(
            "profilegate_upstream_request_duration_seconds",
            "Upstream provider call duration in seconds"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("metric can be created");

    // Rate Limit Metrics
    pub static ref RATE_LIMITED_TOTAL: IntCounter = IntCounter::new(
        "profilegate_rate_limited_total",
        "Total number of requests rejected by the rate limiter"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("profilegate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(register_all);
}

fn register_all() {
    REGISTRY
        .register(Box::new(PROFILE_REQUESTS_TOTAL.clone()))
        .expect("PROFILE_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_SIZE.clone()))
        .expect("CACHE_SIZE can be registered");
    REGISTRY
        .register(Box::new(COALESCED_JOINS_TOTAL.clone()))
        .expect("COALESCED_JOINS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(IN_FLIGHT_CALLS.clone()))
        .expect("IN_FLIGHT_CALLS can be registered");
    REGISTRY
        .register(Box::new(UPSTREAM_REQUESTS_TOTAL.clone()))
        .expect("UPSTREAM_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(UPSTREAM_REQUEST_DURATION_SECONDS.clone()))
        .expect("UPSTREAM_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(RATE_LIMITED_TOTAL.clone()))
        .expect("RATE_LIMITED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
