//! Profile resolution
//!
//! The only component that touches the limiter, normalizer, cache,
//! coalescer and provider, always in that order.

use std::sync::Arc;
use tokio::time::Instant;

use super::coalesce::{FlightRole, SingleFlight};
use super::normalize::KeyNormalizer;
use super::rate_limit::RateLimiter;
use crate::config::AppConfig;
use crate::data::{CacheKey, ProfileCache, ProfileRecord};
use crate::error::AppError;
use crate::metrics::PROFILE_REQUESTS_TOTAL;
use crate::upstream::{ProfileProvider, UpstreamError};

/// Path a request took to its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvePath {
    /// Served from a fresh cache entry
    CacheHit,
    /// Joined another caller's in-flight upstream call
    Coalesced,
    /// Started the upstream call itself
    Fetched,
}

impl ResolvePath {
    /// Value for the `X-Profile-Cache` response header
    pub fn as_header_value(&self) -> &'static str {
        match self {
            ResolvePath::CacheHit => "HIT",
            ResolvePath::Coalesced => "COALESCED",
            ResolvePath::Fetched => "MISS",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            ResolvePath::CacheHit => "cache_hit",
            ResolvePath::Coalesced => "coalesced",
            ResolvePath::Fetched => "fetched",
        }
    }
}

/// Body of a flight: fetch once and cache on success
///
/// Reports `CacheHit` when an earlier flight already refreshed the entry,
/// `Fetched` when the provider was called.
async fn fetch_and_cache(
    cache: Arc<ProfileCache>,
    provider: Arc<dyn ProfileProvider>,
    key: CacheKey,
) -> Result<(ProfileRecord, ResolvePath), UpstreamError> {
    // A flight that finished between our cache miss and taking the slot has
    // already refreshed the cache.
    if let Some(profile) = cache.get(&key).await {
        tracing::info!(key = %key, "Cache hit inside flight");
        return Ok((profile, ResolvePath::CacheHit));
    }

    tracing::info!(key = %key, "Cache miss, starting new call");
    let requested_at = Instant::now();
    let profile = provider.fetch_profile(&key).await?;

    // Cached before the in-flight marker clears
    cache.set_fetched_at(key.clone(), profile.clone(), requested_at).await;
    tracing::info!(key = %key, "Cache set");
    Ok((profile, ResolvePath::Fetched))
}

/// Successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub profile: ProfileRecord,
    pub path: ResolvePath,
}

/// Request orchestrator
///
/// Constructed once at startup and shared by every handler.
pub struct ProfileService {
    normalizer: KeyNormalizer,
    limiter: RateLimiter,
    cache: Arc<ProfileCache>,
    flights: SingleFlight<CacheKey, (ProfileRecord, ResolvePath), UpstreamError>,
    provider: Arc<dyn ProfileProvider>,
}

impl ProfileService {
    pub fn new(
        normalizer: KeyNormalizer,
        limiter: RateLimiter,
        cache: ProfileCache,
        provider: Arc<dyn ProfileProvider>,
    ) -> Self {
        Self {
            normalizer,
            limiter,
            cache: Arc::new(cache),
            flights: SingleFlight::new(),
            provider,
        }
    }

    /// Build the service from configuration
    pub fn from_config(config: &AppConfig, provider: Arc<dyn ProfileProvider>) -> Self {
        Self::new(
            KeyNormalizer::new(&config.profile.allowed_hosts),
            RateLimiter::with_max_tracked_keys(
                Some(config.rate_limit.max_requests),
                Some(config.rate_limit.window()),
                config.rate_limit.max_tracked_clients,
            ),
            ProfileCache::new(config.cache.ttl()),
            provider,
        )
    }

    /// Resolve a raw identifier for `client_id`
    ///
    /// # Errors
    /// - `AppError::RateLimited` before any other work when over quota
    /// - `AppError::InvalidInput` when the identifier cannot be normalized
    /// - `AppError::Upstream` when the (possibly shared) provider call fails
    pub async fn resolve(&self, raw: &str, client_id: &str) -> Result<Resolution, AppError> {
        let result = self.resolve_inner(raw, client_id).await;

        let outcome = match &result {
            Ok(resolution) => resolution.path.metric_label(),
            Err(error) => error.error_type(),
        };
        PROFILE_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();

        result
    }

    /// Resolve and return only the profile
    pub async fn resolve_profile(
        &self,
        raw: &str,
        client_id: &str,
    ) -> Result<ProfileRecord, AppError> {
        self.resolve(raw, client_id)
            .await
            .map(|resolution| resolution.profile)
    }

    async fn resolve_inner(&self, raw: &str, client_id: &str) -> Result<Resolution, AppError> {
        // 1. Rate limit
        self.limiter.check_and_increment(client_id).await?;

        // 2. Normalize
        let key = self.normalizer.normalize(raw)?;

        // 3. Cache
        if let Some(profile) = self.cache.get(&key).await {
            tracing::info!(key = %key, "Cache hit");
            return Ok(Resolution {
                profile,
                path: ResolvePath::CacheHit,
            });
        }

        // 4. Coalesce or fetch
        let cache = Arc::clone(&self.cache);
        let provider = Arc::clone(&self.provider);
        let work_key = key.clone();
        let (role, result) = self
            .flights
            .run_tracked(key.clone(), move || fetch_and_cache(cache, provider, work_key))
            .await;

        if role == FlightRole::Follower {
            tracing::info!(key = %key, "Coalesce hit, joined in-flight call");
        }

        match result {
            Ok((profile, flight_path)) => {
                let path = match role {
                    FlightRole::Leader => flight_path,
                    FlightRole::Follower => ResolvePath::Coalesced,
                };
                Ok(Resolution { profile, path })
            }
            Err(error) => {
                tracing::warn!(key = %key, ?role, %error, "Profile fetch failed");
                Err(AppError::Upstream(error))
            }
        }
    }

    /// Drop expired cache entries and elapsed rate windows
    pub async fn prune(&self) -> (usize, usize) {
        let cache_removed = self.cache.prune_expired().await;
        let windows_removed = self.limiter.prune_old().await;
        (cache_removed, windows_removed)
    }

    /// Number of upstream calls currently running
    pub fn in_flight_count(&self) -> usize {
        self.flights.in_flight_count()
    }
}
