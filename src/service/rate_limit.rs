//! Inbound rate limiting
//!
//! Fixed-window request counter per client identity. Applied before any
//! cache or coalescing work so rejected requests never hold a flight slot.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::AppError;
use crate::metrics::RATE_LIMITED_TOTAL;

const DEFAULT_MAX_TRACKED_CLIENTS: usize = 10_000;
const DEFAULT_MAX_REQUESTS: u32 = 20;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Accepted requests of one client in its current window
#[derive(Debug, Clone)]
struct RateWindow {
    accepted: u32,
    opened_at: Instant,
}

impl RateWindow {
    fn open() -> Self {
        Self {
            accepted: 0,
            opened_at: Instant::now(),
        }
    }

    fn has_elapsed(&self, window: Duration) -> bool {
        self.opened_at.elapsed() >= window
    }

    /// Count one request, or return how long until the window closes
    fn admit(&mut self, window: Duration, max_requests: u32) -> Result<(), Duration> {
        if self.has_elapsed(window) {
            *self = Self::open();
        }
        if self.accepted >= max_requests {
            return Err(window.saturating_sub(self.opened_at.elapsed()));
        }
        self.accepted += 1;
        Ok(())
    }
}

/// Rate limiter for inbound profile requests
pub struct RateLimiter {
    windows: RwLock<HashMap<String, RateWindow>>,
    max_requests: u32,
    window: Duration,
    /// Upper bound on clients held in memory
    max_tracked_clients: usize,
}

impl RateLimiter {
    /// Create new rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window (default: 20)
    /// * `window` - Window duration (default: 1 minute)
    pub fn new(max_requests: Option<u32>, window: Option<Duration>) -> Self {
        Self::with_max_tracked_keys(max_requests, window, DEFAULT_MAX_TRACKED_CLIENTS)
    }

    /// Create new rate limiter with explicit in-memory client cap.
    pub fn with_max_tracked_keys(
        max_requests: Option<u32>,
        window: Option<Duration>,
        max_tracked_clients: usize,
    ) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_requests: max_requests.unwrap_or(DEFAULT_MAX_REQUESTS),
            window: window.unwrap_or(DEFAULT_WINDOW),
            max_tracked_clients: max_tracked_clients.max(1),
        }
    }

    /// Make room for a new client: drop elapsed windows, then the oldest one
    fn make_room(windows: &mut HashMap<String, RateWindow>, window: Duration) {
        windows.retain(|_, w| !w.has_elapsed(window));

        let oldest = windows
            .iter()
            .min_by_key(|(_, w)| w.opened_at)
            .map(|(client, _)| client.clone());
        if let Some(client) = oldest {
            tracing::debug!(client = %client, "Evicting oldest rate window");
            windows.remove(&client);
        }
    }

    /// Count a request against `client_id`
    ///
    /// # Returns
    /// Ok if allowed, `AppError::RateLimited` with the seconds left in the
    /// window otherwise. Rejected requests are not counted.
    pub async fn check_and_increment(&self, client_id: &str) -> Result<(), AppError> {
        let mut windows = self.windows.write().await;

        if !windows.contains_key(client_id) && windows.len() >= self.max_tracked_clients {
            Self::make_room(&mut windows, self.window);
        }

        let remaining = match windows
            .entry(client_id.to_string())
            .or_insert_with(RateWindow::open)
            .admit(self.window, self.max_requests)
        {
            Ok(()) => return Ok(()),
            Err(remaining) => remaining,
        };

        RATE_LIMITED_TOTAL.inc();
        tracing::warn!(client = %client_id, "Rate limit exceeded");

        // Round up so clients never retry inside the window
        let retry_after_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        Err(AppError::RateLimited { retry_after_secs })
    }

    /// Boolean form of `check_and_increment`
    pub async fn allow(&self, client_id: &str) -> bool {
        self.check_and_increment(client_id).await.is_ok()
    }

    /// Drop windows that have elapsed
    ///
    /// Returns the number of removed clients.
    pub async fn prune_old(&self) -> usize {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, w| !w.has_elapsed(self.window));
        let removed = before - windows.len();

        if removed > 0 {
            tracing::debug!("Pruned {} elapsed rate windows", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_then_new_window() {
        let limiter = RateLimiter::new(Some(3), Some(Duration::from_secs(60)));

        assert!(limiter.allow("203.0.113.7").await);
        assert!(limiter.allow("203.0.113.7").await);
        assert!(limiter.allow("203.0.113.7").await);

        // The ceiling+1-th request in the window is rejected
        assert!(!limiter.allow("203.0.113.7").await);

        tokio::time::advance(Duration::from_secs(60)).await;

        // A fresh window admits exactly the ceiling again
        for _ in 0..3 {
            assert!(limiter.allow("203.0.113.7").await);
        }
        assert!(!limiter.allow("203.0.113.7").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_reports_remaining_window() {
        let limiter = RateLimiter::new(Some(1), Some(Duration::from_secs(60)));
        assert!(limiter.check_and_increment("client").await.is_ok());

        tokio::time::advance(Duration::from_millis(20_500)).await;
        let error = limiter.check_and_increment("client").await.unwrap_err();
        assert!(matches!(
            error,
            AppError::RateLimited {
                retry_after_secs: 40
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_are_limited_independently() {
        let limiter = RateLimiter::new(Some(2), Some(Duration::from_secs(1)));

        assert!(limiter.allow("client1").await);
        assert!(limiter.allow("client1").await);
        assert!(limiter.allow("client2").await);
        assert!(limiter.allow("client2").await);

        assert!(!limiter.allow("client1").await);
        assert!(!limiter.allow("client2").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_table_evicts_oldest_window() {
        let limiter =
            RateLimiter::with_max_tracked_keys(Some(1), Some(Duration::from_secs(60)), 2);

        assert!(limiter.allow("client1").await);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.allow("client2").await);
        tokio::time::advance(Duration::from_millis(1)).await;

        // client1 is evicted to make room, so it starts over
        assert!(limiter.allow("client3").await);
        assert!(limiter.allow("client1").await);

        // client3 kept its window and is still at the ceiling
        assert!(!limiter.allow("client3").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_old_removes_elapsed_windows() {
        let limiter = RateLimiter::new(Some(1), Some(Duration::from_secs(10)));
        assert!(limiter.allow("old").await);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(limiter.allow("fresh").await);

        assert_eq!(limiter.prune_old().await, 1);
        assert_eq!(limiter.prune_old().await, 0);

        // The surviving window still counts
        assert!(!limiter.allow("fresh").await);
    }
}
