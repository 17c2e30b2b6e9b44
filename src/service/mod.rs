//! Service layer
//!
//! Contains the upstream-protection logic separated from HTTP handlers.
//! `ProfileService` orchestrates the limiter, normalizer, cache and
//! coalescer around the upstream provider.

mod coalesce;
mod normalize;
mod profile;
mod rate_limit;

pub use coalesce::{FlightRole, SingleFlight};
pub use normalize::{KeyNormalizer, MAX_HANDLE_LEN};
pub use profile::{ProfileService, Resolution, ResolvePath};
pub use rate_limit::RateLimiter;
