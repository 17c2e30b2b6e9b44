//! API layer
//!
//! HTTP handlers for:
//! - Profile resolution (card data)
//! - Metrics (Prometheus)

mod dto;
pub mod metrics;
mod profile;

pub use dto::*;

pub use metrics::metrics_router;
pub use profile::{client_identity, profile_router};
