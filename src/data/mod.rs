//! Data layer module
//!
//! Process-lifetime state only:
//! - Profile models
//! - TTL profile cache (volatile)

mod cache;
mod models;

pub use cache::ProfileCache;
pub use models::*;
