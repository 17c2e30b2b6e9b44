//! Data models
//!
//! Value types shared between the cache, the coalescer and the upstream client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical cache key for a profile
///
/// Always the lower-cased handle without a leading `@`.
/// Only the key normalizer constructs these from user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from an already validated handle.
    pub(crate) fn from_handle(handle: &str) -> Self {
        Self(handle.to_ascii_lowercase())
    }

    /// Handle used for the cache, the coalescer and the upstream call
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalized profile record
///
/// This is the shape served to the card renderer. Counts are kept as
/// strings because the provider reports them in mixed representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub name: String,
    /// Display handle including the leading `@`
    pub handle: String,
    pub bio: String,
    pub avatar_url: String,
    pub following_count: String,
    pub followers_count: String,
    pub location: Option<String>,
    pub website: Option<String>,
}
