//! Upstream profile provider
//!
//! The only place that talks to the external data provider. Everything
//! else sees a `ProfileProvider` and a typed `UpstreamError`.

mod client;
mod response;

use async_trait::async_trait;
use thiserror::Error;

use crate::data::{CacheKey, ProfileRecord};

pub use client::HttpProfileProvider;
pub use response::{ProviderProfile, ProviderResponse};

/// Failure of a single upstream call
///
/// Cloneable so one failure can be handed to every coalesced caller.
/// The carried detail is for logs only and never reaches the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// The call exceeded the configured timeout
    #[error("upstream request timed out")]
    Timeout,

    /// Connection or transport failure
    #[error("upstream network error: {0}")]
    Network(String),

    /// Provider answered with a non-success status
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Provider answered with an unexpected body
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// The task driving the call ended without producing a result
    #[error("upstream call aborted: {0}")]
    Aborted(String),
}

impl UpstreamError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout => "timeout",
            UpstreamError::Network(_) => "network",
            UpstreamError::Status(_) => "status",
            UpstreamError::Malformed(_) => "malformed",
            UpstreamError::Aborted(_) => "aborted",
        }
    }
}

impl From<tokio::task::JoinError> for UpstreamError {
    fn from(error: tokio::task::JoinError) -> Self {
        UpstreamError::Aborted(error.to_string())
    }
}

/// Source of profile data
///
/// Implementations perform exactly one provider call per invocation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Fetch and normalize the profile for `key`
    async fn fetch_profile(&self, key: &CacheKey) -> Result<ProfileRecord, UpstreamError>;
}
