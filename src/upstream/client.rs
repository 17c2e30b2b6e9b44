//! HTTP provider client
//!
//! Issues `GET <endpoint>?<handle_param>=<handle>` with the API key header
//! and a bounded timeout.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

use super::response::ProviderResponse;
use super::{ProfileProvider, UpstreamError};
use crate::config::UpstreamConfig;
use crate::data::{CacheKey, ProfileRecord};
use crate::error::AppError;
use crate::metrics::{UPSTREAM_REQUEST_DURATION_SECONDS, UPSTREAM_REQUESTS_TOTAL};

/// reqwest-backed `ProfileProvider`
pub struct HttpProfileProvider {
    http_client: reqwest::Client,
    endpoint: url::Url,
    api_key_header: HeaderName,
    api_key: HeaderValue,
    handle_param: String,
    timeout: Duration,
}

impl HttpProfileProvider {
    /// Create a provider client from configuration
    ///
    /// # Errors
    /// Returns `AppError::Config` if the endpoint or credential header is
    /// unusable, so a bad deployment fails at startup rather than per request.
    pub fn new(config: &UpstreamConfig) -> Result<Self, AppError> {
        let endpoint = url::Url::parse(&config.endpoint)
            .map_err(|e| AppError::Config(format!("upstream.endpoint is not a valid URL: {}", e)))?;

        let api_key_header = HeaderName::from_bytes(config.api_key_header.as_bytes())
            .map_err(|e| AppError::Config(format!("upstream.api_key_header is invalid: {}", e)))?;

        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| AppError::Config("upstream.api_key contains invalid characters".to_string()))?;
        api_key.set_sensitive(true);

        let timeout = Duration::from_secs(config.timeout_secs);
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("ProfileGate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http_client,
            endpoint,
            api_key_header,
            api_key,
            handle_param: config.handle_param.clone(),
            timeout,
        })
    }

    async fn request(&self, key: &CacheKey) -> Result<ProfileRecord, UpstreamError> {
        let response = self
            .http_client
            .get(self.endpoint.clone())
            .query(&[(self.handle_param.as_str(), key.as_str())])
            .header(self.api_key_header.clone(), self.api_key.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_transport_error)?;
        ProviderResponse::parse(&body)
    }
}

#[async_trait]
impl ProfileProvider for HttpProfileProvider {
    async fn fetch_profile(&self, key: &CacheKey) -> Result<ProfileRecord, UpstreamError> {
        tracing::info!(key = %key, "External API call");
        let started = Instant::now();

        let result = self.request(key).await;

        UPSTREAM_REQUEST_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => {
                UPSTREAM_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
            }
            Err(error) => {
                UPSTREAM_REQUESTS_TOTAL
                    .with_label_values(&[error.kind()])
                    .inc();
                tracing::error!(key = %key, %error, "External API error");
            }
        }

        result
    }
}

fn map_transport_error(error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout
    } else if error.is_decode() || error.is_body() {
        UpstreamError::Malformed(error.to_string())
    } else {
        UpstreamError::Network(error.to_string())
    }
}
