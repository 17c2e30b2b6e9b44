//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub profile: ProfileConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 4000)
    pub port: u16,
    /// Use the right-most X-Forwarded-For entry as client identity.
    ///
    /// Only enable behind exactly one trusted reverse proxy.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

/// Upstream provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Provider endpoint URL
    pub endpoint: String,
    /// Provider API key
    pub api_key: String,
    /// Header carrying the API key (default: "X-API-Key")
    pub api_key_header: String,
    /// Query parameter carrying the handle (default: "userName")
    pub handle_param: String,
    /// Per-call timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Profile TTL in seconds (default: 3600)
    pub ttl_secs: u64,
    /// Interval of the background pruning task in seconds (default: 300)
    pub prune_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Inbound rate limit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds (default: 60)
    pub window_secs: u64,
    /// Requests allowed per client per window (default: 20)
    pub max_requests: u32,
    /// Maximum number of client windows held in memory (default: 10000)
    pub max_tracked_clients: usize,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Profile input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Hosts accepted in profile URLs
    pub allowed_hosts: Vec<String>,
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the API
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Also allow http://localhost:3000 for local frontend development
    #[serde(default)]
    pub allow_localhost: bool,
}

impl CorsConfig {
    pub const LOCAL_DEV_ORIGIN: &'static str = "http://localhost:3000";

    /// Effective origin allow-list
    pub fn origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        if self.allow_localhost && !origins.iter().any(|o| o == Self::LOCAL_DEV_ORIGIN) {
            origins.push(Self::LOCAL_DEV_ORIGIN.to_string());
        }
        origins
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

pub const DEFAULT_ALLOWED_HOSTS: [&str; 6] = [
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
    "x.com",
    "www.x.com",
    "mobile.x.com",
];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (PROFILEGATE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid or the upstream
    /// credentials are missing
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 4000)?
            .set_default("server.trust_forwarded_for", false)?
            .set_default("upstream.api_key_header", "X-API-Key")?
            .set_default("upstream.handle_param", "userName")?
            .set_default("upstream.timeout_secs", 30)?
            .set_default("cache.ttl_secs", 3600)?
            .set_default("cache.prune_interval_secs", 300)?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("rate_limit.max_requests", 20)?
            .set_default("rate_limit.max_tracked_clients", 10000)?
            .set_default("profile.allowed_hosts", DEFAULT_ALLOWED_HOSTS.to_vec())?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .set_default("cors.allow_localhost", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (PROFILEGATE__*)
            .add_source(
                Environment::with_prefix("PROFILEGATE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("profile.allowed_hosts")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.upstream.api_key.trim().is_empty() {
            return Err(AppError::Config(
                "upstream.api_key must be set".to_string(),
            ));
        }

        match url::Url::parse(&self.upstream.endpoint) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => {
                return Err(AppError::Config(
                    "upstream.endpoint must be an http(s) URL".to_string(),
                ));
            }
        }

        if self.upstream.timeout_secs == 0 {
            return Err(AppError::Config(
                "upstream.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(AppError::Config(
                "cache.ttl_secs must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            return Err(AppError::Config(
                "rate_limit.window_secs and rate_limit.max_requests must be greater than 0"
                    .to_string(),
            ));
        }

        if self.profile.allowed_hosts.is_empty() {
            return Err(AppError::Config(
                "profile.allowed_hosts must not be empty".to_string(),
            ));
        }

        if self.server.trust_forwarded_for {
            tracing::warn!("Trusting X-Forwarded-For for client identity");
        }

        Ok(())
    }
}

#[cfg(test)]
impl AppConfig {
    /// Complete, valid configuration for unit tests
    pub(crate) fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 4000,
                trust_forwarded_for: false,
            },
            upstream: UpstreamConfig {
                endpoint: "https://api.example.com/twitter/user/info".to_string(),
                api_key: "test-api-key".to_string(),
                api_key_header: "X-API-Key".to_string(),
                handle_param: "userName".to_string(),
                timeout_secs: 30,
            },
            cache: CacheConfig {
                ttl_secs: 3600,
                prune_interval_secs: 300,
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: 20,
                max_tracked_clients: 10_000,
            },
            profile: ProfileConfig {
                allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
            },
            cors: CorsConfig {
                allowed_origins: vec!["https://cards.example.com".to_string()],
                allow_localhost: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
