//! Profile key normalization
//!
//! Accepts a bare handle, `@handle`, or a profile URL on an allowed host and
//! produces the canonical lower-case `CacheKey`.

use crate::data::CacheKey;
use crate::error::AppError;

/// Longest handle the profile host allows
pub const MAX_HANDLE_LEN: usize = 15;

/// Upper bound on raw input accepted for parsing
const MAX_INPUT_LEN: usize = 2048;

/// First path segments that are site routes rather than profiles
const RESERVED_SEGMENTS: &[&str] = &[
    "home",
    "i",
    "explore",
    "search",
    "settings",
    "intent",
    "share",
    "hashtag",
    "messages",
    "notifications",
];

/// Derives cache keys from user-supplied identifiers
#[derive(Debug, Clone)]
pub struct KeyNormalizer {
    allowed_hosts: Vec<String>,
}

impl KeyNormalizer {
    /// Create a normalizer accepting URLs on `allowed_hosts`
    pub fn new<I, S>(allowed_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|host| normalize_host(host.as_ref()))
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }

    /// Normalize a raw identifier into a `CacheKey`
    ///
    /// # Errors
    /// `AppError::InvalidInput` for empty input, unparseable or foreign URLs,
    /// site routes, and handles outside `[A-Za-z0-9_]{1,15}`.
    pub fn normalize(&self, raw: &str) -> Result<CacheKey, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput(
                "A profile URL or handle is required".to_string(),
            ));
        }
        if trimmed.len() > MAX_INPUT_LEN {
            return Err(AppError::InvalidInput("Input is too long".to_string()));
        }

        let candidate = if looks_like_url(trimmed) {
            self.handle_from_url(trimmed)?
        } else {
            trimmed.to_string()
        };

        let handle = candidate.strip_prefix('@').unwrap_or(&candidate);
        validate_handle(handle)?;

        Ok(CacheKey::from_handle(handle))
    }

    fn handle_from_url(&self, input: &str) -> Result<String, AppError> {
        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };

        let url = url::Url::parse(&with_scheme)
            .map_err(|_| AppError::InvalidInput("Invalid URL format".to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AppError::InvalidInput("Invalid URL format".to_string()));
        }

        let host = url.host_str().map(normalize_host).unwrap_or_default();
        if !self.allowed_hosts.iter().any(|allowed| *allowed == host) {
            return Err(AppError::InvalidInput(
                "Invalid Twitter/X.com URL".to_string(),
            ));
        }

        let segment = url
            .path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()))
            .ok_or_else(|| {
                AppError::InvalidInput("Could not parse screen name from URL".to_string())
            })?;

        if RESERVED_SEGMENTS
            .iter()
            .any(|reserved| segment.eq_ignore_ascii_case(reserved))
        {
            return Err(AppError::InvalidInput(
                "URL does not point to a profile".to_string(),
            ));
        }

        Ok(segment.to_string())
    }
}

fn looks_like_url(input: &str) -> bool {
    input.contains("://") || input.contains('/') || input.contains('.')
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn validate_handle(handle: &str) -> Result<(), AppError> {
    if handle.is_empty() || handle.len() > MAX_HANDLE_LEN {
        return Err(AppError::InvalidInput(format!(
            "Handle must be 1 to {} characters",
            MAX_HANDLE_LEN
        )));
    }

    if !handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::InvalidInput(
            "Handle may only contain letters, digits and underscores".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALLOWED_HOSTS;

    fn normalizer() -> KeyNormalizer {
        KeyNormalizer::new(DEFAULT_ALLOWED_HOSTS)
    }

    fn key(input: &str) -> String {
        normalizer().normalize(input).unwrap().to_string()
    }

    #[test]
    fn test_surface_forms_share_a_key() {
        assert_eq!(key("alice"), "alice");
        assert_eq!(key("@alice"), "alice");
        assert_eq!(key("  @Alice  "), "alice");
        assert_eq!(key("https://x.com/alice"), "alice");
        assert_eq!(key("https://twitter.com/Alice/status/123?s=20"), "alice");
        assert_eq!(key("http://www.twitter.com//alice/"), "alice");
        assert_eq!(key("x.com/alice"), "alice");
        assert_eq!(key("https://X.COM./alice#top"), "alice");
        assert_eq!(key("https://mobile.x.com/@alice"), "alice");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let first = key("https://x.com/Some_User");
        assert_eq!(key(&first), first);
        assert_eq!(key(&format!("@{}", first)), first);
        assert_eq!(key(&format!("https://twitter.com/{}", first)), first);
    }

    #[test]
    fn test_rejects_foreign_hosts() {
        for input in [
            "https://example.com/alice",
            "https://x.com.evil.com/alice",
            "https://notx.com/alice",
        ] {
            let error = normalizer().normalize(input).unwrap_err();
            assert!(
                matches!(error, AppError::InvalidInput(_)),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_urls_without_profile() {
        for input in [
            "https://x.com",
            "https://x.com/",
            "https://x.com/home",
            "https://twitter.com/i/lists/1",
            "https://x.com/search?q=rust",
            "ftp://x.com/alice",
        ] {
            assert!(
                normalizer().normalize(input).is_err(),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_invalid_handles() {
        for input in [
            "",
            "   ",
            "@",
            "al ice",
            "alice!",
            "ålice",
            "a_handle_that_is_too_long",
            "https://x.com/al-ice",
        ] {
            assert!(
                normalizer().normalize(input).is_err(),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_accepts_max_length_handle() {
        let handle = "a".repeat(MAX_HANDLE_LEN);
        assert_eq!(key(&handle), handle);
        assert!(normalizer().normalize(&"a".repeat(MAX_HANDLE_LEN + 1)).is_err());
    }

    #[test]
    fn test_custom_allowed_hosts() {
        let normalizer = KeyNormalizer::new(["profiles.example.org"]);
        assert_eq!(
            normalizer
                .normalize("https://profiles.example.org/Bob")
                .unwrap()
                .as_str(),
            "bob"
        );
        assert!(normalizer.normalize("https://x.com/bob").is_err());
    }
}
