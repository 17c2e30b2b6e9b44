//! Provider response shape
//!
//! Maps the provider's `data` object into a `ProfileRecord`. The mapping is
//! deterministic: the same document always yields the same record.

use serde::Deserialize;
use serde_json::Value;

use super::UpstreamError;
use crate::data::ProfileRecord;

/// Top-level provider document
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderResponse {
    pub data: Option<ProviderProfile>,
}

/// Provider user object
///
/// Counts arrive as numbers or strings depending on the provider build, so
/// they are kept as raw JSON values until mapping.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub name: Option<String>,
    pub user_name: Option<String>,
    pub description: Option<String>,
    pub profile_picture: Option<String>,
    pub following: Option<Value>,
    pub followers: Option<Value>,
    pub location: Option<String>,
    #[serde(rename = "profile_bio")]
    pub profile_bio: Option<Value>,
}

impl ProviderResponse {
    /// Parse a raw body and map it
    pub fn parse(body: &[u8]) -> Result<ProfileRecord, UpstreamError> {
        let response: ProviderResponse = serde_json::from_slice(body)
            .map_err(|e| UpstreamError::Malformed(format!("invalid JSON: {}", e)))?;
        response.into_profile()
    }

    /// Map the `data` object into a `ProfileRecord`
    pub fn into_profile(self) -> Result<ProfileRecord, UpstreamError> {
        let data = self
            .data
            .ok_or_else(|| UpstreamError::Malformed("missing data object".to_string()))?;
        data.into_profile()
    }
}

impl ProviderProfile {
    pub fn into_profile(self) -> Result<ProfileRecord, UpstreamError> {
        let name = required(self.name, "name")?;
        let user_name = required(self.user_name, "userName")?;
        let picture = required(self.profile_picture, "profilePicture")?;
        let website = self.profile_bio.as_ref().and_then(website_from_bio);

        Ok(ProfileRecord {
            name,
            handle: format!("@{}", user_name),
            bio: self.description.unwrap_or_default(),
            avatar_url: high_resolution_avatar(&picture),
            following_count: count_to_string(self.following.as_ref()),
            followers_count: count_to_string(self.followers.as_ref()),
            location: self.location.filter(|l| !l.is_empty()),
            website,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, UpstreamError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| UpstreamError::Malformed(format!("missing field `{}`", field)))
}

/// Swap the thumbnail size suffix for the 400x400 rendition
fn high_resolution_avatar(url: &str) -> String {
    url.replace("_normal", "_400x400")
}

fn count_to_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => "0".to_string(),
    }
}

/// `profile_bio.entities.url.urls[0].expanded_url`
fn website_from_bio(bio: &Value) -> Option<String> {
    bio.pointer("/entities/url/urls/0/expanded_url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(ToOwned::to_owned)
}
