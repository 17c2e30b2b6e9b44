//! API request types

use serde::Deserialize;

/// Body of a profile request
///
/// The field keeps the name the card frontend already sends.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRequest {
    #[serde(
        rename = "twitterUrl",
        alias = "input",
        alias = "url",
        alias = "handle",
        default
    )]
    pub twitter_url: Option<String>,
}
