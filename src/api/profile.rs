//! Profile endpoints
//!
//! - POST /api/profile
//! - POST /api/scrape-twitter (path used by the card frontend)

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use tower_http::limit::RequestBodyLimitLayer;

use super::dto::ProfileRequest;
use crate::AppState;
use crate::error::AppError;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Response header reporting how the profile was served
pub const PROFILE_CACHE_HEADER: HeaderName = HeaderName::from_static("x-profile-cache");

/// Create profile router
///
/// Routes:
/// - POST /profile
/// - POST /scrape-twitter
pub fn profile_router() -> Router<AppState> {
    Router::new()
        .route("/profile", post(resolve_profile))
        .route("/scrape-twitter", post(resolve_profile))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// POST /api/profile
///
/// Body: `{"twitterUrl": "<profile URL or handle>"}`
async fn resolve_profile(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected profile request body");
        // Streamed bodies only hit the size limit while being read
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::InvalidInput(
                "Request body must be JSON with a `twitterUrl` field".to_string(),
            )
        }
    })?;

    let client_id = client_identity(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.config.server.trust_forwarded_for,
    );
    let raw = request.twitter_url.unwrap_or_default();

    let resolution = state.profiles.resolve(&raw, &client_id).await?;

    Ok((
        [(PROFILE_CACHE_HEADER, resolution.path.as_header_value())],
        Json(resolution.profile),
    )
        .into_response())
}

/// Identity used for rate limiting
///
/// The peer address, or the right-most `X-Forwarded-For` entry when the
/// server sits behind one trusted proxy.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.rsplit(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
