//! Static bearer token authentication.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Marker extracted from requests that carry the configured token.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

#[axum::async_trait]
impl FromRequestParts<AppState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        // An unset server token never matches.
        if state.config.api_token.is_empty() || token.trim() != state.config.api_token {
            debug!(path = %parts.uri.path(), "Rejected bearer token");
            return Err(ApiError::unauthorized("Invalid token"));
        }

        Ok(Authorized)
    }
}
