//! # Authentication Module
//!
//! API key authentication for the Bihak HTTP API.
//!
//! Two tiers:
//! - team routes accept `BIHAK_API_KEY` or `BIHAK_ADMIN_KEY`
//! - staff routes (review, status changes, export) accept only the admin key,
//!   or the API key when no admin key is configured
//!
//! `/health` sits outside both tiers. Send the key in the Authorization header:
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```

use crate::config::ServerConfig;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

// =============================================================================
// KEY COMPARISON
// =============================================================================

/// Constant-time key comparison.
///
/// Both keys are padded to the same length so `ct_eq` always runs over the
/// same number of bytes.
pub fn key_matches(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// Check the Authorization header against `keys`. No keys means open access.
async fn authorize(
    keys: &[&str],
    tier: &'static str,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if keys.is_empty() {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header_value) = auth_header else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            tier,
            "Missing Authorization header"
        );
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    };

    // "Bearer <key>" or the raw key
    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);

    // Every key is compared so timing does not reveal which one matched.
    let valid = keys
        .iter()
        .fold(false, |acc, expected| key_matches(provided, expected) | acc);

    if valid {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            tier,
            "Authentication failed: invalid API key"
        );
        Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Guards team-facing routes.
pub async fn team_auth_middleware(
    State(config): State<Arc<ServerConfig>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    authorize(&config.team_keys(), "team", request, next).await
}

/// Guards staff routes.
pub async fn admin_auth_middleware(
    State(config): State<Arc<ServerConfig>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    authorize(&config.admin_keys(), "admin", request, next).await
}
