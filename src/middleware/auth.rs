//! Admin token authentication middleware.
//!
//! This middleware intercepts every `/admin` request to:
//! 1. Extract the token from the Authorization header
//! 2. Compare its SHA-256 digest with the digest of the configured token
//! 3. Reject unauthorized requests with HTTP 401

use crate::{error::AppError, state::AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

/// Admin authentication middleware function.
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer <ADMIN_TOKEN>
/// ```
///
/// # Returns
///
/// - `Ok(Response)` if the token matches (calls next handler)
/// - `Err(AppError::InvalidAdminToken)` otherwise (returns 401)
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or(AppError::InvalidAdminToken)?;

    // Step 1: Extract Bearer token
    let presented = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidAdminToken)?;

    // Step 2: Compare fixed-length digests rather than the raw strings
    if digest(presented) != digest(expected) {
        tracing::warn!("rejected admin request with invalid token");
        return Err(AppError::InvalidAdminToken);
    }

    Ok(next.run(request).await)
}

fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
