//! Bearer-token verification gate.
//!
//! Protected routes require two headers:
//!
//! ```text
//! Authorization: Bearer <token>
//! key: <the key the token was issued for>
//! ```
//!
//! The gate verifies the token with the [`Signer`], compares the embedded key
//! with the `key` header, and only then hands the request to the protected
//! handler with an [`AuthContext`] in its extensions.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

use super::handlers::ErrorResponse;
use crate::signer::{Signer, TokenRejection};

/// Name of the header carrying the caller's key on protected requests.
pub const KEY_HEADER: &str = "key";

// =============================================================================
// Types
// =============================================================================

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Key absent at issuance, or a required header absent at verification
    MissingCredential,

    /// Token failed verification; the reason is only logged
    TokenInvalidOrExpired(TokenRejection),

    /// Token is valid but was issued for a different key
    TokenMismatch,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredential => write!(
                f,
                "Bad request. Please enter your \"key\" in the request body or headers"
            ),
            AuthError::TokenInvalidOrExpired(_) => write!(
                f,
                "Unable to verify user. Be sure your auth token is not expired"
            ),
            AuthError::TokenMismatch => write!(f, "Token and key mismatch"),
        }
    }
}

impl AuthError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::MissingCredential => (StatusCode::BAD_REQUEST, "missing_credential"),
            AuthError::TokenInvalidOrExpired(_) => {
                (StatusCode::UNAUTHORIZED, "token_invalid_or_expired")
            }
            AuthError::TokenMismatch => (StatusCode::UNAUTHORIZED, "token_mismatch"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_code();
        let message = self.to_string();

        // Bad signatures and key mismatches could indicate tampering, log at warn.
        // Expired and missing credentials are routine, log at debug.
        match &self {
            AuthError::TokenInvalidOrExpired(TokenRejection::InvalidSignature)
            | AuthError::TokenMismatch => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            AuthError::TokenInvalidOrExpired(reason) => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    reason = %reason,
                    "Authentication failed"
                );
            }
            AuthError::MissingCredential => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Credential extraction
// =============================================================================

/// Pull the bearer token and raw key bytes out of the request headers.
///
/// Only an absent header is a missing credential. An `Authorization` value
/// that is not `Bearer <ascii token>` is returned as an unverifiable token.
fn credentials(headers: &HeaderMap) -> Result<(&str, &[u8]), AuthError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let key = headers
        .get(KEY_HEADER)
        .ok_or(AuthError::MissingCredential)?;

    let token = authorization
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::TokenInvalidOrExpired(TokenRejection::Malformed))?;

    Ok((token, key.as_bytes()))
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Axum middleware gating protected routes behind a valid token and key.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware, routing::get};
/// use image_filter_server::server::auth::verify_token;
/// use image_filter_server::signer::Signer;
///
/// let signer = Signer::new("secret-key");
/// let app = Router::new()
///     .route("/filteredimage", get(handler))
///     .route_layer(middleware::from_fn_with_state(signer, verify_token));
/// ```
pub async fn verify_token(
    State(signer): State<Signer>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let context = {
        let (token, key) = credentials(request.headers())?;
        let context = signer.verify(token)?;
        if context.key.as_bytes() != key {
            return Err(AuthError::TokenMismatch);
        }
        context
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

// =============================================================================
// Tests
// =============================================================================
