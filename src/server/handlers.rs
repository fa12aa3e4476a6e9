//! HTTP request handlers.
//!
//! # Endpoints
//!
//! - `GET /` - Usage hint
//! - `GET /health` - Health check endpoint
//! - `POST /auth` - Issue a bearer token for a caller-supplied key
//! - `GET /filteredimage?image_url={url}` - Filter a public image (protected)

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::filter::{FilteredImage, ImageFilterService, TempFileReaper};
use crate::signer::{AuthContext, Signer};

use super::auth::AuthError;

/// Instruction returned alongside a freshly issued token.
pub const AUTH_INSTRUCTION: &str =
    "Add your Authorization and Key in the request header when passing your image url";

/// Body of the root endpoint.
pub const USAGE: &str = "try GET /filteredimage?image_url={{}}";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<F: ImageFilterService> {
    /// The filter producing images for `/filteredimage`
    pub filter: Arc<F>,

    /// Token issuer for `/auth`
    pub signer: Signer,

    /// Deletes filtered files after their response
    pub reaper: TempFileReaper,
}

impl<F: ImageFilterService> AppState<F> {
    pub fn new(filter: F, signer: Signer) -> Self {
        Self {
            filter: Arc::new(filter),
            signer,
            reaper: TempFileReaper::new(),
        }
    }
}

impl<F: ImageFilterService> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            filter: Arc::clone(&self.filter),
            signer: self.signer.clone(),
            reaper: self.reaper,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Body of `POST /auth`.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub key: Option<String>,
}

/// Query parameters for the filter endpoint.
#[derive(Debug, Deserialize)]
pub struct FilterQueryParams {
    /// URL of a publicly accessible image
    #[serde(default)]
    pub image_url: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for client errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,

    /// Error type identifier (e.g., "token_mismatch")
    pub code: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        code: impl Into<String>,
        error: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Body of a successful `POST /auth`.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(rename = "Authorization")]
    pub authorization: String,
    pub instruction: String,
}

/// Benign response for an unusable `image_url`.
///
/// Filter failures are reported the same way; the cause is only logged.
#[derive(Debug, Serialize)]
pub struct InvalidUrlResponse {
    pub message: String,
}

impl IntoResponse for InvalidUrlResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

fn invalid_url() -> Response {
    InvalidUrlResponse {
        message: "invalid url".to_string(),
    }
    .into_response()
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /` - plain usage hint.
pub async fn root_handler() -> &'static str {
    USAGE
}

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Issue a token for the key in the request body.
///
/// # Endpoint
///
/// `POST /auth` with `{ "key": "<string>" }`
///
/// # Response
///
/// - `200 OK`: `{ "Authorization": "Bearer <token>", "instruction": "..." }`
/// - `400 Bad Request`: key missing, empty or body unreadable
pub async fn auth_handler<F: ImageFilterService>(
    State(state): State<AppState<F>>,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let key = match body {
        Ok(Json(AuthRequest { key: Some(key) })) => key,
        Ok(_) => return Err(AuthError::MissingCredential),
        Err(rejection) => {
            debug!("Unreadable auth body: {}", rejection.body_text());
            return Err(AuthError::MissingCredential);
        }
    };

    let token = state.signer.issue(&key)?;
    info!("Issued token");

    Ok(Json(AuthResponse {
        authorization: token.bearer(),
        instruction: AUTH_INSTRUCTION.to_string(),
    }))
}

/// Filter an image from a public URL.
///
/// # Endpoint
///
/// `GET /filteredimage?image_url={url}` behind the token gate.
///
/// # Response
///
/// - `200 OK`: the filtered image, streamed from disk
/// - `200 OK` with `{ "message": "invalid url" }`: the URL did not parse or
///   could not be filtered
///
/// The filtered file is deleted once the response body has been sent.
pub async fn filter_image_handler<F: ImageFilterService>(
    State(state): State<AppState<F>>,
    Extension(_auth): Extension<AuthContext>,
    query: Result<Query<FilterQueryParams>, QueryRejection>,
) -> Response {
    let raw_url = match query {
        Ok(Query(FilterQueryParams {
            image_url: Some(raw),
        })) => raw,
        Ok(_) => {
            debug!("Missing image_url");
            return invalid_url();
        }
        Err(rejection) => {
            debug!("Unreadable query: {}", rejection.body_text());
            return invalid_url();
        }
    };

    let url = match Url::parse(&raw_url) {
        Ok(url) => url,
        Err(e) => {
            debug!(image_url = %raw_url, "Invalid image_url: {}", e);
            return invalid_url();
        }
    };

    debug!(url = %url, "Filtering image");

    // The filter runs on its own task so a request timeout does not cancel it.
    // If nobody collects the result, the guard is dropped there and reaped.
    let filter = Arc::clone(&state.filter);
    let reaper = state.reaper;
    let task = tokio::spawn(async move {
        filter
            .filter(&url)
            .await
            .map(|path| FilteredImage::new(path, reaper))
    });

    let image = match task.await {
        Ok(Ok(image)) => image,
        Ok(Err(e)) => {
            warn!(error_type = "filter_failure", "Filtering failed: {}", e);
            return invalid_url();
        }
        Err(e) => {
            error!(error_type = "filter_panic", "Filter task failed: {}", e);
            return invalid_url();
        }
    };

    let content_type = image.content_type();
    let (body, len) = match image.into_body().await {
        Ok(parts) => parts,
        Err(e) => {
            error!(error_type = "io_error", "Failed to open filtered image: {}", e);
            return invalid_url();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        body,
    )
        .into_response()
}

// =============================================================================
// Tests
// =============================================================================
