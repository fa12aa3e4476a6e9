//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /                          - Usage hint (public)
//! /health                    - Health check (public)
//! /auth                      - Token issuance (public, POST)
//! /filteredimage?image_url=  - Image filtering (bearer token + key header)
//! ```
//!
//! # Guard Order
//!
//! ```text
//! TraceLayer → CORS → TimeoutGuard → [verify_token] → handler
//! ```
//!
//! Each guard can answer on its own; nothing behind a guard runs until it
//! lets the request through.
//!
//! # Example
//!
//! ```ignore
//! use image_filter_server::filter::GreyscaleFilter;
//! use image_filter_server::server::routes::{create_router, RouterConfig};
//!
//! let filter = GreyscaleFilter::new("/tmp/image-filter-server")?;
//! let config = RouterConfig::new("my-secret-key").with_request_timeout_ms(5000);
//! let router = create_router(filter, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8082").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{verify_token, KEY_HEADER};
use super::handlers::{
    auth_handler, filter_image_handler, health_handler, root_handler, AppState,
};
use super::timeout::{timeout_middleware, TimeoutGuard, DEFAULT_REQUEST_TIMEOUT};
use crate::filter::ImageFilterService;
use crate::signer::Signer;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Secret used to sign and verify tokens
    pub secret: String,

    /// Upper bound on request duration
    pub request_timeout: Duration,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("secret", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("cors_origins", &self.cors_origins)
            .field("enable_tracing", &self.enable_tracing)
            .finish()
    }
}

impl RouterConfig {
    /// Create a new router configuration with the given signing secret.
    ///
    /// By default:
    /// - Requests time out after 5 seconds
    /// - CORS allows any origin
    /// - Tracing is enabled
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cors_origins: None,
            enable_tracing: true,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_request_timeout_ms(self, millis: u64) -> Self {
        self.with_request_timeout(Duration::from_millis(millis))
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router around an image filter.
pub fn create_router<F>(filter: F, config: RouterConfig) -> Router
where
    F: ImageFilterService,
{
    let signer = Signer::new(&config.secret);
    let app_state = AppState::new(filter, signer.clone());
    let guard = TimeoutGuard::new(config.request_timeout);
    let cors = build_cors_layer(&config);

    // route_layer keeps unmatched paths as 404 instead of running the gate
    let protected_routes = Router::new()
        .route("/filteredimage", get(filter_image_handler::<F>))
        .route_layer(middleware::from_fn_with_state(signer, verify_token))
        .with_state(app_state.clone());

    let public_routes = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/auth", post(auth_handler::<F>))
        .with_state(app_state);

    let router = Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .layer(middleware::from_fn_with_state(guard, timeout_middleware))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(KEY_HEADER),
        ])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
