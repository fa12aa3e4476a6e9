//! # Image Filter Server
//!
//! A small HTTP service that fetches a publicly reachable image, filters it,
//! streams the result back and deletes the temporary file afterwards.
//!
//! ## Features
//!
//! - **Token-gated access**: `POST /auth` issues a 24-hour HMAC-SHA256 bearer
//!   token bound to a caller-chosen key; protected calls present both
//! - **Request timeout**: every request is answered within a configurable bound
//! - **Scoped cleanup**: filtered files are owned by a guard and reaped once the
//!   response body is done, on every exit path
//!
//! ## Architecture
//!
//! - [`signer`] - Token issuance and verification
//! - [`filter`] - Filter trait, default greyscale filter, temp file reaping
//! - [`server`] - Axum handlers, token gate, timeout guard and router
//! - [`config`] - CLI and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_filter_server::{create_router, GreyscaleFilter, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let filter = GreyscaleFilter::new(std::env::temp_dir()).unwrap();
//!     let router = create_router(filter, RouterConfig::new("my-secret"));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8082").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod server;
pub mod signer;

// Re-export commonly used types
pub use config::Config;
pub use error::FilterError;
pub use filter::{
    apply_filter, FilteredImage, GreyscaleFilter, ImageFilterService, TempFileReaper,
};
pub use server::{
    create_router, verify_token, AppState, AuthError, ErrorResponse, RouterConfig, TimeoutGuard,
    KEY_HEADER,
};
pub use signer::{AuthContext, Claims, Signer, Token, TokenRejection, TOKEN_TTL};
