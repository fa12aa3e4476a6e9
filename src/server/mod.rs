//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        POST /auth          GET /filteredimage?image_url=        │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌────────┐  │
//! │  │  handlers   │  │    auth     │  │   timeout   │  │ routes │  │
//! │  │ (endpoints) │  │ (token gate)│  │  (408 race) │  │        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod timeout;

pub use auth::{verify_token, AuthError, KEY_HEADER};
pub use handlers::{
    auth_handler, filter_image_handler, health_handler, root_handler, AppState, AuthRequest,
    AuthResponse, ErrorResponse, FilterQueryParams, HealthResponse, InvalidUrlResponse,
};
pub use routes::{create_router, RouterConfig};
pub use timeout::{timeout_middleware, RequestTimedOut, TimeoutGuard, DEFAULT_REQUEST_TIMEOUT};
