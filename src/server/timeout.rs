//! Request-level timeout.
//!
//! Every request races against a timer. When the timer wins, the client gets
//! a `408 Request Timeout` with an explanatory body. Work running on its own
//! task (such as an in-flight filter) is not aborted.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

/// Default request timeout (5 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

const TIMEOUT_DETAILS: &str = "Request could have timed out due to poorly formatted url \
     or image filtering taking longer than is required.";

/// Upper bound on how long any request may take to produce a response.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    duration: Duration,
}

impl TimeoutGuard {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Default for TimeoutGuard {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

/// Body of a timeout response.
#[derive(Debug, Serialize)]
pub struct TimeoutResponse {
    pub error: String,
    pub details: String,
    pub code: String,
    pub status: u16,
}

/// Error returned when the guard's timer fires first.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimedOut {
    pub after: Duration,
}

impl IntoResponse for RequestTimedOut {
    fn into_response(self) -> Response {
        let status = StatusCode::REQUEST_TIMEOUT;
        warn!(
            error_type = "request_timeout",
            status = status.as_u16(),
            timeout_ms = self.after.as_millis() as u64,
            "Request timed out"
        );

        let body = TimeoutResponse {
            error: "Request timed out".to_string(),
            details: TIMEOUT_DETAILS.to_string(),
            code: "request_timeout".to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

/// Axum middleware racing the rest of the stack against the guard's timer.
pub async fn timeout_middleware(
    State(guard): State<TimeoutGuard>,
    request: Request,
    next: Next,
) -> Result<Response, RequestTimedOut> {
    tokio::time::timeout(guard.duration, next.run(request))
        .await
        .map_err(|_| RequestTimedOut {
            after: guard.duration,
        })
}
