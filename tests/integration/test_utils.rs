//! Test utilities for integration tests.
//!
//! Provides a mock filter that writes small JPEG files into a temporary
//! directory and records what it produced, plus request helpers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Luma};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use image_filter_server::{create_router, FilterError, ImageFilterService, RouterConfig};

pub const TEST_SECRET: &str = "test-secret-key-for-hmac-signing";

// =============================================================================
// Mock Filter
// =============================================================================

/// Filter that ignores the URL and writes a small JPEG to its own temp dir.
#[derive(Clone)]
pub struct MockFilter {
    dir: Arc<TempDir>,
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    produced: Arc<Mutex<Vec<PathBuf>>>,
    delay: Duration,
    fail: bool,
}

impl MockFilter {
    pub fn new() -> Self {
        Self {
            dir: Arc::new(TempDir::new().unwrap()),
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            produced: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    /// Sleep for `delay` before producing the file.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call instead of producing a file.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn produced(&self) -> Vec<PathBuf> {
        self.produced.lock().unwrap().clone()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for MockFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFilterService for MockFilter {
    async fn filter(&self, _source: &Url) -> Result<PathBuf, FilterError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail {
            self.completed.fetch_add(1, Ordering::SeqCst);
            return Err(FilterError::UpstreamStatus(500));
        }

        let path = self.dir.path().join(format!("filtered.{}.jpg", call));
        tokio::fs::write(&path, create_test_jpeg(16, 16, 60)).await?;

        self.produced.lock().unwrap().push(path.clone());
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(path)
    }
}

// =============================================================================
// Router and Request Helpers
// =============================================================================

/// Router around `filter` with tracing off and the test secret.
pub fn test_router<F: ImageFilterService>(filter: F) -> Router {
    create_router(filter, RouterConfig::new(TEST_SECRET).with_tracing(false))
}

/// Router with a custom request timeout.
pub fn test_router_with_timeout<F: ImageFilterService>(filter: F, timeout: Duration) -> Router {
    create_router(
        filter,
        RouterConfig::new(TEST_SECRET)
            .with_tracing(false)
            .with_request_timeout(timeout),
    )
}

/// Build a `POST /auth` request with a raw JSON body.
pub fn auth_request(json_body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth")
        .header("content-type", "application/json")
        .body(Body::from(json_body.to_string()))
        .unwrap()
}

/// Obtain an `Authorization` header value through `POST /auth`.
pub async fn issue_bearer(router: &Router, key: &str) -> String {
    let body = serde_json::json!({ "key": key }).to_string();
    let response = router.clone().oneshot(auth_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    json["Authorization"].as_str().unwrap().to_string()
}

/// Build a `GET /filteredimage` request with optional auth headers.
pub fn filter_request(
    image_url: Option<&str>,
    authorization: Option<&str>,
    key: Option<&str>,
) -> Request<Body> {
    let uri = match image_url {
        Some(url) => format!(
            "/filteredimage?image_url={}",
            url::form_urlencoded::byte_serialize(url.as_bytes()).collect::<String>()
        ),
        None => "/filteredimage".to_string(),
    };

    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    if let Some(value) = key {
        builder = builder.header("key", value);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll until `path` no longer exists, for up to two seconds.
pub async fn wait_until_gone(path: &Path) -> bool {
    for _ in 0..200 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Poll until `check` holds, for up to two seconds.
pub async fn wait_for(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// =============================================================================
// Test Images
// =============================================================================

/// Create a test JPEG image with a simple gradient pattern.
pub fn create_test_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| {
        let val = ((x + y) % 256) as u8;
        Luma([val])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Check if data is a valid JPEG.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    if data[0] != 0xFF || data[1] != 0xD8 {
        return false;
    }

    if data[data.len() - 2] != 0xFF || data[data.len() - 1] != 0xD9 {
        return false;
    }

    image::load_from_memory_with_format(data, image::ImageFormat::Jpeg).is_ok()
}
