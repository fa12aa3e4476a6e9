//! Filter endpoint integration tests.
//!
//! Tests verify:
//! - A filtered image is returned and its temp file is reaped afterwards
//! - Unparseable or missing URLs get the benign invalid-url response
//!   without reaching the filter
//! - Filter failures collapse into the same response
//! - The default greyscale filter works end to end against a local server

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;
use tower::ServiceExt;

use image_filter_server::GreyscaleFilter;

use super::test_utils::{
    body_bytes, body_json, filter_request, is_valid_jpeg, issue_bearer, test_router,
    wait_until_gone, MockFilter,
};

const IMAGE_URL: &str = "https://example.com/cat.jpg";

// =============================================================================
// Successful Filtering
// =============================================================================

#[tokio::test]
async fn test_filtered_image_returned_and_reaped() {
    let filter = MockFilter::new();
    let router = test_router(filter.clone());
    let bearer = issue_bearer(&router, "abc").await;

    let response = router
        .oneshot(filter_request(Some(IMAGE_URL), Some(&bearer), Some("abc")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert!(response.headers().contains_key("content-length"));

    let produced = filter.produced();
    assert_eq!(produced.len(), 1);

    // Not reaped while the body is still being sent
    assert!(produced[0].exists());

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body), "Response should be a valid JPEG");

    assert!(
        wait_until_gone(&produced[0]).await,
        "Temp file should be deleted after the response"
    );
}

#[tokio::test]
async fn test_each_request_reaps_its_own_file() {
    let filter = MockFilter::new();
    let router = test_router(filter.clone());
    let bearer = issue_bearer(&router, "abc").await;

    let first = router
        .clone()
        .oneshot(filter_request(Some(IMAGE_URL), Some(&bearer), Some("abc")))
        .await
        .unwrap();
    let second = router
        .oneshot(filter_request(Some(IMAGE_URL), Some(&bearer), Some("abc")))
        .await
        .unwrap();

    let produced = filter.produced();
    assert_eq!(produced.len(), 2);

    // Finishing the first response leaves the second file alone
    body_bytes(first).await;
    assert!(wait_until_gone(&produced[0]).await);
    assert!(produced[1].exists());

    body_bytes(second).await;
    assert!(wait_until_gone(&produced[1]).await);
}

// =============================================================================
// Invalid URLs
// =============================================================================

#[tokio::test]
async fn test_invalid_url_is_benign() {
    let filter = MockFilter::new();
    let router = test_router(filter.clone());
    let bearer = issue_bearer(&router, "abc").await;

    for bad in ["not-a-url", "/relative/path.jpg", "", "http://"] {
        let response = router
            .clone()
            .oneshot(filter_request(Some(bad), Some(&bearer), Some("abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "url: {:?}", bad);
        let json = body_json(response).await;
        assert_eq!(json["message"], "invalid url");
    }

    assert_eq!(filter.call_count(), 0);
}

#[tokio::test]
async fn test_missing_image_url_is_benign() {
    let filter = MockFilter::new();
    let router = test_router(filter.clone());
    let bearer = issue_bearer(&router, "abc").await;

    let response = router
        .oneshot(filter_request(None, Some(&bearer), Some("abc")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "invalid url");
    assert_eq!(filter.call_count(), 0);
}

#[tokio::test]
async fn test_filter_failure_collapses_to_invalid_url() {
    let filter = MockFilter::new().failing();
    let router = test_router(filter.clone());
    let bearer = issue_bearer(&router, "abc").await;

    let response = router
        .oneshot(filter_request(Some(IMAGE_URL), Some(&bearer), Some("abc")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "invalid url");
    assert_eq!(filter.call_count(), 1);
}

// =============================================================================
// Default Filter End to End
// =============================================================================

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[tokio::test]
async fn test_greyscale_filter_end_to_end() {
    // Local origin serving a colour PNG
    let png = png_bytes(320, 200);
    let origin = Router::new().route("/photo.png", get(move || async move { png }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, origin).await.unwrap();
    });

    let tmp = TempDir::new().unwrap();
    let router = test_router(GreyscaleFilter::new(tmp.path()).unwrap());
    let bearer = issue_bearer(&router, "abc").await;

    let image_url = format!("http://{}/photo.png", addr);
    let response = router
        .oneshot(filter_request(Some(&image_url), Some(&bearer), Some("abc")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));

    let decoded = image::load_from_memory(&body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (256, 256));
    assert_eq!(decoded.color(), image::ColorType::L8);

    // The temp dir ends up empty once the file is reaped
    let mut emptied = false;
    for _ in 0..200 {
        if std::fs::read_dir(tmp.path()).unwrap().next().is_none() {
            emptied = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(emptied, "Filtered file should be reaped");
}

#[tokio::test]
async fn test_greyscale_filter_unreachable_origin() {
    let tmp = TempDir::new().unwrap();
    let router = test_router(GreyscaleFilter::new(tmp.path()).unwrap());
    let bearer = issue_bearer(&router, "abc").await;

    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let image_url = format!("http://{}/photo.png", addr);
    let response = router
        .oneshot(filter_request(Some(&image_url), Some(&bearer), Some("abc")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "invalid url");
}
