//! Image filtering layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │ Url
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        ImageFilterService Trait         │
//! │   (fetch + transform → local file)      │
//! └────────────────────┬────────────────────┘
//!                      │ PathBuf
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             FilteredImage               │
//! │  (owns the file, reaped on drop via     │
//! │   TempFileReaper)                       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! A [`FilteredImage`] is the only owner of a produced file. It can be turned
//! into a response body that carries the guard along, so the file is deleted
//! once the body has been sent or abandoned, and never before.

mod greyscale;
mod reaper;

use std::mem;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use futures_util::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::error::FilterError;

pub use greyscale::{
    apply_filter, GreyscaleFilter, DEFAULT_MAX_IMAGE_BYTES, FILTERED_JPEG_QUALITY,
    FILTERED_SIZE,
};
pub use reaper::TempFileReaper;

/// Produces a filtered copy of a remote image on local disk.
///
/// Implementations return the path of a file the caller takes ownership of.
/// The caller is responsible for deleting it.
#[async_trait]
pub trait ImageFilterService: Send + Sync + 'static {
    async fn filter(&self, source: &Url) -> Result<PathBuf, FilterError>;
}

// =============================================================================
// Scoped ownership of a filtered file
// =============================================================================

/// Owner of a filtered file on disk. Dropping it schedules deletion.
#[derive(Debug)]
pub struct FilteredImage {
    path: PathBuf,
    reaper: TempFileReaper,
}

impl FilteredImage {
    pub fn new(path: PathBuf, reaper: TempFileReaper) -> Self {
        Self { path, reaper }
    }

    /// MIME type derived from the file extension.
    pub fn content_type(&self) -> &'static str {
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("bmp") => "image/bmp",
            _ => "application/octet-stream",
        }
    }

    /// Open the file as a streaming body of known length.
    ///
    /// The guard moves into the body; the file is reaped when the body is
    /// dropped. If opening fails, the guard is dropped here and the file is
    /// reaped immediately.
    pub async fn into_body(self) -> std::io::Result<(Body, u64)> {
        let file = File::open(&self.path).await?;
        let len = file.metadata().await?.len();

        let stream = FilteredStream {
            inner: ReaderStream::new(file),
            _image: self,
        };
        Ok((Body::from_stream(stream), len))
    }
}

impl Drop for FilteredImage {
    fn drop(&mut self) {
        let path = mem::take(&mut self.path);
        if !path.as_os_str().is_empty() {
            self.reaper.delete(vec![path]);
        }
    }
}

/// File contents stream that keeps its [`FilteredImage`] alive until dropped.
struct FilteredStream {
    inner: ReaderStream<File>,
    _image: FilteredImage,
}

impl Stream for FilteredStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
