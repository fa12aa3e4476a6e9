//! Default filter: fetch, resize to 256×256, greyscale, JPEG at quality 60.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use reqwest::header::ACCEPT;
use reqwest::Client;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{ImageFilterService, TempFileReaper};
use crate::error::FilterError;

/// Width and height of every filtered image.
pub const FILTERED_SIZE: u32 = 256;

/// JPEG quality of every filtered image.
pub const FILTERED_JPEG_QUALITY: u8 = 60;

/// Default limit on the size of a fetched source image (10 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches a remote image and writes a small greyscale JPEG copy to disk.
#[derive(Debug, Clone)]
pub struct GreyscaleFilter {
    client: Client,
    tmp_dir: PathBuf,
    max_bytes: u64,
}

impl GreyscaleFilter {
    /// Create a filter writing its output files into `tmp_dir`.
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Result<Self, FilterError> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("image-filter-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FilterError::Fetch(e.to_string()))?;

        Ok(Self {
            client,
            tmp_dir: tmp_dir.into(),
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        })
    }

    /// Set the maximum accepted source size in bytes.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn fetch(&self, source: &Url) -> Result<Vec<u8>, FilterError> {
        let mut response = self
            .client
            .get(source.clone())
            .header(ACCEPT, "image/*")
            .send()
            .await
            .map_err(|e| FilterError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FilterError::UpstreamStatus(status.as_u16()));
        }

        if let Some(size) = response.content_length() {
            if size > self.max_bytes {
                return Err(FilterError::TooLarge {
                    size,
                    limit: self.max_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FilterError::Fetch(e.to_string()))?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > self.max_bytes {
                return Err(FilterError::TooLarge {
                    size,
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[async_trait]
impl ImageFilterService for GreyscaleFilter {
    async fn filter(&self, source: &Url) -> Result<PathBuf, FilterError> {
        match source.scheme() {
            "http" | "https" => {}
            other => return Err(FilterError::UnsupportedScheme(other.to_string())),
        }

        let source_bytes = self.fetch(source).await?;
        debug!(url = %source, bytes = source_bytes.len(), "Fetched source image");

        let filtered = tokio::task::spawn_blocking(move || apply_filter(&source_bytes))
            .await
            .map_err(|e| FilterError::Encode(e.to_string()))??;

        tokio::fs::create_dir_all(&self.tmp_dir).await?;
        let path = self
            .tmp_dir
            .join(format!("filtered.{}.jpg", Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&path, &filtered).await {
            TempFileReaper::new().delete(vec![path]);
            return Err(e.into());
        }

        Ok(path)
    }
}

/// Resize to [`FILTERED_SIZE`] square, convert to greyscale and encode as JPEG.
pub fn apply_filter(source: &[u8]) -> Result<Vec<u8>, FilterError> {
    let img = image::load_from_memory(source).map_err(|e| FilterError::Decode(e.to_string()))?;

    let grey = img
        .resize_exact(FILTERED_SIZE, FILTERED_SIZE, FilterType::Triangle)
        .to_luma8();

    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, FILTERED_JPEG_QUALITY);
    encoder
        .encode_image(&grey)
        .map_err(|e| FilterError::Encode(e.to_string()))?;

    Ok(output)
}
