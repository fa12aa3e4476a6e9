use thiserror::Error;

/// Errors that can occur while fetching and filtering a source image
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    /// Only http and https sources can be fetched
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Network or connection error while fetching the source
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Source server answered with a non-success status
    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),

    /// Source body exceeds the configured limit
    #[error("Image too large: {size} bytes (limit is {limit})")]
    TooLarge { size: u64, limit: u64 },

    /// Source bytes are not a decodable image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Filtered image could not be encoded
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Local filesystem error while writing the filtered file
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FilterError {
    fn from(err: std::io::Error) -> Self {
        FilterError::Io(err.to_string())
    }
}
