//! Configuration management.
//!
//! Every option can be given on the command line or through the environment:
//!
//! - `HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 8082)
//! - `SECRET` - Token signing secret (required)
//! - `REQUEST_TIMEOUT` - Request timeout in milliseconds (default: 5000)
//! - `TMP_DIR` - Directory for filtered files (default: system temp dir)
//! - `MAX_IMAGE_BYTES` - Largest accepted source image (default: 10 MiB)
//! - `CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::path::PathBuf;

use clap::Parser;

use crate::filter::DEFAULT_MAX_IMAGE_BYTES;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8082;

/// Default request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Name of the directory created under the system temp dir.
pub const DEFAULT_TMP_DIR_NAME: &str = "image-filter-server";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image Filter Server - fetch, filter and return public images.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-filter-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Secret used to sign bearer tokens.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    pub secret: String,

    /// Request timeout in milliseconds.
    #[arg(long = "request-timeout", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS, env = "REQUEST_TIMEOUT")]
    pub request_timeout_ms: u64,

    /// Directory where filtered images are written before being sent.
    ///
    /// Defaults to a subdirectory of the system temp dir.
    #[arg(long, env = "TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Largest source image accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_BYTES, env = "MAX_IMAGE_BYTES")]
    pub max_image_bytes: u64,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Signing secret is required. Set --secret or SECRET".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("request_timeout must be greater than 0".to_string());
        }

        if self.max_image_bytes == 0 {
            return Err("max_image_bytes must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Directory for filtered files, falling back to the system temp dir.
    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_TMP_DIR_NAME))
    }
}

// =============================================================================
// Tests
// =============================================================================
