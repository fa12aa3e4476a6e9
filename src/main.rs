//! Image Filter Server binary.
//!
//! Parses configuration, starts logging and serves the router.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_filter_server::{
    config::Config,
    filter::GreyscaleFilter,
    server::{create_router, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let tmp_dir = config.tmp_dir();

    info!("Image Filter Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Request timeout: {}ms", config.request_timeout_ms);
    info!("  Temp dir: {}", tmp_dir.display());
    info!("  Max image size: {} bytes", config.max_image_bytes);
    match config.cors_origins {
        Some(ref origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => info!("  CORS origins: any"),
    }

    let filter = match GreyscaleFilter::new(&tmp_dir) {
        Ok(filter) => filter.with_max_bytes(config.max_image_bytes),
        Err(e) => {
            error!("Failed to create image filter: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let router = create_router(filter, build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server running http://{}", addr);
    info!("  Get a token:   curl -X POST http://{}/auth -H 'Content-Type: application/json' -d '{{\"key\":\"abc\"}}'", addr);
    info!("  Filter image:  curl -H 'Authorization: Bearer <token>' -H 'key: abc' 'http://{}/filteredimage?image_url=<url>'", addr);
    info!("Press CTRL+C to stop server");

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_filter_server=debug,tower_http=debug"
    } else {
        "image_filter_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the CLI configuration.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new(config.secret.clone())
        .with_request_timeout_ms(config.request_timeout_ms)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
