// SPDX-License-Identifier: PMPL-1.0-or-later
//! Quarry API server binary
//!
//! Starts the gRPC server, configured from `QUARRY_*` environment variables.

use quarry_api::{ApiConfig, LogFormat};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        timeout_ms = config.engine.timeout_ms,
        key_field = %config.store.key_field,
        "Starting Quarry API server"
    );

    quarry_api::serve(config).await?;

    Ok(())
}
