// SPDX-License-Identifier: PMPL-1.0-or-later
//! Quarry API
//!
//! gRPC server for Quarry.
//! Exposes the `Query` service (search, evaluate, compare) and the `Document`
//! service (add, get, delete, patch) over one listener.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use quarry_document::{DocumentStore, InMemoryDocumentStore, StoreConfig};
use quarry_proto::{DocumentServer, QueryServer};
use quarry_query::{Engine, EngineConfig};

pub mod auth;
pub mod grpc;

use auth::ApiKeyAuth;
use grpc::{DocumentHandler, QueryHandler};

/// API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid listen address {0}")]
    Address(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// API configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Accepted API keys; empty disables authentication.
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
    pub log_format: LogFormat,
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
            api_keys: Vec::new(),
            log_format: LogFormat::default(),
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Defaults overridden by `QUARRY_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `QUARRY_*` name.
    /// Values that fail to parse are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("QUARRY_HOST") {
            config.host = host;
        }
        if let Some(port) = parsed(&lookup, "QUARRY_PORT") {
            config.port = port;
        }
        if let Some(timeout_ms) = parsed(&lookup, "QUARRY_TIMEOUT_MS") {
            config.engine.timeout_ms = timeout_ms;
        }
        if let Some(field) = lookup("QUARRY_KEY_FIELD") {
            if field.is_empty() {
                warn!("ignoring empty QUARRY_KEY_FIELD");
            } else {
                config.store.key_field = field;
            }
        }
        if let Some(keys) = lookup("QUARRY_API_KEYS") {
            config.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(format) = lookup("QUARRY_LOG_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "json" => config.log_format = LogFormat::Json,
                "text" => config.log_format = LogFormat::Text,
                other => warn!(value = other, "ignoring unknown QUARRY_LOG_FORMAT"),
            }
        }

        config
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ApiError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ApiError::Address(addr))
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}

/// Application state shared by both services
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            engine: Arc::new(Engine::new(config.engine.clone())),
            store: Arc::new(InMemoryDocumentStore::new(config.store.clone())),
        }
    }
}

/// Build gRPC server routes. Returns a tonic Router that can be served.
pub fn build_grpc_router(state: AppState, config: &ApiConfig) -> tonic::transport::server::Router {
    let auth = ApiKeyAuth::new(config.api_keys.iter().cloned());
    if auth.is_enabled() {
        info!(keys = config.api_keys.len(), "API key authentication enabled");
    }

    let query_svc = QueryServer::with_interceptor(QueryHandler::new(state.clone()), auth.clone());
    let document_svc = DocumentServer::with_interceptor(DocumentHandler::new(state), auth);

    tonic::transport::Server::builder()
        .add_service(query_svc)
        .add_service(document_svc)
}

/// Start the API server
pub async fn serve(config: ApiConfig) -> Result<(), ApiError> {
    let addr = config.listen_addr()?;
    let state = AppState::new(&config);
    info!("Starting Quarry gRPC server on {}", addr);

    build_grpc_router(state, &config).serve(addr).await?;
    Ok(())
}
