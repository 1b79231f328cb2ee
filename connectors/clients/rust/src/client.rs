// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>

//! Quarry client configuration, credentials, and gRPC transport layer.
//!
//! [`QuarryClient`] is the entry point for all SDK operations. It owns one
//! channel shared by the `Query` and `Document` service stubs. Operation
//! methods are defined as `impl QuarryClient` blocks in [`crate::query`] and
//! [`crate::document`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tracing::{debug, warn};
use url::Url;

use quarry_proto::{DocumentClient, QueryClient};

use crate::error::{QuarryError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:50051";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Credentials presented with every call.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credentials {
    /// No authentication (local development, trusted networks).
    #[default]
    None,
    /// API key sent in the `x-api-key` metadata entry.
    ApiKey(String),
    /// Token sent as `authorization: Bearer <token>`.
    Bearer(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Attaches [`Credentials`] to outgoing requests.
#[derive(Clone, Default)]
pub struct CredentialInterceptor {
    header: Option<(&'static str, MetadataValue<Ascii>)>,
}

impl CredentialInterceptor {
    /// # Errors
    ///
    /// Returns [`QuarryError::Validation`] if the secret cannot be carried in
    /// gRPC metadata.
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let header = match credentials {
            Credentials::None => None,
            Credentials::ApiKey(key) => Some(("x-api-key", metadata_value(key)?)),
            Credentials::Bearer(token) => {
                Some(("authorization", metadata_value(&format!("Bearer {token}"))?))
            }
        };
        Ok(Self { header })
    }
}

fn metadata_value(raw: &str) -> Result<MetadataValue<Ascii>> {
    raw.parse()
        .map_err(|_| QuarryError::Validation("credentials must be visible ASCII".into()))
}

impl Interceptor for CredentialInterceptor {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        if let Some((name, value)) = &self.header {
            request.metadata_mut().insert(*name, value.clone());
        }
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Connection options for a [`QuarryClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    endpoint: String,
    #[serde(skip_serializing)]
    credentials: Credentials,
    timeout: Duration,
    connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials: Credentials::None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Unauthenticated configuration for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Validation`] unless `endpoint` is an `http` or
    /// `https` URL with a host.
    pub fn new(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| QuarryError::Validation(format!("Invalid endpoint: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
            return Err(QuarryError::Validation(format!(
                "Invalid endpoint: {endpoint} is not an http(s) address"
            )));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            ..Self::default()
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Configuration from `QUARRY_ENDPOINT`, `QUARRY_API_KEY`, `QUARRY_TOKEN`
    /// and `QUARRY_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`ClientConfig::from_env`], reading variables through `lookup`.
    /// An API key takes precedence over a token; an unparsable timeout is
    /// logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup("QUARRY_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let mut config = Self::new(&endpoint)?;

        if let Some(key) = lookup("QUARRY_API_KEY") {
            config.credentials = Credentials::ApiKey(key);
        } else if let Some(token) = lookup("QUARRY_TOKEN") {
            config.credentials = Credentials::Bearer(token);
        }
        if let Some(raw) = lookup("QUARRY_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => config.timeout = Duration::from_millis(ms),
                Err(_) => warn!(value = %raw, "ignoring unparsable QUARRY_TIMEOUT_MS"),
            }
        }

        Ok(config)
    }

    fn build_endpoint(&self) -> Result<Endpoint> {
        Ok(Endpoint::from_shared(self.endpoint.clone())?
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout))
    }
}

// ---------------------------------------------------------------------------
// QuarryClient
// ---------------------------------------------------------------------------

pub(crate) type AuthChannel = InterceptedService<Channel, CredentialInterceptor>;

/// The Quarry client.
///
/// Cloning is cheap; clones share the underlying channel.
///
/// # Examples
///
/// ```rust,no_run
/// use quarry_client::client::{ClientConfig, Credentials, QuarryClient};
///
/// # #[tokio::main]
/// # async fn main() -> quarry_client::error::Result<()> {
/// let config = ClientConfig::new("http://localhost:50051")?
///     .with_credentials(Credentials::ApiKey("secret".into()));
/// let client = QuarryClient::connect(config).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QuarryClient {
    pub(crate) query: QueryClient<AuthChannel>,
    pub(crate) documents: DocumentClient<AuthChannel>,
    timeout: Duration,
}

impl QuarryClient {
    /// Connect eagerly, failing if the server is unreachable.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let interceptor = CredentialInterceptor::new(&config.credentials)?;
        let channel = config.build_endpoint()?.connect().await?;
        debug!(endpoint = %config.endpoint, "connected to Quarry");
        Ok(Self::from_channel(channel, interceptor, config.timeout))
    }

    /// Connect on first use.
    pub fn connect_lazy(config: ClientConfig) -> Result<Self> {
        let interceptor = CredentialInterceptor::new(&config.credentials)?;
        let channel = config.build_endpoint()?.connect_lazy();
        Ok(Self::from_channel(channel, interceptor, config.timeout))
    }

    fn from_channel(channel: Channel, interceptor: CredentialInterceptor, timeout: Duration) -> Self {
        Self {
            query: QueryClient::with_interceptor(channel.clone(), interceptor.clone()),
            documents: DocumentClient::with_interceptor(channel, interceptor),
            timeout,
        }
    }

    /// Return the configured per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wrap `message` with the call deadline.
    pub(crate) fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request.set_timeout(self.timeout);
        request
    }

    pub(crate) fn status(&self, status: Status) -> QuarryError {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        QuarryError::from_status(status, timeout_ms)
    }
}
