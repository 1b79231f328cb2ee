// SPDX-License-Identifier: PMPL-1.0-or-later
//! API key authentication for the gRPC services.
//!
//! A key is accepted from either the `x-api-key` metadata entry or an
//! `authorization: Bearer <key>` entry. With no keys configured every request
//! passes through. Keys are held as SHA-256 digests, never in plaintext.

use std::collections::HashSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::warn;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const AUTHORIZATION_HEADER: &str = "authorization";

#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuth {
    /// Hex SHA-256 digests of the accepted keys.
    key_hashes: Arc<HashSet<String>>,
}

impl ApiKeyAuth {
    /// Build from plaintext keys. Each key is hashed before storage.
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            key_hashes: Arc::new(keys.into_iter().map(|k| hash_key(&k)).collect()),
        }
    }

    pub fn accepts(&self, plaintext_key: &str) -> bool {
        self.key_hashes.contains(&hash_key(plaintext_key))
    }

    pub fn is_enabled(&self) -> bool {
        !self.key_hashes.is_empty()
    }

    fn presented<'a>(request: &'a Request<()>) -> Option<&'a str> {
        let metadata = request.metadata();
        if let Some(key) = metadata.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            return Some(key);
        }
        metadata
            .get(AUTHORIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

impl Interceptor for ApiKeyAuth {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        if !self.is_enabled() {
            return Ok(request);
        }
        let verdict = match Self::presented(&request) {
            Some(key) if self.accepts(key) => Ok(()),
            Some(_) => {
                warn!("rejected request with unknown API key");
                Err(Status::unauthenticated("invalid API key"))
            }
            None => Err(Status::unauthenticated("missing API key")),
        };
        verdict.map(|()| request)
    }
}

/// Hash an API key with SHA-256 for storage.
fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
