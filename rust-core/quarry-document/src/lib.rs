// SPDX-License-Identifier: PMPL-1.0-or-later
//! Quarry Document Store
//!
//! Keyed storage for the documents a search runs over.
//! Searches never read the store directly: they take a [`DocumentStore::snapshot`]
//! and evaluate against that immutable corpus.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use quarry_query::{Document, Key};

mod store;
pub use store::InMemoryDocumentStore;

/// Document store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid key on field {field}: {reason}")]
    InvalidKey { field: String, reason: String },

    #[error("Invalid meta value for field {field}: {reason}")]
    InvalidMeta { field: String, reason: String },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
}

impl DocumentError {
    pub(crate) fn invalid_meta(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DocumentError::InvalidMeta {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Field holding each document's unique key.
    pub key_field: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_field: "id".to_string(),
        }
    }
}

/// Fields to merge into the document referenced by `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMeta {
    pub key: Key,
    /// JSON-encoded values; `null` removes the field.
    pub meta: HashMap<String, Vec<u8>>,
}

/// Keyed document storage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace documents, returning one key per document in input order.
    async fn add(&self, documents: Vec<Document>) -> Result<Vec<Key>>;

    /// Fetch documents by key. Unknown keys are skipped.
    async fn get(&self, keys: &[Key]) -> Result<Vec<Document>>;

    /// Remove documents. Unknown keys are ignored.
    async fn delete(&self, keys: &[Key]) -> Result<()>;

    /// Merge fields into existing documents; either every patch applies or none does.
    async fn patch(&self, patches: Vec<KeyMeta>) -> Result<()>;

    /// Immutable view of every document in insertion order.
    async fn snapshot(&self) -> Arc<Vec<Document>>;

    /// Number of stored documents
    async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
