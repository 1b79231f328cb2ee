// SPDX-License-Identifier: PMPL-1.0-or-later
//! In-memory document store.
//!
//! Documents live in a copy-on-write vector: a snapshot is an `Arc` clone and
//! the next write copies the vector only while a snapshot is still alive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use quarry_query::value::describe;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{Document, DocumentError, DocumentStore, Key, KeyMeta, Result, StoreConfig};

#[derive(Debug, Default)]
struct State {
    docs: Arc<Vec<Document>>,
    /// Canonical key text → position in `docs`.
    index: HashMap<String, usize>,
}

/// Document store held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    config: StoreConfig,
    state: RwLock<State>,
}

impl InMemoryDocumentStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
        }
    }

    pub fn key_field(&self) -> &str {
        &self.config.key_field
    }

    fn key_text(&self, value: &Value) -> Result<String> {
        match value {
            Value::String(_) | Value::Number(_) => Ok(value.to_string()),
            other => Err(DocumentError::InvalidKey {
                field: self.config.key_field.clone(),
                reason: format!("key must be a string or number, found {}", describe(other)),
            }),
        }
    }

    /// Ensure `doc` carries a key, returning it with its canonical text.
    fn prepare(&self, doc: Document) -> Result<(String, Key, Document)> {
        for (field, raw) in &doc.meta {
            serde_json::from_slice::<Value>(raw)
                .map_err(|e| DocumentError::invalid_meta(field, e.to_string()))?;
        }
        let field = &self.config.key_field;
        let (value, doc) = match doc
            .value(field)
            .map_err(|e| DocumentError::invalid_meta(field, e.to_string()))?
        {
            Some(v) => (v, doc),
            None => {
                let v = Value::String(Uuid::new_v4().to_string());
                let doc = doc.with_value(field, v.clone());
                (v, doc)
            }
        };
        let text = self.key_text(&value)?;
        Ok((text, Key::new(field, &value), doc))
    }

    fn resolve(&self, docs: &[Document], index: &HashMap<String, usize>, key: &Key) -> Result<Option<usize>> {
        let wanted = key.decoded().map_err(|e| DocumentError::InvalidKey {
            field: key.field.clone(),
            reason: e.to_string(),
        })?;
        if key.field == self.config.key_field {
            return Ok(index.get(&wanted.to_string()).copied());
        }
        Ok(docs
            .iter()
            .position(|d| matches!(d.value(&key.field), Ok(Some(v)) if v == wanted)))
    }

    fn reindex(&self, docs: &[Document]) -> HashMap<String, usize> {
        docs.iter()
            .enumerate()
            .filter_map(|(i, d)| match d.value(&self.config.key_field) {
                Ok(Some(v)) => Some((v.to_string(), i)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    #[instrument(skip_all, fields(count = documents.len()))]
    async fn add(&self, documents: Vec<Document>) -> Result<Vec<Key>> {
        let prepared = documents
            .into_iter()
            .map(|d| self.prepare(d))
            .collect::<Result<Vec<_>>>()?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let docs = Arc::make_mut(&mut state.docs);
        let mut keys = Vec::with_capacity(prepared.len());
        let mut replaced = 0usize;
        for (text, key, doc) in prepared {
            match state.index.get(&text) {
                Some(&i) => {
                    docs[i] = doc;
                    replaced += 1;
                }
                None => {
                    state.index.insert(text, docs.len());
                    docs.push(doc);
                }
            }
            keys.push(key);
        }
        debug!(added = keys.len() - replaced, replaced, total = docs.len(), "documents stored");
        Ok(keys)
    }

    async fn get(&self, keys: &[Key]) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(i) = self.resolve(&state.docs, &state.index, key)? {
                found.push(state.docs[i].clone());
            }
        }
        Ok(found)
    }

    #[instrument(skip_all, fields(count = keys.len()))]
    async fn delete(&self, keys: &[Key]) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut doomed = HashSet::new();
        for key in keys {
            if let Some(i) = self.resolve(&state.docs, &state.index, key)? {
                doomed.insert(i);
            }
        }
        if doomed.is_empty() {
            return Ok(());
        }

        let kept: Vec<Document> = state
            .docs
            .iter()
            .enumerate()
            .filter(|(i, _)| !doomed.contains(i))
            .map(|(_, d)| d.clone())
            .collect();
        state.index = self.reindex(&kept);
        state.docs = Arc::new(kept);
        debug!(removed = doomed.len(), total = state.docs.len(), "documents deleted");
        Ok(())
    }

    #[instrument(skip_all, fields(count = patches.len()))]
    async fn patch(&self, patches: Vec<KeyMeta>) -> Result<()> {
        let mut state = self.state.write().await;
        let mut docs: Vec<Document> = (*state.docs).clone();
        let mut index = state.index.clone();
        let key_field = self.config.key_field.as_str();

        for KeyMeta { key, meta } in patches {
            let pos = self.resolve(&docs, &index, &key)?.ok_or_else(|| {
                DocumentError::NotFound(format!("{}={}", key.field, String::from_utf8_lossy(&key.value)))
            })?;

            for (field, raw) in meta {
                let value: Value = serde_json::from_slice(&raw)
                    .map_err(|e| DocumentError::invalid_meta(&field, e.to_string()))?;
                if field == key_field {
                    if value.is_null() {
                        return Err(DocumentError::InvalidKey {
                            field,
                            reason: "the key field cannot be removed".to_string(),
                        });
                    }
                    let new_text = self.key_text(&value)?;
                    let old_text = docs[pos]
                        .value(key_field)
                        .ok()
                        .flatten()
                        .map(|v| v.to_string());
                    if old_text.as_deref() != Some(new_text.as_str()) {
                        if index.contains_key(&new_text) {
                            return Err(DocumentError::DuplicateKey(new_text));
                        }
                        if let Some(old) = old_text {
                            index.remove(&old);
                        }
                        index.insert(new_text, pos);
                    }
                }
                if value.is_null() {
                    docs[pos].meta.remove(&field);
                } else {
                    docs[pos].meta.insert(field, raw);
                }
            }
        }

        state.docs = Arc::new(docs);
        state.index = index;
        Ok(())
    }

    async fn snapshot(&self) -> Arc<Vec<Document>> {
        Arc::clone(&self.state.read().await.docs)
    }
}
