// SPDX-License-Identifier: PMPL-1.0-or-later
//! Documents and keys.
//!
//! Every meta field is carried as raw bytes holding a JSON value. Values are
//! decoded at the point of use so that a single malformed field only affects
//! the operations that read it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, Result};
use crate::value::describe;

/// A document: field name → JSON-encoded value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub meta: HashMap<String, Vec<u8>>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Validation`] if `value` is not an object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(map
                .into_iter()
                .fold(Self::new(), |doc, (k, v)| doc.with_value(k, v))),
            other => Err(QueryError::validation(
                "document",
                format!("expected a JSON object, found {}", describe(&other)),
            )),
        }
    }

    /// Set a field from an already decoded JSON value.
    pub fn with_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.meta.insert(field.into(), value.to_string().into_bytes());
        self
    }

    /// Set a field from raw bytes (not validated until read).
    pub fn with_raw(mut self, field: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        self.meta.insert(field.into(), raw.into());
        self
    }

    /// Raw bytes of a field.
    pub fn raw(&self, field: &str) -> Option<&[u8]> {
        self.meta.get(field).map(Vec::as_slice)
    }

    /// Decode a field. JSON `null` is reported as absent.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TypeMismatch`] if the bytes are not valid JSON.
    pub fn value(&self, field: &str) -> Result<Option<Value>> {
        let Some(raw) = self.raw(field) else {
            return Ok(None);
        };
        match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Null) => Ok(None),
            Ok(v) => Ok(Some(v)),
            Err(_) => Err(QueryError::mismatch(
                field,
                "JSON value",
                String::from_utf8_lossy(raw).chars().take(64).collect::<String>(),
            )),
        }
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.meta.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Copy of the meta map restricted to `fields`; an empty list keeps all.
    pub fn project(&self, fields: &[String]) -> HashMap<String, Vec<u8>> {
        if fields.is_empty() {
            return self.meta.clone();
        }
        fields
            .iter()
            .filter_map(|f| self.meta.get(f).map(|raw| (f.clone(), raw.clone())))
            .collect()
    }
}

/// Reference to a document through any unique field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub field: String,
    /// JSON-encoded value.
    pub value: Vec<u8>,
}

impl Key {
    /// Create a key from a decoded JSON value.
    pub fn new(field: impl Into<String>, value: &Value) -> Self {
        Self {
            field: field.into(),
            value: value.to_string().into_bytes(),
        }
    }

    /// Decode the key value.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TypeMismatch`] if the bytes are not valid JSON.
    pub fn decoded(&self) -> Result<Value> {
        serde_json::from_slice(&self.value).map_err(|_| {
            QueryError::mismatch(
                self.field.clone(),
                "JSON value",
                String::from_utf8_lossy(&self.value).into_owned(),
            )
        })
    }
}
