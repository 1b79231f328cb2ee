// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query error types.

use thiserror::Error;

/// Errors that can occur while validating or evaluating a request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The request is malformed. `field` is the path of the offending element,
    /// e.g. `meta_boosts[2].interval.points`.
    #[error("invalid request at {field}: {reason}")]
    Validation { field: String, reason: String },

    /// A document field could not be coerced to the type an operation needs.
    #[error("type mismatch on field {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// The request did not finish within the configured deadline.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// A worker task failed before producing its partial result.
    #[error("evaluation worker failed: {0}")]
    Worker(String),
}

impl QueryError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn mismatch(
        field: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        QueryError::TypeMismatch {
            field: field.into(),
            expected,
            found: found.into(),
        }
    }

    /// Whether this error is scoped to a single document rather than the request.
    pub fn is_document_scoped(&self) -> bool {
        matches!(self, QueryError::TypeMismatch { .. })
    }
}

/// Crate-level result alias using [`QueryError`].
pub type Result<T> = std::result::Result<T, QueryError>;
