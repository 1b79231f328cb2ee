// SPDX-License-Identifier: PMPL-1.0-or-later
//! Request derivation for document-to-document comparison.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::warn;

use crate::document::Document;
use crate::request::{Request, Term};
use crate::text::token_set;

/// Extend `request` with one term per distinct token of each textual field of
/// `reference`, visiting fields in name order.
pub fn derive_request(request: &Request, reference: &Document) -> Request {
    let mut derived = request.clone();
    for field in reference.field_names() {
        let tokens: BTreeSet<String> = match reference.value(field) {
            Ok(Some(Value::String(s))) => token_set(&s),
            Ok(Some(Value::Array(items))) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(token_set)
                .collect(),
            Ok(_) => continue,
            Err(e) => {
                warn!(field = %field, error = %e, "reference field ignored");
                continue;
            }
        };
        derived
            .terms
            .extend(tokens.into_iter().map(|token| Term::new(field, token)));
    }
    derived
}
