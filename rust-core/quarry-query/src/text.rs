// SPDX-License-Identifier: PMPL-1.0-or-later
//! Tokenisation shared by text boosts, the term scorer and compare
//! derivation.
//!
//! Text is lower-cased (Unicode) and split on every character that is not
//! alphanumeric. Empty tokens are dropped. Token sets are used, so repeated
//! words count once.

use std::collections::BTreeSet;

/// Split `text` into lower-cased alphanumeric tokens, in order of appearance.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Distinct tokens of `text`.
pub fn token_set(text: &str) -> BTreeSet<String> {
    tokenize(text).collect()
}

/// Share of `query` tokens that also occur in `target`, in `[0, 1]`.
///
/// Returns `0.0` when `query` has no tokens.
pub fn overlap_ratio(query: &BTreeSet<String>, target: &BTreeSet<String>) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let shared = query.intersection(target).count();
    shared as f64 / query.len() as f64
}
