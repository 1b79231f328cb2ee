// SPDX-License-Identifier: PMPL-1.0-or-later
//! Search responses.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateResponse;

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Projected meta, JSON-encoded values.
    pub meta: HashMap<String, Vec<u8>>,
    /// Composite score after boosts.
    pub score: f64,
    /// Base score before boosts.
    pub raw_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Documents inspected.
    pub reads: u64,
    /// Size of the admitted set before pagination.
    pub total_results: u64,
    /// Elapsed milliseconds.
    pub time: f64,
    pub aggregates: BTreeMap<String, AggregateResponse>,
    pub results: Vec<SearchResult>,
}
