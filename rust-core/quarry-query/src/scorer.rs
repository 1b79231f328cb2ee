// SPDX-License-Identifier: PMPL-1.0-or-later
//! Base scoring of admitted documents from the request's text signals.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::document::Document;
use crate::request::{IndexBoost, Request, Term, TextQuery};
use crate::text::token_set;

/// Produces the score that meta boosts are later applied to.
pub trait BaseScorer: Send + Sync {
    fn score(&self, request: &Request, doc: &Document) -> f64;
}

/// Scores by token overlap between the request and the document's string fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapScorer;

impl BaseScorer for TermOverlapScorer {
    fn score(&self, request: &Request, doc: &Document) -> f64 {
        if request.query.is_none() && request.terms.is_empty() {
            return 1.0;
        }

        let fields = field_tokens(doc);
        let all: BTreeSet<&str> = fields
            .values()
            .flat_map(|tokens| tokens.iter().map(String::as_str))
            .collect();

        let mut score = match &request.query {
            None => 0.0,
            Some(TextQuery::Body(body)) => token_set(body)
                .iter()
                .filter(|t| all.contains(t.as_str()))
                .count() as f64,
            Some(TextQuery::WeightedBody(words)) => words
                .iter()
                .filter(|(word, _)| found(&token_set(word), |t| all.contains(t)))
                .map(|(_, weight)| weight)
                .sum::<f64>(),
        };

        let interaction = interaction_weights(&request.index_boosts);
        for term in &request.terms {
            let tokens = token_set(&term.value);
            let matched = if term.field.is_empty() {
                found(&tokens, |t| all.contains(t))
            } else {
                fields
                    .get(term.field.as_str())
                    .is_some_and(|own| found(&tokens, |t| own.contains(t)))
            };
            if !matched {
                continue;
            }

            let origin: f64 = request
                .index_boosts
                .iter()
                .filter_map(|b| match b {
                    IndexBoost::Origin { field, value } if applies(term, field, &tokens, &fields) => {
                        Some(*value)
                    }
                    _ => None,
                })
                .product();

            score += term.potency * origin * interaction_weight(term, interaction);
        }

        score
    }
}

/// Whether every token of a non-empty set satisfies `within`.
fn found(tokens: &BTreeSet<String>, within: impl Fn(&str) -> bool) -> bool {
    !tokens.is_empty() && tokens.iter().all(|t| within(t.as_str()))
}

fn applies(
    term: &Term,
    origin_field: &str,
    tokens: &BTreeSet<String>,
    fields: &BTreeMap<&str, BTreeSet<String>>,
) -> bool {
    if !term.field.is_empty() {
        return term.field == origin_field;
    }
    fields
        .get(origin_field)
        .is_some_and(|own| found(tokens, |t| own.contains(t)))
}

/// Summed `(pos, neg)` weights of every interaction boost.
fn interaction_weights(boosts: &[IndexBoost]) -> (f64, f64) {
    boosts.iter().fold((0.0, 0.0), |(p, n), b| match b {
        IndexBoost::Interaction { pos, neg } => (p + pos, n + neg),
        IndexBoost::Origin { .. } => (p, n),
    })
}

fn interaction_weight(term: &Term, (pos_w, neg_w): (f64, f64)) -> f64 {
    let pos = f64::from(term.pos).ln_1p();
    let neg = f64::from(term.neg).ln_1p();
    (1.0 + pos_w * pos - neg_w * neg).max(0.0)
}

/// Tokens of every string (or string array) field. Unreadable fields are ignored.
fn field_tokens(doc: &Document) -> BTreeMap<&str, BTreeSet<String>> {
    let mut out = BTreeMap::new();
    for name in doc.field_names() {
        let tokens = match doc.value(name) {
            Ok(Some(Value::String(s))) => token_set(&s),
            Ok(Some(Value::Array(items))) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(token_set)
                .collect(),
            _ => continue,
        };
        out.insert(name, tokens);
    }
    out
}
