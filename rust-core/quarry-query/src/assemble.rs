// SPDX-License-Identifier: PMPL-1.0-or-later
//! Ranking, pagination and projection of admitted documents.

use std::cmp::Ordering;

use serde_json::Value;
use tracing::warn;

use crate::document::Document;
use crate::request::{Sort, SortOrder, SCORE_FIELD};
use crate::response::SearchResult;
use crate::value::compare;

/// An admitted document, referenced by its position in the corpus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub index: usize,
    pub score: f64,
    pub raw_score: f64,
}

/// Order candidates by the sort list, then score descending, then corpus order.
pub fn rank(candidates: Vec<Scored>, corpus: &[Document], sort: &[Sort]) -> Vec<Scored> {
    if sort.is_empty() {
        let mut candidates = candidates;
        candidates.sort_by(fallback);
        return candidates;
    }

    let mut keyed: Vec<(Vec<Option<Value>>, Scored)> = candidates
        .into_iter()
        .map(|c| (sort_keys(&corpus[c.index], &c, sort), c))
        .collect();

    keyed.sort_by(|(ka, a), (kb, b)| {
        sort.iter()
            .zip(ka.iter().zip(kb))
            .map(|(s, (x, y))| compare_key(x.as_ref(), y.as_ref(), s.order))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| fallback(a, b))
    });

    keyed.into_iter().map(|(_, c)| c).collect()
}

/// Slice out one page. Out-of-range pages are empty.
pub fn paginate<T>(items: Vec<T>, page: u32, page_size: u32) -> Vec<T> {
    let size = page_size as usize;
    let start = (page as usize).saturating_mul(size);
    if start >= items.len() {
        return Vec::new();
    }
    items.into_iter().skip(start).take(size).collect()
}

/// Turn ranked candidates into results carrying the projected meta.
pub fn project(ranked: &[Scored], corpus: &[Document], fields: &[String]) -> Vec<SearchResult> {
    ranked
        .iter()
        .map(|c| SearchResult {
            meta: corpus[c.index].project(fields),
            score: c.score,
            raw_score: c.raw_score,
        })
        .collect()
}

fn sort_keys(doc: &Document, scored: &Scored, sort: &[Sort]) -> Vec<Option<Value>> {
    sort.iter()
        .map(|s| {
            if s.field == SCORE_FIELD {
                return Some(Value::from(scored.score));
            }
            doc.value(&s.field).unwrap_or_else(|e| {
                warn!(field = %s.field, error = %e, "unreadable sort value treated as missing");
                None
            })
        })
        .collect()
}

/// Missing values go last whatever the direction.
fn compare_key(a: Option<&Value>, b: Option<&Value>, order: SortOrder) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => match order {
            SortOrder::Asc => compare(x, y),
            SortOrder::Desc => compare(y, x),
        },
    }
}

fn fallback(a: &Scored, b: &Scored) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.index.cmp(&b.index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn corpus() -> Vec<Document> {
        vec![
            json!({"name": "c", "price": 30}),
            json!({"name": "a", "price": 10}),
            json!({"name": "b"}),
            json!({"name": "d", "price": 20}),
        ]
        .into_iter()
        .map(|v| Document::from_json(v).unwrap())
        .collect()
    }

    fn unit(n: usize) -> Vec<Scored> {
        (0..n)
            .map(|index| Scored {
                index,
                score: 1.0,
                raw_score: 1.0,
            })
            .collect()
    }

    fn order(ranked: &[Scored]) -> Vec<usize> {
        ranked.iter().map(|c| c.index).collect()
    }

    #[test]
    fn test_missing_sorts_last_both_directions() {
        let docs = corpus();
        let asc = rank(unit(4), &docs, &[Sort::asc("price")]);
        assert_eq!(order(&asc), vec![1, 3, 0, 2]);
        let desc = rank(unit(4), &docs, &[Sort::desc("price")]);
        assert_eq!(order(&desc), vec![0, 3, 1, 2]);
    }

    #[test]
    fn test_empty_sort_is_score_descending() {
        let docs = corpus();
        let mut c = unit(4);
        c[2].score = 5.0;
        c[3].score = 3.0;
        assert_eq!(order(&rank(c, &docs, &[])), vec![2, 3, 0, 1]);
    }

    #[test]
    fn test_ties_fall_back_to_score_then_corpus_order() {
        let docs: Vec<Document> = (0..3)
            .map(|_| Document::from_json(json!({"k": 1})).unwrap())
            .collect();
        let mut c = unit(3);
        c[1].score = 2.0;
        assert_eq!(order(&rank(c, &docs, &[Sort::asc("k")])), vec![1, 0, 2]);
    }

    #[test]
    fn test_score_sort_field() {
        let docs = corpus();
        let mut c = unit(4);
        c[0].score = 4.0;
        c[1].score = 0.5;
        let ranked = rank(c, &docs, &[Sort::asc(SCORE_FIELD)]);
        assert_eq!(ranked[0].index, 1);
        assert_eq!(ranked[3].index, 0);
    }

    #[test]
    fn test_mixed_type_sort_field() {
        let docs: Vec<Document> = [json!("1a"), json!(10), json!("z1"), json!("9"), json!(true), json!(9.5)]
            .into_iter()
            .map(|k| Document::new().with_value("k", k))
            .collect();
        let asc = rank(unit(6), &docs, &[Sort::asc("k")]);
        assert_eq!(order(&asc), vec![3, 5, 1, 0, 4, 2]);
        let desc = rank(unit(6), &docs, &[Sort::desc("k")]);
        assert_eq!(order(&desc), vec![2, 4, 0, 1, 5, 3]);
    }

    #[test]
    fn test_shuffled_mixed_corpus_ranks_consistently() {
        let size = 600;
        let docs: Vec<Document> = (0..size)
            .map(|i| {
                // Multiplying by a unit modulo `size` scatters the three shapes
                let n = (i * 397) % size;
                let k = match n % 3 {
                    0 => json!(n),
                    1 => json!(format!("{n}a")),
                    _ => json!(format!("z{n}")),
                };
                Document::new().with_value("k", k)
            })
            .collect();

        let ranked = rank(unit(size), &docs, &[Sort::asc("k")]);
        assert_eq!(ranked.len(), size);
        let keys: Vec<Value> = ranked
            .iter()
            .map(|c| docs[c.index].value("k").unwrap().unwrap())
            .collect();
        for pair in keys.windows(2) {
            assert_ne!(compare(&pair[0], &pair[1]), Ordering::Greater, "{pair:?}");
        }
        let first_text = keys.iter().position(|k| k.is_string()).unwrap();
        assert!(keys[..first_text].iter().all(Value::is_number));
        assert!(keys[first_text..].iter().all(Value::is_string));
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (0..7).collect();
        assert_eq!(paginate(items.clone(), 0, 3), vec![0, 1, 2]);
        assert_eq!(paginate(items.clone(), 2, 3), vec![6]);
        assert!(paginate(items.clone(), 3, 3).is_empty());
        assert!(paginate(items, u32::MAX, u32::MAX).is_empty());
    }

    #[test]
    fn test_project_fields() {
        let docs = corpus();
        let results = project(&unit(1), &docs, &["name".to_string()]);
        assert_eq!(results[0].meta.len(), 1);
        assert_eq!(results[0].meta["name"], b"\"c\"".to_vec());
    }
}
