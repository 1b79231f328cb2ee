// SPDX-License-Identifier: PMPL-1.0-or-later
//! Aggregates computed over the admitted set.
//!
//! Aggregates never fail on document contents: a document whose field cannot
//! be used is left out of that aggregate and reported through `tracing`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::document::Document;
use crate::error::{QueryError, Result};
use crate::filter::Filter;
use crate::value::{as_number, describe, text_form};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    Avg,
    Min,
    Max,
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    pub field: String,
    pub kind: MetricKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountAggregate {
    pub field: String,
}

/// A named sub-filter of a bucket aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFilter {
    pub name: String,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketAggregate {
    pub buckets: Vec<NamedFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Metric(MetricAggregate),
    Count(CountAggregate),
    Bucket(BucketAggregate),
}

/// Result of a metric aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateResponse {
    Metric(MetricResult),
    /// Value (text form) → number of occurrences.
    Count(BTreeMap<String, u64>),
    /// Bucket name → count.
    Bucket(BTreeMap<String, BucketCount>),
}

impl Aggregate {
    pub fn metric(field: impl Into<String>, kind: MetricKind) -> Self {
        Aggregate::Metric(MetricAggregate {
            field: field.into(),
            kind,
        })
    }

    pub fn count(field: impl Into<String>) -> Self {
        Aggregate::Count(CountAggregate {
            field: field.into(),
        })
    }

    pub fn bucket(buckets: Vec<(String, Filter)>) -> Self {
        Aggregate::Bucket(BucketAggregate {
            buckets: buckets
                .into_iter()
                .map(|(name, filter)| NamedFilter { name, filter })
                .collect(),
        })
    }

    pub fn validate(&self, path: &str) -> Result<()> {
        match self {
            Aggregate::Metric(MetricAggregate { field, .. })
            | Aggregate::Count(CountAggregate { field }) => {
                if field.is_empty() {
                    return Err(QueryError::validation(format!("{path}.field"), "field name is empty"));
                }
                Ok(())
            }
            Aggregate::Bucket(b) => {
                let mut seen = HashSet::new();
                for (i, bucket) in b.buckets.iter().enumerate() {
                    let p = format!("{path}.buckets[{i}]");
                    if bucket.name.is_empty() {
                        return Err(QueryError::validation(format!("{p}.name"), "bucket name is empty"));
                    }
                    if !seen.insert(bucket.name.as_str()) {
                        return Err(QueryError::validation(
                            format!("{p}.name"),
                            format!("duplicate bucket name {:?}", bucket.name),
                        ));
                    }
                    bucket.filter.validate(&format!("{p}.filter"))?;
                }
                Ok(())
            }
        }
    }

    /// Compute this aggregate over `admitted`.
    pub fn evaluate(&self, admitted: &[&Document]) -> AggregateResponse {
        match self {
            Aggregate::Metric(m) => AggregateResponse::Metric(metric(m, admitted)),
            Aggregate::Count(c) => AggregateResponse::Count(count(&c.field, admitted)),
            Aggregate::Bucket(b) => AggregateResponse::Bucket(bucket(b, admitted)),
        }
    }
}

/// Running reduction for a metric aggregate.
#[derive(Debug, Clone, Copy, Default)]
struct MetricAccumulator {
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl MetricAccumulator {
    fn push(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    /// Empty input yields 0 for every kind.
    fn finish(&self, kind: MetricKind) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        match kind {
            MetricKind::Avg => self.sum / self.count as f64,
            MetricKind::Min => self.min.unwrap_or(0.0),
            MetricKind::Max => self.max.unwrap_or(0.0),
            MetricKind::Sum => self.sum,
        }
    }
}

fn metric(aggregate: &MetricAggregate, admitted: &[&Document]) -> MetricResult {
    let mut acc = MetricAccumulator::default();
    for doc in admitted {
        match doc.value(&aggregate.field) {
            Ok(None) => {}
            Ok(Some(v)) => match as_number(&v) {
                Some(x) => acc.push(x),
                None => warn!(
                    field = %aggregate.field,
                    found = %describe(&v),
                    "skipping non-numeric value in metric aggregate"
                ),
            },
            Err(e) => warn!(field = %aggregate.field, error = %e, "skipping document in metric aggregate"),
        }
    }
    MetricResult {
        value: acc.finish(aggregate.kind),
    }
}

fn count(field: &str, admitted: &[&Document]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for doc in admitted {
        match doc.value(field) {
            Ok(None) => {}
            Ok(Some(Value::Array(items))) => {
                for item in items.iter().filter(|i| !i.is_null()) {
                    *counts.entry(text_form(item)).or_insert(0) += 1;
                }
            }
            Ok(Some(v)) => *counts.entry(text_form(&v)).or_insert(0) += 1,
            Err(e) => warn!(field = %field, error = %e, "skipping document in count aggregate"),
        }
    }
    counts
}

fn bucket(aggregate: &BucketAggregate, admitted: &[&Document]) -> BTreeMap<String, BucketCount> {
    aggregate
        .buckets
        .iter()
        .map(|b| {
            let mut count = 0u64;
            for doc in admitted {
                match b.filter.evaluate(doc) {
                    Ok(true) => count += 1,
                    Ok(false) => {}
                    Err(e) => warn!(bucket = %b.name, error = %e, "skipping document in bucket"),
                }
            }
            (
                b.name.clone(),
                BucketCount {
                    name: b.name.clone(),
                    count,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FieldOperator;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|v| Document::from_json(v).unwrap())
            .collect()
    }

    fn refs(docs: &[Document]) -> Vec<&Document> {
        docs.iter().collect()
    }

    fn metric_value(agg: &Aggregate, docs: &[&Document]) -> f64 {
        match agg.evaluate(docs) {
            AggregateResponse::Metric(m) => m.value,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_metric_empty_is_zero() {
        for kind in [MetricKind::Avg, MetricKind::Min, MetricKind::Max, MetricKind::Sum] {
            assert_eq!(metric_value(&Aggregate::metric("score", kind), &[]), 0.0);
        }
    }

    #[test]
    fn test_metric_kinds() {
        let d = docs(vec![
            json!({"score": 2}),
            json!({"score": "4"}),
            json!({"score": 9}),
            json!({"other": 1}),
        ]);
        let r = refs(&d);
        assert_eq!(metric_value(&Aggregate::metric("score", MetricKind::Avg), &r), 5.0);
        assert_eq!(metric_value(&Aggregate::metric("score", MetricKind::Min), &r), 2.0);
        assert_eq!(metric_value(&Aggregate::metric("score", MetricKind::Max), &r), 9.0);
        assert_eq!(metric_value(&Aggregate::metric("score", MetricKind::Sum), &r), 15.0);
    }

    #[test]
    fn test_metric_skips_non_numeric() {
        let d = docs(vec![json!({"score": 3}), json!({"score": "n/a"})]);
        assert_eq!(
            metric_value(&Aggregate::metric("score", MetricKind::Avg), &refs(&d)),
            3.0
        );
    }

    #[test]
    fn test_count_colors() {
        let d = docs(vec![
            json!({"color": "red"}),
            json!({"color": "red"}),
            json!({"color": "blue"}),
            json!({"size": 3}),
        ]);
        let expected = BTreeMap::from([("red".to_string(), 2), ("blue".to_string(), 1)]);
        assert_eq!(
            Aggregate::count("color").evaluate(&refs(&d)),
            AggregateResponse::Count(expected)
        );
    }

    #[test]
    fn test_count_arrays_and_scalars() {
        let d = docs(vec![
            json!({"tags": ["a", "b"]}),
            json!({"tags": "a"}),
            json!({"tags": 7}),
            json!({"tags": null}),
        ]);
        match Aggregate::count("tags").evaluate(&refs(&d)) {
            AggregateResponse::Count(c) => {
                assert_eq!(c.get("a"), Some(&2));
                assert_eq!(c.get("b"), Some(&1));
                assert_eq!(c.get("7"), Some(&1));
                assert_eq!(c.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_count_merges_values_sharing_text_form() {
        let d = docs(vec![
            json!({"code": 1}),
            json!({"code": "1"}),
            json!({"code": true}),
            json!({"code": "true"}),
        ]);
        let expected = BTreeMap::from([("1".to_string(), 2), ("true".to_string(), 2)]);
        assert_eq!(
            Aggregate::count("code").evaluate(&refs(&d)),
            AggregateResponse::Count(expected)
        );
    }

    #[test]
    fn test_buckets_overlap_without_dedup() {
        let d = docs(vec![json!({"price": 5}), json!({"price": 15}), json!({"price": 25})]);
        let agg = Aggregate::bucket(vec![
            (
                "cheap".into(),
                Filter::field(FieldOperator::LessThan, "price", json!(20)),
            ),
            (
                "pricey".into(),
                Filter::field(FieldOperator::GreaterThan, "price", json!(10)),
            ),
        ]);
        match agg.evaluate(&refs(&d)) {
            AggregateResponse::Bucket(b) => {
                assert_eq!(b["cheap"].count, 2);
                assert_eq!(b["pricey"].count, 2);
                assert_eq!(b["cheap"].name, "cheap");
                let total: u64 = b.values().map(|c| c.count).sum();
                assert!(total > d.len() as u64);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_admitted_set() {
        let agg = Aggregate::bucket(vec![("all".into(), Filter::all(vec![]))]);
        match agg.evaluate(&[]) {
            AggregateResponse::Bucket(b) => assert_eq!(b["all"].count, 0),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            Aggregate::count("x").evaluate(&[]),
            AggregateResponse::Count(BTreeMap::new())
        );
    }

    #[test]
    fn test_validate_duplicate_bucket_names() {
        let agg = Aggregate::bucket(vec![
            ("a".into(), Filter::all(vec![])),
            ("a".into(), Filter::any(vec![])),
        ]);
        match agg.validate("aggregates[\"x\"]") {
            Err(QueryError::Validation { field, .. }) => {
                assert_eq!(field, "aggregates[\"x\"].buckets[1].name")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
