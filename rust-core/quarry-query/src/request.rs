// SPDX-License-Identifier: PMPL-1.0-or-later
//! Search requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::boost::MetaBoost;
use crate::error::{QueryError, Result};
use crate::filter::Filter;

/// Sort field that orders by the composite score instead of a document field.
pub const SCORE_FIELD: &str = "_score";

/// An atomic query signal tied to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub value: String,
    /// Field the term applies to; empty means any string field.
    pub field: String,
    /// Positive interaction count.
    pub pos: u16,
    /// Negative interaction count.
    pub neg: u16,
    /// Significance weight.
    pub potency: f64,
    pub word_offset: u32,
    pub para_offset: u32,
}

impl Term {
    /// A term with unit potency and no interaction history.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            field: field.into(),
            pos: 0,
            neg: 0,
            potency: 1.0,
            word_offset: 0,
            para_offset: 0,
        }
    }

    pub fn with_potency(mut self, potency: f64) -> Self {
        self.potency = potency;
        self
    }

    pub fn with_interactions(mut self, pos: u16, neg: u16) -> Self {
        self.pos = pos;
        self.neg = neg;
        self
    }
}

/// Free-text part of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextQuery {
    Body(String),
    /// Word → weight.
    WeightedBody(BTreeMap<String, f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Weighting applied to term matches by the base scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBoost {
    /// Multiply matches of terms found in `field` by `value`.
    Origin { field: String, value: f64 },
    /// Weight terms by their interaction counts.
    Interaction { pos: f64, neg: f64 },
}

/// A complete search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub query: Option<TextQuery>,
    pub terms: Vec<Term>,
    /// Root filter; `None` admits every document.
    pub filter: Option<Filter>,
    pub meta_boosts: Vec<MetaBoost>,
    pub index_boosts: Vec<IndexBoost>,
    /// Zero-based page index.
    pub page: u32,
    /// Page size; 0 selects the engine default.
    pub max_results: u32,
    /// Projection; empty returns every field.
    pub fields: Vec<String>,
    pub sort: Vec<Sort>,
    pub aggregates: BTreeMap<String, Aggregate>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.query = Some(TextQuery::Body(body.into()));
        self
    }

    pub fn with_term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_boost(mut self, boost: MetaBoost) -> Self {
        self.meta_boosts.push(boost);
        self
    }

    pub fn with_index_boost(mut self, boost: IndexBoost) -> Self {
        self.index_boosts.push(boost);
        self
    }

    pub fn with_page(mut self, page: u32, max_results: u32) -> Self {
        self.page = page;
        self.max_results = max_results;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_aggregate(mut self, name: impl Into<String>, aggregate: Aggregate) -> Self {
        self.aggregates.insert(name.into(), aggregate);
        self
    }

    /// Reject malformed requests before any document is evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Validation`] naming the first offending element.
    pub fn validate(&self, max_page_size: u32) -> Result<()> {
        if let Some(TextQuery::WeightedBody(words)) = &self.query {
            for (word, weight) in words {
                if !weight.is_finite() {
                    return Err(QueryError::validation(
                        format!("weighted_body[{word:?}]"),
                        "weight must be a finite number",
                    ));
                }
            }
        }

        for (i, term) in self.terms.iter().enumerate() {
            if term.value.is_empty() {
                return Err(QueryError::validation(format!("terms[{i}].value"), "term value is empty"));
            }
            if !(term.potency.is_finite() && term.potency >= 0.0) {
                return Err(QueryError::validation(
                    format!("terms[{i}].potency"),
                    "potency must be a non-negative number",
                ));
            }
        }

        if let Some(filter) = &self.filter {
            filter.validate("filter")?;
        }

        for (i, boost) in self.meta_boosts.iter().enumerate() {
            boost.validate(&format!("meta_boosts[{i}]"))?;
        }

        for (i, boost) in self.index_boosts.iter().enumerate() {
            let ok = match boost {
                IndexBoost::Origin { field, value } => !field.is_empty() && value.is_finite(),
                IndexBoost::Interaction { pos, neg } => pos.is_finite() && neg.is_finite(),
            };
            if !ok {
                return Err(QueryError::validation(
                    format!("index_boosts[{i}]"),
                    "index boost needs a field name and finite weights",
                ));
            }
        }

        if self.max_results > max_page_size {
            return Err(QueryError::validation(
                "max_results",
                format!("{} exceeds the maximum page size {max_page_size}", self.max_results),
            ));
        }

        for (i, sort) in self.sort.iter().enumerate() {
            if sort.field.is_empty() {
                return Err(QueryError::validation(format!("sort[{i}].field"), "field name is empty"));
            }
        }

        for (name, aggregate) in &self.aggregates {
            if name.is_empty() {
                return Err(QueryError::validation("aggregates", "aggregate name is empty"));
            }
            aggregate.validate(&format!("aggregates[{name:?}]"))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::{IntervalBoost, IntervalPoint};
    use crate::filter::FieldOperator;
    use serde_json::json;

    #[test]
    fn test_default_request_is_valid() {
        assert!(Request::new().validate(100).is_ok());
    }

    #[test]
    fn test_page_size_limit() {
        let req = Request::new().with_page(0, 500);
        assert!(matches!(
            req.validate(100),
            Err(QueryError::Validation { ref field, .. }) if field == "max_results"
        ));
        assert!(req.validate(500).is_ok());
    }

    #[test]
    fn test_nested_filter_error_path() {
        let req = Request::new().with_filter(Filter::all(vec![
            Filter::field(FieldOperator::EqualTo, "a", json!(1)),
            Filter::any(vec![Filter::one(vec![])]),
        ]));
        match req.validate(100) {
            Err(QueryError::Validation { field, .. }) => {
                assert_eq!(field, "filter.filters[1].filters[0].filters")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_boost_error_path() {
        let req = Request::new().with_boost(MetaBoost::Interval(IntervalBoost {
            field: "age".into(),
            points: vec![IntervalPoint {
                point: 1.0,
                value: 1.0,
            }],
        }));
        match req.validate(100) {
            Err(QueryError::Validation { field, .. }) => {
                assert_eq!(field, "meta_boosts[0].interval.points")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_term_validation() {
        let req = Request::new().with_term(Term::new("title", ""));
        assert!(req.validate(100).is_err());
        let req = Request::new().with_term(Term::new("title", "rust").with_potency(-1.0));
        assert!(req.validate(100).is_err());
    }

    #[test]
    fn test_aggregate_validation_path() {
        let req = Request::new().with_aggregate("avg", Aggregate::count(""));
        match req.validate(100) {
            Err(QueryError::Validation { field, .. }) => {
                assert_eq!(field, "aggregates[\"avg\"].field")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_index_boost_validation() {
        let req = Request::new().with_index_boost(IndexBoost::Origin {
            field: String::new(),
            value: 2.0,
        });
        assert!(req.validate(100).is_err());
        let req = Request::new().with_index_boost(IndexBoost::Interaction {
            pos: 0.5,
            neg: 0.25,
        });
        assert!(req.validate(100).is_ok());
    }

    #[test]
    fn test_request_serde_roundtrip() {
        let req = Request::new()
            .with_body("red shoes")
            .with_term(Term::new("title", "shoes").with_interactions(3, 1))
            .with_sort(Sort::desc("price"))
            .with_page(2, 20);
        let json = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
