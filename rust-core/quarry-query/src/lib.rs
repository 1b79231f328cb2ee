// SPDX-License-Identifier: PMPL-1.0-or-later
//! Quarry Query
//!
//! Request model and evaluation for Quarry searches.
//! A request filters a document corpus, scores and boosts the admitted set,
//! computes aggregates over it and returns one ranked page.

pub mod aggregate;
pub mod assemble;
pub mod boost;
pub mod compare;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod filter;
pub mod geo;
pub mod request;
pub mod response;
pub mod scorer;
pub mod text;
pub mod value;

pub use aggregate::{
    Aggregate, AggregateResponse, BucketAggregate, BucketCount, CountAggregate, MetricAggregate,
    MetricKind, MetricResult, NamedFilter,
};
pub use boost::{
    AddBoost, DistanceBoost, ElementBoost, FilterBoost, GeoBoost, GeoRegion, IntervalBoost,
    IntervalPoint, MetaBoost, TextBoost,
};
pub use config::EngineConfig;
pub use document::{Document, Key};
pub use engine::Engine;
pub use error::{QueryError, Result};
pub use filter::{Combinator, CombinatorOperator, FieldFilter, FieldOperator, Filter};
pub use request::{IndexBoost, Request, Sort, SortOrder, Term, TextQuery, SCORE_FIELD};
pub use response::{Response, SearchResult};
pub use scorer::{BaseScorer, TermOverlapScorer};
