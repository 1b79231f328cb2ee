// SPDX-License-Identifier: PMPL-1.0-or-later
//! Request pipeline: filter, score, boost, aggregate, rank, paginate.
//!
//! Searches fan the corpus out over blocking worker tasks in fixed-size chunks
//! and run every aggregate on its own task. The whole pipeline is bounded by
//! the configured timeout; nothing is returned when it expires.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tokio::task::{spawn_blocking, JoinError, JoinHandle};
use tracing::{debug, instrument, warn};

use crate::aggregate::AggregateResponse;
use crate::assemble::{paginate, project, rank, Scored};
use crate::boost;
use crate::compare::derive_request;
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::{QueryError, Result};
use crate::request::Request;
use crate::response::Response;
use crate::scorer::{BaseScorer, TermOverlapScorer};

/// Evaluates requests against document corpora.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    scorer: Arc<dyn BaseScorer>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            scorer: Arc::new(TermOverlapScorer),
        }
    }

    /// Replace the base scorer.
    pub fn with_scorer(mut self, scorer: impl BaseScorer + 'static) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `request` over `corpus`.
    ///
    /// # Errors
    ///
    /// [`QueryError::Validation`] for malformed requests, [`QueryError::Timeout`]
    /// when the deadline passes, [`QueryError::Worker`] if a worker task dies.
    #[instrument(skip_all, fields(docs = corpus.len()))]
    pub async fn search(&self, request: Request, corpus: Arc<Vec<Document>>) -> Result<Response> {
        let started = Instant::now();
        request.validate(self.config.max_page_size)?;

        let deadline = self.config.timeout();
        match tokio::time::timeout(deadline, self.run(Arc::new(request), corpus, started)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "search deadline exceeded");
                Err(QueryError::Timeout(self.config.timeout_ms))
            }
        }
    }

    /// Run `request` against a single document, on the calling thread.
    pub fn evaluate(&self, request: &Request, doc: &Document) -> Result<Response> {
        let started = Instant::now();
        request.validate(self.config.max_page_size)?;

        let corpus = std::slice::from_ref(doc);
        let admitted: Vec<Scored> = admit(request, self.scorer.as_ref(), doc, 0).into_iter().collect();
        let admitted_docs: Vec<&Document> = admitted.iter().map(|c| &corpus[c.index]).collect();
        let aggregates = request
            .aggregates
            .iter()
            .map(|(name, agg)| (name.clone(), agg.evaluate(&admitted_docs)))
            .collect();

        Ok(self.finish(request, corpus, admitted, aggregates, started))
    }

    /// Score `doc` by its similarity to `reference` under `request`.
    pub fn compare(&self, request: &Request, reference: &Document, doc: &Document) -> Result<Response> {
        request.validate(self.config.max_page_size)?;
        self.evaluate(&derive_request(request, reference), doc)
    }

    /// [`Engine::evaluate`] on a blocking task, bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// As [`Engine::evaluate`], plus [`QueryError::Timeout`] when the deadline
    /// passes and [`QueryError::Worker`] if the task dies.
    #[instrument(skip_all)]
    pub async fn evaluate_with_deadline(&self, request: Request, doc: Document) -> Result<Response> {
        let engine = self.clone();
        self.bounded(spawn_blocking(move || engine.evaluate(&request, &doc))).await
    }

    /// [`Engine::compare`] on a blocking task, bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// As [`Engine::evaluate_with_deadline`].
    #[instrument(skip_all)]
    pub async fn compare_with_deadline(
        &self,
        request: Request,
        reference: Document,
        doc: Document,
    ) -> Result<Response> {
        let engine = self.clone();
        self.bounded(spawn_blocking(move || engine.compare(&request, &reference, &doc)))
            .await
    }

    async fn bounded(&self, task: JoinHandle<Result<Response>>) -> Result<Response> {
        match tokio::time::timeout(self.config.timeout(), task).await {
            Ok(joined) => joined.map_err(worker_failed)?,
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "evaluation deadline exceeded");
                Err(QueryError::Timeout(self.config.timeout_ms))
            }
        }
    }

    async fn run(
        &self,
        request: Arc<Request>,
        corpus: Arc<Vec<Document>>,
        started: Instant,
    ) -> Result<Response> {
        let chunk = self.config.chunk_size.max(1);
        let workers = (0..corpus.len()).step_by(chunk).map(|start| {
            let end = (start + chunk).min(corpus.len());
            let request = Arc::clone(&request);
            let corpus = Arc::clone(&corpus);
            let scorer = Arc::clone(&self.scorer);
            spawn_blocking(move || {
                (start..end)
                    .filter_map(|i| admit(&request, scorer.as_ref(), &corpus[i], i))
                    .collect::<Vec<_>>()
            })
        });
        let admitted: Vec<Scored> = try_join_all(workers)
            .await
            .map_err(worker_failed)?
            .into_iter()
            .flatten()
            .collect();
        debug!(admitted = admitted.len(), "filter stage complete");

        let indices: Arc<Vec<usize>> = Arc::new(admitted.iter().map(|c| c.index).collect());
        let aggregate_workers = request.aggregates.iter().map(|(name, agg)| {
            let name = name.clone();
            let agg = agg.clone();
            let indices = Arc::clone(&indices);
            let corpus = Arc::clone(&corpus);
            spawn_blocking(move || {
                let docs: Vec<&Document> = indices.iter().map(|&i| &corpus[i]).collect();
                let result = agg.evaluate(&docs);
                (name, result)
            })
        });
        let aggregates: BTreeMap<String, AggregateResponse> = try_join_all(aggregate_workers)
            .await
            .map_err(worker_failed)?
            .into_iter()
            .collect();

        Ok(self.finish(&request, &corpus, admitted, aggregates, started))
    }

    fn finish(
        &self,
        request: &Request,
        corpus: &[Document],
        admitted: Vec<Scored>,
        aggregates: BTreeMap<String, AggregateResponse>,
        started: Instant,
    ) -> Response {
        let total_results = admitted.len() as u64;
        let ranked = rank(admitted, corpus, &request.sort);
        let page = paginate(ranked, request.page, self.config.page_size(request.max_results));
        Response {
            reads: corpus.len() as u64,
            total_results,
            time: started.elapsed().as_secs_f64() * 1000.0,
            aggregates,
            results: project(&page, corpus, &request.fields),
        }
    }
}

/// Filter and score one document. Documents that cannot be evaluated are dropped.
fn admit(request: &Request, scorer: &dyn BaseScorer, doc: &Document, index: usize) -> Option<Scored> {
    if let Some(filter) = &request.filter {
        match filter.evaluate(doc) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(index, error = %e, "document skipped by filter stage");
                return None;
            }
        }
    }

    let raw_score = scorer.score(request, doc);
    match boost::score(&request.meta_boosts, doc, raw_score) {
        Ok(score) => Some(Scored {
            index,
            score,
            raw_score,
        }),
        Err(e) => {
            warn!(index, error = %e, "document skipped by boost stage");
            None
        }
    }
}

fn worker_failed(e: JoinError) -> QueryError {
    QueryError::Worker(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Aggregate, MetricKind};
    use crate::boost::{FilterBoost, MetaBoost};
    use crate::filter::{FieldOperator, Filter};
    use crate::request::{Sort, Term};
    use serde_json::json;

    fn corpus() -> Arc<Vec<Document>> {
        Arc::new(
            vec![
                json!({"id": 0, "price": 150, "category": "electronics", "title": "big tv"}),
                json!({"id": 1, "price": 50, "category": "electronics", "title": "small radio"}),
                json!({"id": 2, "price": 300, "category": "garden", "title": "lawn mower"}),
                json!({"id": 3, "price": "lots", "category": "electronics"}),
            ]
            .into_iter()
            .map(|v| Document::from_json(v).unwrap())
            .collect(),
        )
    }

    fn ids(resp: &Response) -> Vec<String> {
        resp.results
            .iter()
            .map(|r| String::from_utf8(r.meta["id"].clone()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_filter_admits_expected_documents() {
        let engine = Engine::new(EngineConfig::default().with_chunk_size(1));
        let request = Request::new().with_filter(Filter::all(vec![
            Filter::field(FieldOperator::GreaterThan, "price", json!(100)),
            Filter::field(FieldOperator::EqualTo, "category", json!("electronics")),
        ]));
        let resp = engine.search(request, corpus()).await.unwrap();
        assert_eq!(resp.reads, 4);
        assert_eq!(resp.total_results, 1);
        assert_eq!(ids(&resp), vec!["0"]);
    }

    #[tokio::test]
    async fn test_mismatched_document_is_skipped_not_fatal() {
        let engine = Engine::default();
        let request = Request::new()
            .with_filter(Filter::field(FieldOperator::LessThan, "price", json!(1000)))
            .with_sort(Sort::asc("price"));
        let resp = engine.search(request, corpus()).await.unwrap();
        assert_eq!(ids(&resp), vec!["1", "0", "2"]);
    }

    #[tokio::test]
    async fn test_boost_reorders_and_keeps_raw_score() {
        let engine = Engine::default();
        let request = Request::new().with_boost(MetaBoost::Filter(FilterBoost {
            value: 3.0,
            filter: Filter::field(FieldOperator::EqualTo, "category", json!("garden")),
        }));
        let resp = engine.search(request, corpus()).await.unwrap();
        assert_eq!(ids(&resp)[0], "2");
        assert_eq!(resp.results[0].raw_score, 1.0);
        assert!(resp.results[0].score > resp.results[1].score);
    }

    #[tokio::test]
    async fn test_aggregates_cover_admitted_set_not_page() {
        let engine = Engine::new(EngineConfig::default().with_chunk_size(3));
        let request = Request::new()
            .with_filter(Filter::field(FieldOperator::EqualTo, "category", json!("electronics")))
            .with_aggregate("categories", Aggregate::count("category"))
            .with_aggregate("avg_price", Aggregate::metric("price", MetricKind::Avg))
            .with_page(0, 1);
        let resp = engine.search(request, corpus()).await.unwrap();
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.total_results, 3);
        match &resp.aggregates["categories"] {
            AggregateResponse::Count(c) => assert_eq!(c["electronics"], 3),
            other => panic!("unexpected {other:?}"),
        }
        match &resp.aggregates["avg_price"] {
            AggregateResponse::Metric(m) => assert_eq!(m.value, 100.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_precedes_evaluation() {
        let engine = Engine::default();
        let request = Request::new().with_filter(Filter::one(vec![]));
        assert!(matches!(
            engine.search(request, corpus()).await,
            Err(QueryError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let resp = Engine::default()
            .search(Request::new(), Arc::new(Vec::new()))
            .await
            .unwrap();
        assert_eq!(resp.reads, 0);
        assert!(resp.results.is_empty());
    }

    struct SlowScorer;

    impl BaseScorer for SlowScorer {
        fn score(&self, _: &Request, _: &Document) -> f64 {
            std::thread::sleep(std::time::Duration::from_millis(100));
            1.0
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timeout_returns_no_partial_response() {
        let engine = Engine::new(EngineConfig::default().with_timeout_ms(10)).with_scorer(SlowScorer);
        assert_eq!(
            engine.search(Request::new(), corpus()).await,
            Err(QueryError::Timeout(10))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_evaluate_with_deadline_times_out() {
        let engine = Engine::new(EngineConfig::default().with_timeout_ms(10)).with_scorer(SlowScorer);
        let doc = Document::from_json(json!({"price": 50})).unwrap();
        assert_eq!(
            engine.evaluate_with_deadline(Request::new(), doc.clone()).await,
            Err(QueryError::Timeout(10))
        );
        assert_eq!(
            engine.compare_with_deadline(Request::new(), doc.clone(), doc).await,
            Err(QueryError::Timeout(10))
        );
    }

    #[tokio::test]
    async fn test_evaluate_with_deadline_matches_evaluate() {
        let engine = Engine::default();
        let doc = Document::from_json(json!({"price": 150})).unwrap();
        let request = Request::new().with_filter(Filter::field(FieldOperator::GreaterThan, "price", json!(100)));
        let bounded = engine.evaluate_with_deadline(request.clone(), doc.clone()).await.unwrap();
        let direct = engine.evaluate(&request, &doc).unwrap();
        assert_eq!(bounded.total_results, 1);
        assert_eq!(bounded.results, direct.results);
    }

    #[test]
    fn test_evaluate_single_document() {
        let engine = Engine::default();
        let doc = Document::from_json(json!({"price": 50})).unwrap();
        let request = Request::new().with_filter(Filter::field(FieldOperator::GreaterThan, "price", json!(100)));
        let resp = engine.evaluate(&request, &doc).unwrap();
        assert_eq!(resp.reads, 1);
        assert_eq!(resp.total_results, 0);
        assert!(resp.results.is_empty());
    }

    #[test]
    fn test_compare_rewards_shared_tokens() {
        let engine = Engine::default();
        let reference = Document::from_json(json!({"title": "red running shoes"})).unwrap();
        let close = Document::from_json(json!({"title": "red shoes"})).unwrap();
        let far = Document::from_json(json!({"title": "blue hat"})).unwrap();
        let request = Request::new();
        let a = engine.compare(&request, &reference, &close).unwrap();
        let b = engine.compare(&request, &reference, &far).unwrap();
        assert_eq!(a.results[0].raw_score, 2.0);
        assert_eq!(b.results[0].raw_score, 0.0);
    }

    #[test]
    fn test_evaluate_with_term() {
        let doc = Document::from_json(json!({"title": "big tv"})).unwrap();
        let request = Request::new().with_term(Term::new("title", "tv").with_potency(2.0));
        let resp = Engine::default().evaluate(&request, &doc).unwrap();
        assert_eq!(resp.results[0].score, 2.0);
    }
}
