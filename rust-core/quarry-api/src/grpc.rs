// SPDX-License-Identifier: PMPL-1.0-or-later
//! gRPC services for Quarry.
//!
//! Wire messages are converted to the query model at the boundary; every
//! failure leaves as a `Status` with a code matching its error kind.

use tonic::{Request, Response, Status};
use tracing::{debug, instrument};

use quarry_document::DocumentError;
use quarry_proto::{key_metas, proto, required_document, DocumentService, QueryService};
use quarry_query::{QueryError, Request as QueryRequest};

use crate::AppState;

/// Map a query error to its gRPC status.
pub fn query_status(err: QueryError) -> Status {
    match &err {
        QueryError::Validation { .. } | QueryError::TypeMismatch { .. } => {
            Status::invalid_argument(err.to_string())
        }
        QueryError::Timeout(_) => Status::deadline_exceeded(err.to_string()),
        QueryError::Worker(_) => Status::internal(err.to_string()),
    }
}

/// Map a document store error to its gRPC status.
pub fn document_status(err: DocumentError) -> Status {
    match &err {
        DocumentError::NotFound(_) => Status::not_found(err.to_string()),
        DocumentError::InvalidKey { .. } | DocumentError::InvalidMeta { .. } => {
            Status::invalid_argument(err.to_string())
        }
        DocumentError::DuplicateKey(_) => Status::already_exists(err.to_string()),
    }
}

fn decode_request(request: Option<proto::Request>) -> Result<QueryRequest, Status> {
    let request = request.ok_or_else(|| Status::invalid_argument("request is missing"))?;
    QueryRequest::try_from(request).map_err(query_status)
}

// ============================================================================
// Query gRPC Service
// ============================================================================

pub struct QueryHandler {
    state: AppState,
}

impl QueryHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl QueryService for QueryHandler {
    #[instrument(skip_all)]
    async fn search(
        &self,
        request: Request<proto::Request>,
    ) -> Result<Response<proto::Response>, Status> {
        let req = QueryRequest::try_from(request.into_inner()).map_err(query_status)?;
        let corpus = self.state.store.snapshot().await;
        let resp = self
            .state
            .engine
            .search(req, corpus)
            .await
            .map_err(query_status)?;

        debug!(
            reads = resp.reads,
            total = resp.total_results,
            time_ms = resp.time,
            "search complete"
        );
        Ok(Response::new(resp.into()))
    }

    #[instrument(skip_all)]
    async fn evaluate(
        &self,
        request: Request<proto::EvaluateRequest>,
    ) -> Result<Response<proto::Response>, Status> {
        let req = request.into_inner();
        let query = decode_request(req.request)?;
        let doc = required_document(req.document, "document").map_err(query_status)?;

        let resp = self
            .state
            .engine
            .evaluate_with_deadline(query, doc)
            .await
            .map_err(query_status)?;
        Ok(Response::new(resp.into()))
    }

    #[instrument(skip_all)]
    async fn compare(
        &self,
        request: Request<proto::CompareRequest>,
    ) -> Result<Response<proto::Response>, Status> {
        let req = request.into_inner();
        let query = decode_request(req.request)?;
        let reference = required_document(req.ref_document, "ref_document").map_err(query_status)?;
        let doc = required_document(req.document, "document").map_err(query_status)?;

        let resp = self
            .state
            .engine
            .compare_with_deadline(query, reference, doc)
            .await
            .map_err(query_status)?;
        Ok(Response::new(resp.into()))
    }
}

// ============================================================================
// Document gRPC Service
// ============================================================================

pub struct DocumentHandler {
    state: AppState,
}

impl DocumentHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl DocumentService for DocumentHandler {
    #[instrument(skip_all)]
    async fn add(
        &self,
        request: Request<proto::Documents>,
    ) -> Result<Response<proto::Keys>, Status> {
        let docs = request
            .into_inner()
            .documents
            .into_iter()
            .map(Into::into)
            .collect();
        let keys = self.state.store.add(docs).await.map_err(document_status)?;

        Ok(Response::new(proto::Keys {
            keys: keys.into_iter().map(Into::into).collect(),
        }))
    }

    #[instrument(skip_all)]
    async fn get(
        &self,
        request: Request<proto::Keys>,
    ) -> Result<Response<proto::Documents>, Status> {
        let keys: Vec<_> = request.into_inner().keys.into_iter().map(Into::into).collect();
        let docs = self.state.store.get(&keys).await.map_err(document_status)?;

        Ok(Response::new(proto::Documents {
            documents: docs.into_iter().map(Into::into).collect(),
        }))
    }

    #[instrument(skip_all)]
    async fn delete(
        &self,
        request: Request<proto::Keys>,
    ) -> Result<Response<proto::Empty>, Status> {
        let keys: Vec<_> = request.into_inner().keys.into_iter().map(Into::into).collect();
        self.state.store.delete(&keys).await.map_err(document_status)?;

        Ok(Response::new(proto::Empty {}))
    }

    #[instrument(skip_all)]
    async fn patch(
        &self,
        request: Request<proto::KeysMetas>,
    ) -> Result<Response<proto::Empty>, Status> {
        let patches = key_metas(request.into_inner().keys_metas).map_err(query_status)?;
        self.state.store.patch(patches).await.map_err(document_status)?;

        Ok(Response::new(proto::Empty {}))
    }
}
