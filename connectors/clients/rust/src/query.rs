// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>

//! Query operations: search the stored corpus, or evaluate a request against
//! documents supplied by the caller.

use quarry_proto::proto;
use quarry_query::{Document, Request, Response};
use tracing::instrument;

use crate::client::QuarryClient;
use crate::error::Result;

impl QuarryClient {
    /// Run `request` over every stored document.
    #[instrument(skip_all)]
    pub async fn search(&self, request: Request) -> Result<Response> {
        let message: proto::Request = request.into();
        let response = self
            .query
            .clone()
            .search(self.request(message))
            .await
            .map_err(|s| self.status(s))?;
        Ok(Response::try_from(response.into_inner())?)
    }

    /// Run `request` over a single document that need not be stored.
    #[instrument(skip_all)]
    pub async fn evaluate(&self, request: Request, document: Document) -> Result<Response> {
        let message = proto::EvaluateRequest {
            request: Some(request.into()),
            document: Some(document.into()),
        };
        let response = self
            .query
            .clone()
            .evaluate(self.request(message))
            .await
            .map_err(|s| self.status(s))?;
        Ok(Response::try_from(response.into_inner())?)
    }

    /// Score `document` by its similarity to `reference`, on top of `request`.
    #[instrument(skip_all)]
    pub async fn compare(
        &self,
        request: Request,
        reference: Document,
        document: Document,
    ) -> Result<Response> {
        let message = proto::CompareRequest {
            request: Some(request.into()),
            ref_document: Some(reference.into()),
            document: Some(document.into()),
        };
        let response = self
            .query
            .clone()
            .compare(self.request(message))
            .await
            .map_err(|s| self.status(s))?;
        Ok(Response::try_from(response.into_inner())?)
    }
}
