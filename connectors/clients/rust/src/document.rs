// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>

//! Document store operations.

use quarry_document::KeyMeta;
use quarry_proto::proto;
use quarry_query::{Document, Key};
use tracing::instrument;

use crate::client::QuarryClient;
use crate::error::Result;

impl QuarryClient {
    /// Store `documents`, returning their keys in input order.
    ///
    /// Documents without a key field are assigned a generated one.
    #[instrument(skip_all, fields(count = documents.len()))]
    pub async fn add(&self, documents: Vec<Document>) -> Result<Vec<Key>> {
        let message = proto::Documents {
            documents: documents.into_iter().map(Into::into).collect(),
        };
        let response = self
            .documents
            .clone()
            .add(self.request(message))
            .await
            .map_err(|s| self.status(s))?;
        Ok(response.into_inner().keys.into_iter().map(Into::into).collect())
    }

    /// Fetch the documents referenced by `keys`.
    #[instrument(skip_all, fields(count = keys.len()))]
    pub async fn get(&self, keys: Vec<Key>) -> Result<Vec<Document>> {
        let message = proto::Keys {
            keys: keys.into_iter().map(Into::into).collect(),
        };
        let response = self
            .documents
            .clone()
            .get(self.request(message))
            .await
            .map_err(|s| self.status(s))?;
        Ok(response
            .into_inner()
            .documents
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Remove the documents referenced by `keys`. Unknown keys are ignored.
    #[instrument(skip_all, fields(count = keys.len()))]
    pub async fn delete(&self, keys: Vec<Key>) -> Result<()> {
        let message = proto::Keys {
            keys: keys.into_iter().map(Into::into).collect(),
        };
        self.documents
            .clone()
            .delete(self.request(message))
            .await
            .map_err(|s| self.status(s))?;
        Ok(())
    }

    /// Merge fields into existing documents. Either every patch applies or none.
    #[instrument(skip_all, fields(count = patches.len()))]
    pub async fn patch(&self, patches: Vec<KeyMeta>) -> Result<()> {
        let message = proto::KeysMetas {
            keys_metas: patches.into_iter().map(Into::into).collect(),
        };
        self.documents
            .clone()
            .patch(self.request(message))
            .await
            .map_err(|s| self.status(s))?;
        Ok(())
    }
}
