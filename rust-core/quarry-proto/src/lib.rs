// SPDX-License-Identifier: PMPL-1.0-or-later
//! Quarry Proto
//!
//! Generated gRPC types for the `quarry` package and conversions between them
//! and the query model. Decoding a wire message is fallible: unknown enum
//! values, missing oneof payloads, undecodable JSON literals and out-of-range
//! counters are reported as [`QueryError::Validation`](quarry_query::QueryError)
//! with the path of the offending element.

/// Generated protobuf types.
pub mod proto {
    tonic::include_proto!("quarry");
}

mod convert;

pub use convert::{key_metas, required_document};

pub use proto::document_client::DocumentClient;
pub use proto::document_server::{Document as DocumentService, DocumentServer};
pub use proto::query_client::QueryClient;
pub use proto::query_server::{Query as QueryService, QueryServer};
