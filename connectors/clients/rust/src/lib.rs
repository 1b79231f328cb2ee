// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>

//! # Quarry Client SDK
//!
//! A Rust client library for Quarry: filtered, boosted and aggregated search
//! over a document store, spoken over gRPC. Requests and responses use the
//! model types of `quarry-query`; wire conversion happens inside the client.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quarry_client::client::{ClientConfig, QuarryClient};
//! use quarry_client::{FieldOperator, Filter, Request};
//!
//! #[tokio::main]
//! async fn main() -> quarry_client::error::Result<()> {
//!     let client = QuarryClient::connect(ClientConfig::new("http://localhost:50051")?).await?;
//!     let request = Request::new().with_filter(Filter::field(
//!         FieldOperator::GreaterThan,
//!         "price",
//!         serde_json::json!(100),
//!     ));
//!     let response = client.search(request).await?;
//!     println!("{} of {} documents matched", response.total_results, response.reads);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: Connection configuration, credentials, and gRPC transport.
//! - [`query`]: Search, evaluate, and compare operations.
//! - [`document`]: Add, get, delete, and patch operations.
//! - [`error`]: Error types and the crate-level `Result` alias.

pub mod client;
pub mod document;
pub mod error;
pub mod query;

pub use client::{ClientConfig, Credentials, QuarryClient};
pub use error::{QuarryError, Result};
pub use quarry_document::KeyMeta;
pub use quarry_query::{
    Aggregate, AggregateResponse, Document, FieldOperator, Filter, Key, MetaBoost, Request,
    Response, SearchResult, Sort,
};
