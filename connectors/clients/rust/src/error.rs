// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <j.d.a.jewell@open.ac.uk>

//! Error types for the Quarry client SDK.
//!
//! All fallible operations in this crate return [`Result<T>`], an alias for
//! `std::result::Result<T, QuarryError>`. Server statuses are folded into the
//! variants a caller is likely to branch on; anything else keeps its gRPC code.

use quarry_query::QueryError;
use thiserror::Error;
use tonic::{Code, Status};

/// Error type for Quarry client operations.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// The referenced document was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server rejected the configured credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The request was malformed, either locally or as judged by the server.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The call exceeded the configured timeout.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Any other non-OK status returned by the server.
    #[error("Server error ({code:?}): {message}")]
    Server {
        /// gRPC status code.
        code: Code,
        /// Message carried by the status.
        message: String,
    },

    /// Connection or channel failure.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// A server response could not be decoded into model types.
    #[error("Malformed response: {0}")]
    Conversion(#[from] QueryError),
}

impl QuarryError {
    /// Classify a status returned for a call made with `timeout_ms`.
    pub fn from_status(status: Status, timeout_ms: u64) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::NotFound => Self::NotFound(message),
            Code::Unauthenticated | Code::PermissionDenied => Self::Unauthorized(message),
            Code::InvalidArgument => Self::Validation(message),
            Code::DeadlineExceeded => Self::Timeout(timeout_ms),
            code => Self::Server { code, message },
        }
    }
}

/// Crate-level result alias using [`QuarryError`].
pub type Result<T> = std::result::Result<T, QuarryError>;
