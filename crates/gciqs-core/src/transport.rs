//! Transport abstraction for issuing a query and reading its streamed body.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Number of references requested when none is configured.
pub const DEFAULT_TOP_K: u8 = 5;

/// Body of a query request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The trimmed question text.
    pub query: String,
    /// How many reference documents to retrieve.
    pub top_k: u8,
}

impl QueryRequest {
    /// Create a request.
    #[must_use]
    pub fn new(query: impl Into<String>, top_k: u8) -> Self {
        Self {
            query: query.into(),
            top_k,
        }
    }
}

/// The incrementally readable response body.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Sends a query and hands back its streamed body.
///
/// `open` resolves once the response headers arrive: a success status yields
/// the body stream, anything else a [`TransportError::Status`] carrying the
/// body's structured error field when present.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Issue `request` and return the response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the server answers
    /// with a non-success status.
    async fn open(&self, request: &QueryRequest) -> Result<ByteStream, TransportError>;
}
