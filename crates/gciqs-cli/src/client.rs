//! HTTP client for the query service.
//!
//! Issues streamed queries (`POST /query`) and health checks
//! (`GET /health`), and plugs into the core controller as its
//! [`QueryTransport`].

use async_trait::async_trait;
use futures::StreamExt;
use gciqs_core::{ByteStream, QueryRequest, QueryTransport, TransportError};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Client;

use crate::types::{ApiErrorResponse, HealthResponse};

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {}", .message.as_deref().unwrap_or("no error detail"))]
    Api {
        /// HTTP status code.
        status: u16,
        /// The `error` field of the response body, if it had one.
        message: Option<String>,
    },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// No response within the allowed time.
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) => Self::Network(e.to_string()),
            ClientError::Api { status, message } => Self::Status { status, message },
            ClientError::Parse(detail) => Self::Body(detail),
            ClientError::Timeout(after) => Self::Network(format!("request timed out after {after:?}")),
        }
    }
}

/// Client for the query service REST API.
#[derive(Debug, Clone)]
pub struct QueryClient {
    client: Client,
    base_url: String,
}

impl QueryClient {
    /// Create a new query client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the service (e.g., "http://localhost:8000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Handle API error responses.
    async fn handle_error(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let message = response
            .json::<ApiErrorResponse>()
            .await
            .ok()
            .map(|body| body.error);
        ClientError::Api { status, message }
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Send a query and return the response once its headers arrive.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not a success.
    pub async fn send_query(
        &self,
        request: &QueryRequest,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}/query", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        tracing::debug!(status = response.status().as_u16(), "Query stream opened");
        Ok(response)
    }

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable, unhealthy, or answers
    /// with an unexpected body.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        Ok(health)
    }

    // =========================================================================
    // Utility
    // =========================================================================

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QueryTransport for QueryClient {
    async fn open(&self, request: &QueryRequest) -> Result<ByteStream, TransportError> {
        let response = self.send_query(request).await?;
        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| TransportError::Body(e.to_string()))
        });
        Ok(body.boxed())
    }
}
