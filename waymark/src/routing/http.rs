//! HTTP client abstraction for testability
//!
//! The pipeline executes requests through this seam so tests can
//! substitute a scripted client for the real network.

use futures::future::BoxFuture;

use super::{RequestMethod, RouteRequest, RoutingError};

/// A raw HTTP response: status code plus body bytes.
///
/// Status interpretation belongs to the caller; the client reports
/// non-2xx responses as values, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Trait for HTTP transport operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. The boxed future keeps the
/// trait object safe so the pipeline can hold `Arc<dyn HttpClient>`.
pub trait HttpClient: Send + Sync {
    /// Executes the request and returns the response, however the
    /// server answered. Only transport-level failures are errors.
    fn execute(&self, request: RouteRequest) -> BoxFuture<'_, Result<HttpResponse, RoutingError>>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, RoutingError> {
        Self::with_timeout(30)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RoutingError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn execute(&self, request: RouteRequest) -> BoxFuture<'_, Result<HttpResponse, RoutingError>> {
        Box::pin(async move {
            let mut builder = match request.method {
                RequestMethod::Get => self.client.get(&request.url),
                RequestMethod::Post => self.client.post(&request.url).body(request.body),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| RoutingError::Transport(format!("Request failed: {}", e)))?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| RoutingError::Transport(format!("Failed to read response: {}", e)))?
                .to_vec();

            Ok(HttpResponse { status, body })
        })
    }
}
