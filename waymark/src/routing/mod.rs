//! Route acquisition pipeline
//!
//! Turns "where am I and where do I want to go" into candidate routes.
//! The pipeline itself is transport and format agnostic: an injected
//! [`RouteRequestGenerator`] builds the wire request, an injected
//! [`HttpClient`] executes it, and an injected [`RouteResponseParser`]
//! decodes the bytes into [`Route`] values.
//!
//! # Design
//!
//! [`RouteAdapter`] composes the three collaborators and owns the only
//! logic of its own: rejecting empty waypoint lists, mapping non-2xx
//! status codes to [`RoutingError::InvalidStatus`], and keeping
//! transport and parse failures distinct. It never retries and never
//! touches session state; retry policy belongs to whoever calls
//! [`RouteAdapter::get_routes`].
//!
//! [`osrm`] provides concrete strategies for OSRM-compatible services.

pub mod http;
pub mod osrm;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::model::{GeographicCoordinate, Route, UserLocation};

pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use osrm::{OsrmHttpRequestGenerator, OsrmResponseParser};

/// HTTP method of a generated route request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

/// A wire request produced by a [`RouteRequestGenerator`].
///
/// Opaque to the pipeline; only the transport interprets it.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub method: RequestMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Request body; empty for GET requests
    pub body: Vec<u8>,
}

/// Errors from route acquisition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("at least one waypoint is required")]
    NoWaypoints,

    #[error("failed to build route request: {0}")]
    InvalidRequest(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("routing service returned HTTP {code}")]
    InvalidStatus { code: u16 },

    #[error("failed to parse route response: {0}")]
    Parse(String),
}

/// Builds a wire request for a routing service.
pub trait RouteRequestGenerator: Send + Sync {
    /// Generate a request for routes from `user_location` through
    /// `waypoints`, in order.
    fn generate_request(
        &self,
        user_location: &UserLocation,
        waypoints: &[GeographicCoordinate],
    ) -> Result<RouteRequest, RoutingError>;
}

/// Decodes a routing service response body into routes.
pub trait RouteResponseParser: Send + Sync {
    /// Parse response bytes into zero or more candidate routes.
    fn parse_response(&self, response: &[u8]) -> Result<Vec<Route>, RoutingError>;
}

/// The composed route acquisition pipeline.
pub struct RouteAdapter {
    request_generator: Arc<dyn RouteRequestGenerator>,
    response_parser: Arc<dyn RouteResponseParser>,
    client: Arc<dyn HttpClient>,
}

impl RouteAdapter {
    /// Creates an adapter from explicit strategy implementations.
    pub fn new(
        request_generator: Arc<dyn RouteRequestGenerator>,
        response_parser: Arc<dyn RouteResponseParser>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            request_generator,
            response_parser,
            client,
        }
    }

    /// Creates an adapter for an OSRM-compatible service.
    ///
    /// `base_url` is the server root (for example
    /// `https://router.project-osrm.org`); `profile` is the routing
    /// profile such as `driving` or `cycling`.
    pub fn osrm_with_client(base_url: &str, profile: &str, client: Arc<dyn HttpClient>) -> Self {
        Self::new(
            Arc::new(OsrmHttpRequestGenerator::new(base_url, profile)),
            Arc::new(OsrmResponseParser::new()),
            client,
        )
    }

    /// Fetches candidate routes from `user_location` through `waypoints`.
    ///
    /// Fails without a network call when `waypoints` is empty. Non-2xx
    /// responses become [`RoutingError::InvalidStatus`]; the body is
    /// only parsed on success.
    pub async fn get_routes(
        &self,
        user_location: UserLocation,
        waypoints: &[GeographicCoordinate],
    ) -> Result<Vec<Route>, RoutingError> {
        if waypoints.is_empty() {
            return Err(RoutingError::NoWaypoints);
        }

        let request = self
            .request_generator
            .generate_request(&user_location, waypoints)?;
        debug!(url = %request.url, "Requesting routes");

        let response = self.client.execute(request).await?;
        if !(200..300).contains(&response.status) {
            return Err(RoutingError::InvalidStatus {
                code: response.status,
            });
        }

        let routes = self.response_parser.parse_response(&response.body)?;
        debug!(count = routes.len(), "Parsed candidate routes");
        Ok(routes)
    }
}
