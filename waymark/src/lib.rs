//! Waymark - Turn-by-turn navigation session engine
//!
//! This library provides the core runtime for turn-by-turn navigation:
//! consuming a stream of location fixes, tracking progress along a route,
//! detecting deviations and arbitrating route recalculation. Route math
//! is backend-agnostic; an adapter for OSRM-compatible services ships in
//! [`routing`].
//!
//! # High-Level API
//!
//! Fetch a route, replay it through the simulated provider and let a
//! runner drive the session:
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use waymark::routing::{ReqwestClient, RouteAdapter};
//! use waymark::session::{NavigationConfig, NavigationRunner, NavigationSession};
//! use waymark::simulation::{SimulatedLocationProvider, SimulationConfig};
//!
//! let client = Arc::new(ReqwestClient::new()?);
//! let adapter = Arc::new(RouteAdapter::osrm_with_client(
//!     "https://router.project-osrm.org",
//!     "driving",
//!     client,
//! ));
//! let routes = adapter.get_routes(user_location, &waypoints).await?;
//!
//! let provider = SimulatedLocationProvider::new(SimulationConfig::default());
//! provider.start_simulating(&routes[0])?;
//!
//! let session = Arc::new(NavigationSession::start(
//!     routes[0].clone(),
//!     user_location,
//!     NavigationConfig::default(),
//!     delegate,
//!     adapter,
//! ));
//! NavigationRunner::spawn(session.clone(), &provider).wait().await;
//! ```

pub mod config;
pub mod coord;
pub mod deviation;
pub mod location;
pub mod logging;
pub mod model;
pub mod routing;
pub mod session;
pub mod simulation;

/// Version of the Waymark library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
