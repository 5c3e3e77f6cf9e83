//! Turn-by-turn navigation sessions
//!
//! The session consumes location fixes and maintains the trip state:
//! which steps remain, how far the next maneuver is, and whether the
//! user has left the route. Deviations are reported to a
//! [`NavigationDelegate`], which may ask for a recalculation; at most
//! one recalculation is ever in flight per session.
//!
//! # Driving a session
//!
//! Feed fixes by hand with
//! [`update_user_location`](NavigationSession::update_user_location),
//! or bind a [`LocationProvider`](crate::location::LocationProvider)
//! with a [`NavigationRunner`]:
//!
//! ```ignore
//! use waymark::session::{NavigationConfig, NavigationRunner, NavigationSession};
//!
//! let session = Arc::new(NavigationSession::start(
//!     route,
//!     initial_location,
//!     NavigationConfig::default(),
//!     delegate,
//!     route_adapter,
//! ));
//! let runner = NavigationRunner::spawn(session.clone(), &provider);
//! runner.wait().await;
//! ```

mod advance;
mod delegate;
mod engine;
mod runner;
mod types;

pub use delegate::NavigationDelegate;
pub use engine::NavigationSession;
pub use runner::NavigationRunner;
pub use types::{
    CorrectiveAction, NavigationConfig, StepAdvanceMode, TripState, DEFAULT_ARRIVAL_DISTANCE,
};
