//! Location provider contract
//!
//! Defines the interface between positioning sources and the navigation
//! session:
//!
//! - [`LocationProvider::subscribe`] - Subscription API (push)
//! - [`LocationProvider::last_location`] - Query API (pull)
//!
//! A provider produces a lazy, unbounded sequence of location fixes.
//! Fixes are fanned out over a broadcast channel, so any number of
//! consumers can subscribe independently; a slow consumer that lags
//! behind misses old fixes rather than stalling the producer. Providers
//! are not restartable.
//!
//! The crate ships [`crate::simulation::SimulatedLocationProvider`] for
//! replaying a route. Sensor-backed providers (platform GPS) implement
//! this trait in the embedding application.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::model::UserLocation;

/// A source of location fixes.
pub trait LocationProvider: Send + Sync {
    /// Subscribe to location updates.
    ///
    /// Each receiver observes every fix broadcast after the call.
    fn subscribe(&self) -> broadcast::Receiver<UserLocation>;

    /// The most recent fix, if any has been produced yet.
    fn last_location(&self) -> Option<UserLocation>;
}

// Allow Arc-wrapped providers to be used directly
impl<P: LocationProvider + ?Sized> LocationProvider for Arc<P> {
    fn subscribe(&self) -> broadcast::Receiver<UserLocation> {
        (**self).subscribe()
    }

    fn last_location(&self) -> Option<UserLocation> {
        (**self).last_location()
    }
}
