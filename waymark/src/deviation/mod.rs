//! Route deviation detection
//!
//! Decides whether a location fix has left the planned route. The policy
//! is pluggable:
//!
//! - [`RouteDeviationTracking::None`] - never reports a deviation
//! - [`RouteDeviationTracking::StaticThreshold`] - perpendicular distance
//!   from the current step against a fixed limit, with an accuracy gate
//! - [`RouteDeviationTracking::Custom`] - any [`DeviationDetector`]
//!
//! Detection is stateless between fixes except for one carry: the static
//! threshold refuses to change its verdict on a low-confidence fix, so
//! the previous verdict is threaded through each evaluation. A noisy GPS
//! burst can then neither raise a false alarm nor clear a real one.

use std::fmt;
use std::sync::Arc;

use crate::coord::deviation_from_polyline;
use crate::model::{Route, RouteStep, UserLocation};

/// The user's standing relative to the planned route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteDeviation {
    /// On track
    NoDeviation,
    /// Off the route line
    OffRoute {
        /// Perpendicular distance from the route line, in meters
        deviation_from_route_line: f64,
    },
}

impl RouteDeviation {
    /// True if this is an off-route verdict.
    #[inline]
    pub fn is_off_route(&self) -> bool {
        matches!(self, RouteDeviation::OffRoute { .. })
    }
}

/// A custom deviation policy.
///
/// Implementations carry their own state if they need any (hysteresis,
/// dwell counters) and must be cheap: the session calls this on every
/// trusted fix while navigating.
pub trait DeviationDetector: Send + Sync {
    /// Judge the fix against the route and the step currently being
    /// traveled.
    fn check_route_deviation(
        &self,
        location: UserLocation,
        route: &Route,
        current_route_step: &RouteStep,
    ) -> RouteDeviation;
}

/// Deviation policy configured on a navigation session.
#[derive(Clone)]
pub enum RouteDeviationTracking {
    /// Deviation detection is disabled.
    None,
    /// Flag fixes farther than a fixed distance from the current step.
    StaticThreshold {
        /// Fixes with worse (larger) horizontal accuracy than this many
        /// meters are ignored and the previous verdict stands
        minimum_horizontal_accuracy: u16,
        /// Maximum tolerated distance from the step line, in meters
        max_acceptable_deviation: f64,
    },
    /// Delegate every judgment to a custom detector.
    Custom { detector: Arc<dyn DeviationDetector> },
}

impl fmt::Debug for RouteDeviationTracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDeviationTracking::None => write!(f, "None"),
            RouteDeviationTracking::StaticThreshold {
                minimum_horizontal_accuracy,
                max_acceptable_deviation,
            } => f
                .debug_struct("StaticThreshold")
                .field("minimum_horizontal_accuracy", minimum_horizontal_accuracy)
                .field("max_acceptable_deviation", max_acceptable_deviation)
                .finish(),
            RouteDeviationTracking::Custom { .. } => write!(f, "Custom"),
        }
    }
}

impl RouteDeviationTracking {
    /// Evaluate a fix under this policy.
    ///
    /// `previous` is the verdict from the last evaluation; the static
    /// threshold returns it unchanged when the fix is not accurate
    /// enough to trust.
    pub fn check_route_deviation(
        &self,
        location: UserLocation,
        route: &Route,
        current_route_step: &RouteStep,
        previous: RouteDeviation,
    ) -> RouteDeviation {
        match self {
            RouteDeviationTracking::None => RouteDeviation::NoDeviation,
            RouteDeviationTracking::StaticThreshold {
                minimum_horizontal_accuracy,
                max_acceptable_deviation,
            } => {
                if location.horizontal_accuracy > f64::from(*minimum_horizontal_accuracy) {
                    // Untrusted fix; the last verdict stands.
                    return previous;
                }
                // A step without geometry cannot be deviated from.
                let deviation =
                    deviation_from_polyline(location.coordinate, &current_route_step.geometry)
                        .unwrap_or(0.0);
                if deviation > *max_acceptable_deviation {
                    RouteDeviation::OffRoute {
                        deviation_from_route_line: deviation,
                    }
                } else {
                    RouteDeviation::NoDeviation
                }
            }
            RouteDeviationTracking::Custom { detector } => {
                detector.check_route_deviation(location, route, current_route_step)
            }
        }
    }
}
