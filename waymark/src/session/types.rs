//! Session configuration and observable state types

use crate::deviation::{RouteDeviation, RouteDeviationTracking};
use crate::model::{GeographicCoordinate, RouteStep, UserLocation};

/// Distance to the end of the final step at which the trip counts as
/// arrived, in meters. Used when the configured advance mode has no
/// explicit arrival distance of its own, and for dropping visited
/// waypoints as steps complete.
pub const DEFAULT_ARRIVAL_DISTANCE: u16 = 5;

/// When the session moves on to the next maneuver step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAdvanceMode {
    /// Never advance automatically; only
    /// [`advance_to_next_step`](crate::session::NavigationSession::advance_to_next_step)
    /// moves the cursor.
    Manual,
    /// Advance once the fix is within `distance` meters of the current
    /// step's end.
    DistanceToEndOfStep {
        /// Straight-line distance to the step end, in meters
        distance: u16,
        /// Fixes with worse (larger) horizontal accuracy than this many
        /// meters are ignored
        minimum_horizontal_accuracy: u16,
    },
    /// Advance when the next step's line is at least as close to the
    /// fix as the current step's line.
    RelativeLineStringDistance {
        /// Fixes with worse (larger) horizontal accuracy than this many
        /// meters are ignored
        minimum_horizontal_accuracy: u16,
        /// Hard override: also advance within this many meters of the
        /// step end. Doubles as the arrival distance on the final step;
        /// when absent, [`DEFAULT_ARRIVAL_DISTANCE`] applies there.
        automatic_advance_distance: Option<u16>,
    },
}

/// Immutable per-session configuration.
///
/// Supplied once at session start; changing it requires a new session.
#[derive(Debug, Clone)]
pub struct NavigationConfig {
    pub step_advance: StepAdvanceMode,
    pub deviation_tracking: RouteDeviationTracking,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            step_advance: StepAdvanceMode::RelativeLineStringDistance {
                minimum_horizontal_accuracy: 25,
                automatic_advance_distance: None,
            },
            deviation_tracking: RouteDeviationTracking::None,
        }
    }
}

impl NavigationConfig {
    pub fn with_step_advance(mut self, step_advance: StepAdvanceMode) -> Self {
        self.step_advance = step_advance;
        self
    }

    pub fn with_deviation_tracking(mut self, deviation_tracking: RouteDeviationTracking) -> Self {
        self.deviation_tracking = deviation_tracking;
        self
    }
}

/// The session's externally observable snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum TripState {
    /// Mid-trip.
    Navigating {
        /// The latest fix, snapped onto the active route geometry
        snapped_user_location: UserLocation,
        /// Suffix of the active route's steps; the current step is the
        /// first element
        remaining_steps: Vec<RouteStep>,
        /// Waypoints not yet visited, in travel order
        remaining_waypoints: Vec<GeographicCoordinate>,
        /// Distance left on the current step, in meters
        distance_to_next_maneuver: f64,
        deviation: RouteDeviation,
    },
    /// Arrived; terminal. No transition leaves this state.
    Complete,
}

impl TripState {
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, TripState::Complete)
    }

    /// The step currently being traveled, while navigating.
    pub fn current_step(&self) -> Option<&RouteStep> {
        match self {
            TripState::Navigating { remaining_steps, .. } => remaining_steps.first(),
            TripState::Complete => None,
        }
    }

    /// The current deviation verdict, while navigating.
    pub fn deviation(&self) -> Option<RouteDeviation> {
        match self {
            TripState::Navigating { deviation, .. } => Some(*deviation),
            TripState::Complete => None,
        }
    }
}

/// The delegate's decision on a route deviation.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectiveAction {
    /// Stay on the active route.
    DoNothing,
    /// Recalculate through the given waypoints.
    GetNewRoutes {
        waypoints: Vec<GeographicCoordinate>,
    },
}
