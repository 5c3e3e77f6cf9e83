//! Observer hooks for deviation handling and recalculation outcomes

use crate::model::{GeographicCoordinate, Route};
use crate::routing::RoutingError;
use crate::session::CorrectiveAction;

/// Receives session events and decides how to react to deviations.
///
/// Every method has a no-op default, so implementors override only what
/// they care about. Methods are called synchronously from the location
/// update path (or from the recalculation task) and must not block.
pub trait NavigationDelegate: Send + Sync {
    /// Called once each time the session newly leaves the route.
    ///
    /// `remaining_waypoints` is the current step's end followed by the
    /// waypoints not yet visited, suitable for passing straight back
    /// into a route request. Returning
    /// [`CorrectiveAction::GetNewRoutes`] asks the session to
    /// recalculate; the session ignores the request if a recalculation
    /// is already in flight.
    fn corrective_action_for_deviation(
        &self,
        deviation_in_meters: f64,
        remaining_waypoints: &[GeographicCoordinate],
    ) -> CorrectiveAction {
        let _ = (deviation_in_meters, remaining_waypoints);
        CorrectiveAction::DoNothing
    }

    /// Called when a recalculation finishes with candidate routes.
    ///
    /// The session has already switched to the first candidate, if any.
    /// An empty slice means the backend found no route; the session
    /// keeps navigating the old one.
    fn loaded_alternative_routes(&self, routes: &[Route]) {
        let _ = routes;
    }

    /// Called when a recalculation fails. The session state is
    /// untouched; a later deviation may trigger another attempt.
    fn recalculation_failed(&self, error: &RoutingError) {
        let _ = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DefaultDelegate;

    impl NavigationDelegate for DefaultDelegate {}

    #[test]
    fn test_defaults_do_nothing() {
        let delegate = DefaultDelegate;
        let action = delegate.corrective_action_for_deviation(12.0, &[]);
        assert_eq!(action, CorrectiveAction::DoNothing);
        delegate.loaded_alternative_routes(&[]);
        delegate.recalculation_failed(&RoutingError::NoWaypoints);
    }
}
