//! Step advance decisions
//!
//! Pure functions answering "has the traveler finished the current
//! step". Kept free of session state so every mode can be tested with
//! nothing but a step and a fix.

use crate::coord::{deviation_from_polyline, haversine_distance};
use crate::model::{GeographicCoordinate, RouteStep, UserLocation};
use crate::session::types::{StepAdvanceMode, DEFAULT_ARRIVAL_DISTANCE};

/// Whether the session should move past `current_step`.
///
/// `next_step` is `None` on the final step of the route; advancing then
/// completes the trip. Decisions use the raw fix, not the snapped one,
/// so that a fix between two steps is judged on where the traveler
/// actually is.
pub(super) fn should_advance_to_next_step(
    current_step: &RouteStep,
    next_step: Option<&RouteStep>,
    location: &UserLocation,
    mode: StepAdvanceMode,
) -> bool {
    match mode {
        StepAdvanceMode::Manual => false,
        StepAdvanceMode::DistanceToEndOfStep {
            distance,
            minimum_horizontal_accuracy,
        } => {
            if location.horizontal_accuracy > f64::from(minimum_horizontal_accuracy) {
                return false;
            }
            within_distance_of_step_end(location, current_step, f64::from(distance))
        }
        StepAdvanceMode::RelativeLineStringDistance {
            minimum_horizontal_accuracy,
            automatic_advance_distance,
        } => {
            if location.horizontal_accuracy > f64::from(minimum_horizontal_accuracy) {
                return false;
            }
            if let Some(distance) = automatic_advance_distance {
                if within_distance_of_step_end(location, current_step, f64::from(distance)) {
                    return true;
                }
            }
            match next_step {
                Some(next) => {
                    let to_current =
                        deviation_from_polyline(location.coordinate, &current_step.geometry);
                    let to_next = deviation_from_polyline(location.coordinate, &next.geometry);
                    match (to_current, to_next) {
                        (Some(to_current), Some(to_next)) => to_next <= to_current,
                        _ => false,
                    }
                }
                // Final step: there is no next line to compare against,
                // so arrival is a plain distance check.
                None => {
                    let arrival = automatic_advance_distance.unwrap_or(DEFAULT_ARRIVAL_DISTANCE);
                    within_distance_of_step_end(location, current_step, f64::from(arrival))
                }
            }
        }
    }
}

/// Drops leading waypoints that coincide with the end of a completed
/// step. Waypoints snapped by the routing backend sit exactly on the
/// step end, so a tight threshold suffices.
pub(super) fn prune_visited_waypoints(
    remaining: &mut Vec<GeographicCoordinate>,
    completed_step_end: GeographicCoordinate,
    threshold: f64,
) {
    while let Some(first) = remaining.first() {
        if haversine_distance(*first, completed_step_end) <= threshold {
            remaining.remove(0);
        } else {
            break;
        }
    }
}

fn within_distance_of_step_end(location: &UserLocation, step: &RouteStep, threshold: f64) -> bool {
    match step.end() {
        Some(end) => haversine_distance(location.coordinate, end) <= threshold,
        None => false,
    }
}
