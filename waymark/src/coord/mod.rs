//! Geographic math for route tracking
//!
//! Provides the great-circle and polyline geometry the engine needs:
//! distances, bearings, snapping a raw GPS fix onto a route line, and
//! measuring how much of a maneuver step remains.
//!
//! Distances are great-circle (haversine) over a spherical earth model.
//! Point-to-segment projection uses a local equirectangular projection,
//! which is accurate at maneuver-step scale (meters to a few kilometers)
//! and keeps the math linear.

use crate::model::GeographicCoordinate;

/// Mean earth radius in meters (IUGG spherical approximation).
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates, in meters.
#[inline]
pub fn haversine_distance(a: GeographicCoordinate, b: GeographicCoordinate) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS * h.sqrt().min(1.0).asin()
}

/// Initial bearing from one coordinate to another, in degrees
/// clockwise from true north, normalized to [0, 360).
#[inline]
pub fn bearing(from: GeographicCoordinate, to: GeographicCoordinate) -> f64 {
    let lat_from = from.lat.to_radians();
    let lat_to = to.lat.to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let y = delta_lng.sin() * lat_to.cos();
    let x = lat_from.cos() * lat_to.sin() - lat_from.sin() * lat_to.cos() * delta_lng.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Nearest point to `point` on the segment from `a` to `b`.
///
/// Projects into a local equirectangular frame centered on the segment,
/// clamps to the segment, and unprojects.
pub fn nearest_point_on_segment(
    point: GeographicCoordinate,
    a: GeographicCoordinate,
    b: GeographicCoordinate,
) -> GeographicCoordinate {
    // Longitude scale at the segment's mean latitude; floor keeps the
    // unprojection finite at the poles.
    let scale = ((a.lat + b.lat) / 2.0).to_radians().cos().max(1e-12);

    let (px, py) = (point.lng * scale, point.lat);
    let (ax, ay) = (a.lng * scale, a.lat);
    let (bx, by) = (b.lng * scale, b.lat);

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return a;
    }

    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    GeographicCoordinate {
        lat: ay + t * dy,
        lng: (ax + t * dx) / scale,
    }
}

/// Nearest point to `point` anywhere on the polyline.
///
/// Returns `None` for an empty line. A single-point line snaps to that
/// point.
pub fn snap_to_polyline(
    point: GeographicCoordinate,
    line: &[GeographicCoordinate],
) -> Option<GeographicCoordinate> {
    match line {
        [] => None,
        [only] => Some(*only),
        _ => {
            let mut best = line[0];
            let mut best_distance = f64::INFINITY;
            for segment in line.windows(2) {
                let candidate = nearest_point_on_segment(point, segment[0], segment[1]);
                let distance = haversine_distance(point, candidate);
                if distance < best_distance {
                    best_distance = distance;
                    best = candidate;
                }
            }
            Some(best)
        }
    }
}

/// Perpendicular distance in meters from `point` to the polyline.
///
/// Returns `None` for an empty line.
pub fn deviation_from_polyline(
    point: GeographicCoordinate,
    line: &[GeographicCoordinate],
) -> Option<f64> {
    snap_to_polyline(point, line).map(|snapped| haversine_distance(point, snapped))
}

/// Total length of the polyline in meters.
///
/// Lines with fewer than two points have zero length.
pub fn polyline_length(line: &[GeographicCoordinate]) -> f64 {
    line.windows(2)
        .map(|segment| haversine_distance(segment[0], segment[1]))
        .sum()
}

/// Distance in meters left to travel from `point` to the end of the
/// polyline, measured along the line from the snapped position.
///
/// Degenerate lines (fewer than two points) have nothing left to travel.
pub fn distance_to_end_of_polyline(
    point: GeographicCoordinate,
    line: &[GeographicCoordinate],
) -> f64 {
    if line.len() < 2 {
        return 0.0;
    }

    // Find the segment holding the snapped position.
    let mut best_index = 0;
    let mut best_snapped = line[0];
    let mut best_distance = f64::INFINITY;
    for (index, segment) in line.windows(2).enumerate() {
        let candidate = nearest_point_on_segment(point, segment[0], segment[1]);
        let distance = haversine_distance(point, candidate);
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
            best_snapped = candidate;
        }
    }

    // Remainder of that segment plus all segments after it.
    let mut remaining = haversine_distance(best_snapped, line[best_index + 1]);
    for segment in line[best_index + 1..].windows(2) {
        remaining += haversine_distance(segment[0], segment[1]);
    }
    remaining
}
