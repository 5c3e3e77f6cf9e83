//! Deterministic route playback
//!
//! Turns a route geometry into a scripted, unbounded sequence of
//! location fixes on a simulated clock. Pure and synchronous; the
//! async provider in the parent module drives it on a timer, and tests
//! drive it directly with no timers at all.

use std::time::{Duration, SystemTime};

use crate::coord::bearing;
use crate::model::{CourseOverGround, GeographicCoordinate, UserLocation};

use super::SimulationError;

/// A scripted walk along a route geometry.
///
/// Fix `k` carries coordinate `geometry[k]` and the synthetic timestamp
/// `start + k * interval`. Once the geometry is exhausted the final
/// coordinate repeats forever with still-advancing timestamps, the way
/// a stationary receiver keeps reporting. The sequence is unbounded and
/// cannot be restarted.
#[derive(Debug, Clone)]
pub struct RoutePlayback {
    geometry: Vec<GeographicCoordinate>,
    horizontal_accuracy: f64,
    interval: Duration,
    start: SystemTime,
    cursor: usize,
}

impl RoutePlayback {
    /// Creates a playback over `geometry` on a simulated clock starting
    /// at `start` and advancing `interval` per fix.
    pub fn new(
        geometry: Vec<GeographicCoordinate>,
        horizontal_accuracy: f64,
        interval: Duration,
        start: SystemTime,
    ) -> Result<Self, SimulationError> {
        if geometry.is_empty() {
            return Err(SimulationError::EmptyGeometry);
        }
        Ok(Self {
            geometry,
            horizontal_accuracy,
            interval,
            start,
            cursor: 0,
        })
    }

    /// True once every geometry coordinate has been emitted at least
    /// once.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.geometry.len()
    }

    /// Produces the next fix. Never runs out.
    pub fn next_fix(&mut self) -> UserLocation {
        let index = self.cursor.min(self.geometry.len() - 1);
        let coordinate = self.geometry[index];

        // Face the next coordinate; at the end, keep the final heading.
        let course = if index + 1 < self.geometry.len() {
            Some(bearing(coordinate, self.geometry[index + 1]))
        } else if self.geometry.len() >= 2 {
            Some(bearing(self.geometry[self.geometry.len() - 2], coordinate))
        } else {
            None
        };

        let fix = UserLocation {
            coordinate,
            horizontal_accuracy: self.horizontal_accuracy,
            course_over_ground: course.map(|degrees| CourseOverGround {
                degrees: (degrees.round() as u16) % 360,
                accuracy: 0,
            }),
            timestamp: self.start + self.interval.mul_f64(self.cursor as f64),
        };

        self.cursor += 1;
        fix
    }
}

impl Iterator for RoutePlayback {
    type Item = UserLocation;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_fix())
    }
}
