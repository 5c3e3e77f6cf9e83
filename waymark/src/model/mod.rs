//! Core navigation value types
//!
//! Defines the immutable data model shared across the engine: geographic
//! coordinates, user location fixes, routes, maneuver steps, and the
//! visual/spoken instruction content attached to each step.
//!
//! All types here are plain values. They are created by the routing layer
//! (or by tests) and never mutated afterwards; the session works on owned
//! clones and suffixes of these values.

use std::time::SystemTime;

use serde::Deserialize;

/// A geographic coordinate in WGS84 decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeographicCoordinate {
    /// Latitude in degrees, positive north
    pub lat: f64,
    /// Longitude in degrees, positive east
    pub lng: f64,
}

impl GeographicCoordinate {
    #[inline]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Direction of travel over ground, reported by a positioning source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseOverGround {
    /// Direction in degrees, clockwise from true north (0-359)
    pub degrees: u16,
    /// Accuracy of the course value in degrees
    pub accuracy: u16,
}

impl CourseOverGround {
    #[inline]
    pub fn new(degrees: u16, accuracy: u16) -> Self {
        Self { degrees, accuracy }
    }
}

/// A single location fix from a positioning source.
///
/// `horizontal_accuracy` is the estimated error radius in meters; larger
/// values mean a less trustworthy fix. Consumers that gate on accuracy
/// (step advance, deviation detection) compare against this field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserLocation {
    pub coordinate: GeographicCoordinate,
    /// Estimated horizontal error radius in meters
    pub horizontal_accuracy: f64,
    pub course_over_ground: Option<CourseOverGround>,
    pub timestamp: SystemTime,
}

/// An axis-aligned geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southwest corner (minimum latitude and longitude)
    pub sw: GeographicCoordinate,
    /// Northeast corner (maximum latitude and longitude)
    pub ne: GeographicCoordinate,
}

impl BoundingBox {
    /// Computes the bounding box of a coordinate sequence.
    ///
    /// Returns `None` for an empty sequence, which has no meaningful bounds.
    pub fn from_geometry(geometry: &[GeographicCoordinate]) -> Option<Self> {
        let first = geometry.first()?;
        let mut bbox = BoundingBox { sw: *first, ne: *first };
        for coord in &geometry[1..] {
            bbox.extend(*coord);
        }
        Some(bbox)
    }

    /// Grows the box to include the given coordinate.
    pub fn extend(&mut self, coord: GeographicCoordinate) {
        self.sw.lat = self.sw.lat.min(coord.lat);
        self.sw.lng = self.sw.lng.min(coord.lng);
        self.ne.lat = self.ne.lat.max(coord.lat);
        self.ne.lng = self.ne.lng.max(coord.lng);
    }

    /// Returns true if the coordinate lies within the box (inclusive).
    pub fn contains(&self, coord: GeographicCoordinate) -> bool {
        coord.lat >= self.sw.lat
            && coord.lat <= self.ne.lat
            && coord.lng >= self.sw.lng
            && coord.lng <= self.ne.lng
    }
}

/// Maneuver categories as reported by OSRM-compatible services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManeuverType {
    Turn,
    #[serde(rename = "new name")]
    NewName,
    Depart,
    Arrive,
    Merge,
    #[serde(rename = "on ramp")]
    OnRamp,
    #[serde(rename = "off ramp")]
    OffRamp,
    Fork,
    #[serde(rename = "end of road")]
    EndOfRoad,
    Continue,
    Roundabout,
    Rotary,
    #[serde(rename = "roundabout turn")]
    RoundaboutTurn,
    Notification,
    #[serde(rename = "exit roundabout")]
    ExitRoundabout,
    #[serde(rename = "exit rotary")]
    ExitRotary,
}

/// Directional qualifiers for a maneuver (which way, how sharp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManeuverModifier {
    #[serde(rename = "uturn")]
    UTurn,
    #[serde(rename = "sharp right")]
    SharpRight,
    Right,
    #[serde(rename = "slight right")]
    SlightRight,
    Straight,
    #[serde(rename = "slight left")]
    SlightLeft,
    Left,
    #[serde(rename = "sharp left")]
    SharpLeft,
}

/// The text and maneuver symbology for one banner row.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualInstructionContent {
    /// Primary display text, usually a road name or exit
    pub text: String,
    pub maneuver_type: Option<ManeuverType>,
    pub maneuver_modifier: Option<ManeuverModifier>,
    /// Exit angle for roundabouts, in degrees
    pub roundabout_exit_degrees: Option<u16>,
}

/// A banner to display ahead of a maneuver.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualInstruction {
    pub primary_content: VisualInstructionContent,
    pub secondary_content: Option<VisualInstructionContent>,
    /// How far before the maneuver this banner becomes relevant, in meters
    pub trigger_distance_before_maneuver: f64,
}

/// An utterance to speak ahead of a maneuver.
#[derive(Debug, Clone, PartialEq)]
pub struct SpokenInstruction {
    /// Plain text fallback for engines without SSML support
    pub text: String,
    pub ssml: Option<String>,
    /// How far before the maneuver this should be spoken, in meters
    pub trigger_distance_before_maneuver: f64,
}

/// A single maneuver leg of a route.
///
/// A step begins with the maneuver described by `instruction` and its
/// geometry continues up to the next maneuver point. Visual and spoken
/// instructions attached to a step announce the upcoming maneuver (the
/// start of the following step), triggered by distance to the step end.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    /// Full geometry of this step
    pub geometry: Vec<GeographicCoordinate>,
    /// Distance to travel along this step, in meters
    pub distance: f64,
    pub road_name: Option<String>,
    /// Human-readable instruction summary for this step
    pub instruction: String,
    pub visual_instructions: Vec<VisualInstruction>,
    pub spoken_instructions: Vec<SpokenInstruction>,
}

impl RouteStep {
    /// First coordinate of the step geometry, if any.
    #[inline]
    pub fn start(&self) -> Option<GeographicCoordinate> {
        self.geometry.first().copied()
    }

    /// Last coordinate of the step geometry (the upcoming maneuver
    /// point), if any.
    #[inline]
    pub fn end(&self) -> Option<GeographicCoordinate> {
        self.geometry.last().copied()
    }
}

/// A complete route between waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Full route geometry, start to destination
    pub geometry: Vec<GeographicCoordinate>,
    pub bbox: BoundingBox,
    /// Total route distance in meters
    pub distance: f64,
    /// The waypoints the route was requested through, in order
    pub waypoints: Vec<GeographicCoordinate>,
    /// Maneuver steps in travel order
    pub steps: Vec<RouteStep>,
}
