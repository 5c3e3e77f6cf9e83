//! OSRM-compatible routing strategies
//!
//! Concrete [`RouteRequestGenerator`] and [`RouteResponseParser`]
//! implementations for OSRM's HTTP API (v5) and services speaking the
//! same protocol. Requests ask for GeoJSON geometries so the response
//! decodes with plain serde, no polyline decoding involved.
//!
//! Plain OSRM carries no banner or voice payloads, so the parser
//! synthesizes one visual instruction per step announcing the next
//! maneuver, and leaves spoken instructions empty.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{RequestMethod, RouteRequest, RouteRequestGenerator, RouteResponseParser, RoutingError};
use crate::model::{
    BoundingBox, GeographicCoordinate, ManeuverModifier, ManeuverType, Route, RouteStep,
    UserLocation, VisualInstruction, VisualInstructionContent,
};

/// Builds GET requests against an OSRM `route` endpoint.
#[derive(Debug, Clone)]
pub struct OsrmHttpRequestGenerator {
    base_url: String,
    profile: String,
    alternatives: bool,
}

impl OsrmHttpRequestGenerator {
    /// `base_url` is the server root, without the `/route/v1` suffix.
    pub fn new(base_url: &str, profile: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: profile.to_string(),
            alternatives: false,
        }
    }

    /// Ask the service for alternative routes as well.
    pub fn with_alternatives(mut self) -> Self {
        self.alternatives = true;
        self
    }
}

impl RouteRequestGenerator for OsrmHttpRequestGenerator {
    fn generate_request(
        &self,
        user_location: &UserLocation,
        waypoints: &[GeographicCoordinate],
    ) -> Result<RouteRequest, RoutingError> {
        if waypoints.is_empty() {
            return Err(RoutingError::NoWaypoints);
        }

        let mut pairs = Vec::with_capacity(waypoints.len() + 1);
        pairs.push(format_coordinate(user_location.coordinate));
        pairs.extend(waypoints.iter().copied().map(format_coordinate));

        let url = format!(
            "{}/route/v1/{}/{}?alternatives={}&geometries=geojson&overview=full&steps=true",
            self.base_url,
            self.profile,
            pairs.join(";"),
            self.alternatives,
        );

        Ok(RouteRequest {
            method: RequestMethod::Get,
            url,
            headers: BTreeMap::new(),
            body: Vec::new(),
        })
    }
}

/// OSRM expects `lng,lat`; six decimals is ~0.1 m resolution.
fn format_coordinate(coord: GeographicCoordinate) -> String {
    format!("{:.6},{:.6}", coord.lng, coord.lat)
}

/// Decodes OSRM route responses with GeoJSON geometries.
#[derive(Debug, Clone, Default)]
pub struct OsrmResponseParser;

impl OsrmResponseParser {
    pub fn new() -> Self {
        Self
    }
}

impl RouteResponseParser for OsrmResponseParser {
    fn parse_response(&self, response: &[u8]) -> Result<Vec<Route>, RoutingError> {
        let parsed: OsrmResponse = serde_json::from_slice(response)
            .map_err(|e| RoutingError::Parse(format!("invalid JSON: {}", e)))?;

        if parsed.code != "Ok" {
            let detail = parsed.message.unwrap_or_default();
            return Err(RoutingError::Parse(format!(
                "service refused the request: {} {}",
                parsed.code, detail
            )));
        }

        let waypoints: Vec<GeographicCoordinate> = parsed
            .waypoints
            .iter()
            .map(|waypoint| to_coordinate(waypoint.location))
            .collect();

        parsed
            .routes
            .iter()
            .map(|route| convert_route(route, &waypoints))
            .collect()
    }
}

fn convert_route(
    route: &OsrmRoute,
    waypoints: &[GeographicCoordinate],
) -> Result<Route, RoutingError> {
    let geometry: Vec<GeographicCoordinate> = route
        .geometry
        .coordinates
        .iter()
        .map(|pair| to_coordinate(*pair))
        .collect();
    let bbox = BoundingBox::from_geometry(&geometry)
        .ok_or_else(|| RoutingError::Parse("route has no geometry".to_string()))?;

    let mut steps = Vec::new();
    for leg in &route.legs {
        for (index, step) in leg.steps.iter().enumerate() {
            steps.push(convert_step(step, leg.steps.get(index + 1)));
        }
    }

    Ok(Route {
        geometry,
        bbox,
        distance: route.distance,
        waypoints: waypoints.to_vec(),
        steps,
    })
}

fn convert_step(step: &OsrmStep, next: Option<&OsrmStep>) -> RouteStep {
    // The banner previews the next step's maneuver and stays visible
    // for the whole of this step. The leg's final (arrive) step has
    // nothing left to announce.
    let visual_instructions = match next {
        Some(next_step) => vec![VisualInstruction {
            primary_content: VisualInstructionContent {
                text: next_step.maneuver.instruction_text(),
                maneuver_type: next_step.maneuver.parsed_type(),
                maneuver_modifier: next_step.maneuver.parsed_modifier(),
                roundabout_exit_degrees: None,
            },
            secondary_content: None,
            trigger_distance_before_maneuver: step.distance,
        }],
        None => Vec::new(),
    };

    RouteStep {
        geometry: step
            .geometry
            .coordinates
            .iter()
            .map(|pair| to_coordinate(*pair))
            .collect(),
        distance: step.distance,
        road_name: if step.name.is_empty() {
            None
        } else {
            Some(step.name.clone())
        },
        instruction: step.maneuver.instruction_text(),
        visual_instructions,
        spoken_instructions: Vec::new(),
    }
}

/// GeoJSON order is `[lng, lat]`.
#[inline]
fn to_coordinate(pair: [f64; 2]) -> GeographicCoordinate {
    GeographicCoordinate {
        lat: pair[1],
        lng: pair[0],
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
    #[serde(default)]
    waypoints: Vec<OsrmWaypoint>,
}

#[derive(Debug, Deserialize)]
struct OsrmWaypoint {
    /// Snapped `[longitude, latitude]` pair
    location: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    geometry: OsrmGeometry,
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: f64,
    geometry: OsrmGeometry,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    maneuver_type: String,
    #[serde(default)]
    modifier: Option<String>,
}

impl OsrmManeuver {
    /// "turn" + "right" becomes "Turn right".
    fn instruction_text(&self) -> String {
        let text = match &self.modifier {
            Some(modifier) => format!("{} {}", self.maneuver_type, modifier),
            None => self.maneuver_type.clone(),
        };
        let mut chars = text.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => text,
        }
    }

    /// Reuses the serde rename table; unknown strings become `None`
    /// instead of failing the whole parse.
    fn parsed_type(&self) -> Option<ManeuverType> {
        serde_json::from_value(serde_json::Value::String(self.maneuver_type.clone())).ok()
    }

    fn parsed_modifier(&self) -> Option<ManeuverModifier> {
        let modifier = self.modifier.as_ref()?;
        serde_json::from_value(serde_json::Value::String(modifier.clone())).ok()
    }
}
