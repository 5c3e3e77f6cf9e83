//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;

use waymark::config::ConfigFile;
use waymark::model::GeographicCoordinate;
use waymark::session::StepAdvanceMode;

use crate::error::CliError;

/// Step advance strategy selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AdvanceMode {
    /// Never advance automatically; useful for inspecting single fixes
    Manual,
    /// Advance within 20 m of the end of the current step
    Distance,
    /// Advance when the next step's line is at least as close as the current one
    Relative,
}

impl AdvanceMode {
    /// Convert to the session's step advance mode.
    pub fn to_step_advance(self) -> StepAdvanceMode {
        match self {
            AdvanceMode::Manual => StepAdvanceMode::Manual,
            AdvanceMode::Distance => StepAdvanceMode::DistanceToEndOfStep {
                distance: 20,
                minimum_horizontal_accuracy: 25,
            },
            AdvanceMode::Relative => StepAdvanceMode::RelativeLineStringDistance {
                minimum_horizontal_accuracy: 25,
                automatic_advance_distance: None,
            },
        }
    }
}

/// Parse a `LAT,LNG` argument as decimal degrees.
pub fn parse_coordinate(input: &str) -> Result<GeographicCoordinate, CliError> {
    let invalid = |reason: &str| CliError::InvalidCoordinate {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let (lat, lng) = input
        .split_once(',')
        .ok_or_else(|| invalid("expected LAT,LNG"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| invalid("latitude is not a number"))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| invalid("longitude is not a number"))?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(invalid("latitude must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(invalid("longitude must be between -180 and 180"));
    }

    Ok(GeographicCoordinate { lat, lng })
}

/// Resolve the routing endpoint from CLI args and config.
pub fn resolve_endpoint(cli_endpoint: Option<String>, config: &ConfigFile) -> String {
    // CLI takes precedence, then config
    cli_endpoint.unwrap_or_else(|| config.routing.endpoint.clone())
}

/// Resolve the routing profile from CLI args and config.
pub fn resolve_profile(cli_profile: Option<String>, config: &ConfigFile) -> String {
    cli_profile.unwrap_or_else(|| config.routing.profile.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate_accepts_spaces() {
        let coordinate = parse_coordinate("52.517033, 13.388798").unwrap();
        assert_eq!(coordinate.lat, 52.517033);
        assert_eq!(coordinate.lng, 13.388798);
    }

    #[test]
    fn test_parse_coordinate_rejects_missing_comma() {
        assert!(matches!(
            parse_coordinate("52.5 13.3"),
            Err(CliError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_parse_coordinate_rejects_out_of_range() {
        assert!(parse_coordinate("91.0,0.0").is_err());
        assert!(parse_coordinate("0.0,181.0").is_err());
        assert!(parse_coordinate("-90.0,-180.0").is_ok());
    }

    #[test]
    fn test_cli_overrides_config_endpoint() {
        let config = ConfigFile::default();
        assert_eq!(
            resolve_endpoint(Some("http://localhost:5000".to_string()), &config),
            "http://localhost:5000"
        );
        assert_eq!(resolve_endpoint(None, &config), config.routing.endpoint);
    }
}
