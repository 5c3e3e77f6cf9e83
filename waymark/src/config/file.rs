//! Configuration file handling for ~/.waymark/config.ini.
//!
//! Loads and saves user configuration with sensible defaults. Parsing
//! overlays the file's values on [`ConfigFile::default`], so a partial
//! file is fine and unknown keys are ignored.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

/// Default OSRM-compatible routing server.
pub const DEFAULT_ENDPOINT: &str = "https://router.project-osrm.org";

/// Default routing profile.
pub const DEFAULT_PROFILE: &str = "driving";

/// Default simulation playback speed (real time).
pub const DEFAULT_WARP_FACTOR: f64 = 1.0;

/// Default horizontal accuracy reported by simulated fixes, in meters.
pub const DEFAULT_HORIZONTAL_ACCURACY: f64 = 5.0;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// User configuration loaded from `~/.waymark/config.ini`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub routing: RoutingSettings,
    pub simulation: SimulationSettings,
}

/// `[routing]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSettings {
    /// Server root of the OSRM-compatible routing service.
    pub endpoint: String,
    /// Routing profile exposed by the server, e.g. `driving`.
    pub profile: String,
}

/// `[simulation]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    /// Playback speed multiplier, at least 1.0.
    pub warp_factor: f64,
    /// Horizontal accuracy reported by simulated fixes, in meters.
    pub horizontal_accuracy: f64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            routing: RoutingSettings {
                endpoint: DEFAULT_ENDPOINT.to_string(),
                profile: DEFAULT_PROFILE.to_string(),
            },
            simulation: SimulationSettings {
                warp_factor: DEFAULT_WARP_FACTOR,
                horizontal_accuracy: DEFAULT_HORIZONTAL_ACCURACY,
            },
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.waymark/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.waymark/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            let config = Self::default();
            config.save_to(&path)?;
        }
        Ok(path)
    }
}

/// Get the path to the config directory (~/.waymark).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".waymark")
}

/// Get the path to the config file (~/.waymark/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Overlay the file's values on the defaults, validating as we go.
fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("routing")) {
        if let Some(v) = section.get("endpoint") {
            let v = v.trim();
            if !v.is_empty() {
                config.routing.endpoint = v.to_string();
            }
        }
        if let Some(v) = section.get("profile") {
            let v = v.trim();
            if !v.is_empty() {
                config.routing.profile = v.to_string();
            }
        }
    }

    if let Some(section) = ini.section(Some("simulation")) {
        if let Some(v) = section.get("warp_factor") {
            let parsed: f64 = v
                .trim()
                .parse()
                .ok()
                .filter(|f: &f64| f.is_finite() && *f >= 1.0)
                .ok_or_else(|| ConfigFileError::InvalidValue {
                    section: "simulation".to_string(),
                    key: "warp_factor".to_string(),
                    value: v.to_string(),
                    reason: "must be a number of at least 1.0".to_string(),
                })?;
            config.simulation.warp_factor = parsed;
        }
        if let Some(v) = section.get("horizontal_accuracy") {
            let parsed: f64 = v
                .trim()
                .parse()
                .ok()
                .filter(|f: &f64| f.is_finite() && *f >= 0.0)
                .ok_or_else(|| ConfigFileError::InvalidValue {
                    section: "simulation".to_string(),
                    key: "horizontal_accuracy".to_string(),
                    value: v.to_string(),
                    reason: "must be a non-negative number of meters".to_string(),
                })?;
            config.simulation.horizontal_accuracy = parsed;
        }
    }

    Ok(config)
}

/// Convert a `ConfigFile` to a commented INI string for saving.
fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[routing]
; Server root of an OSRM-compatible routing service
endpoint = {}
; Routing profile exposed by the server (driving, cycling, walking)
profile = {}

[simulation]
; Playback speed multiplier, 1.0 is real time
warp_factor = {}
; Horizontal accuracy reported by simulated fixes, in meters
horizontal_accuracy = {}
"#,
        config.routing.endpoint,
        config.routing.profile,
        config.simulation.warp_factor,
        config.simulation.horizontal_accuracy,
    )
}
