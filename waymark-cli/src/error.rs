//! CLI error types.

use thiserror::Error;

use waymark::config::ConfigFileError;
use waymark::routing::RoutingError;
use waymark::simulation::SimulationError;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or setting resolution failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read or written.
    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),

    /// A coordinate argument was not a valid `LAT,LNG` pair.
    #[error("invalid coordinate '{input}': {reason}")]
    InvalidCoordinate { input: String, reason: String },

    /// Route acquisition failed.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// The simulated provider could not start.
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    /// File or logging I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
