//! User configuration
//!
//! `~/.waymark/config.ini` holds the routing endpoint and simulation
//! defaults the CLI starts from; command-line flags override it.

mod file;

pub use file::{
    config_directory, config_file_path, ConfigFile, ConfigFileError, RoutingSettings,
    SimulationSettings, DEFAULT_ENDPOINT, DEFAULT_HORIZONTAL_ACCURACY, DEFAULT_PROFILE,
    DEFAULT_WARP_FACTOR,
};
