//! Config command - show and initialize the configuration file.

use clap::Args;

use waymark::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Arguments for the config command.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Create the configuration file with defaults if it does not exist
    #[arg(long)]
    pub init: bool,
}

/// Run the config command.
pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    if args.init {
        let path = ConfigFile::ensure_exists()?;
        println!("Configuration file: {}", path.display());
    } else {
        println!("Configuration file: {}", config_file_path().display());
    }
    println!();

    let config = ConfigFile::load().unwrap_or_default();

    println!("[routing]");
    println!("  endpoint = {}", config.routing.endpoint);
    println!("  profile = {}", config.routing.profile);
    println!();
    println!("[simulation]");
    println!("  warp_factor = {}", config.simulation.warp_factor);
    println!(
        "  horizontal_accuracy = {}",
        config.simulation.horizontal_accuracy
    );

    Ok(())
}
