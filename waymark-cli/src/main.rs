//! Waymark CLI - turn-by-turn navigation from the command line.
//!
//! Fetches routes from OSRM-compatible services, replays them through
//! the simulated location provider, and manages the configuration file.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::{config, route, simulate};

#[derive(Parser)]
#[command(
    name = "waymark",
    version,
    about = "Turn-by-turn navigation sessions over OSRM-compatible routing services"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a route and print its steps
    Route(route::RouteArgs),
    /// Replay a saved route as a simulated navigation session
    Simulate(simulate::SimulateArgs),
    /// Show or initialize the configuration file
    Config(config::ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Route(args) => route::run(args),
        Commands::Simulate(args) => simulate::run(args),
        Commands::Config(args) => config::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {}", error);
            ExitCode::FAILURE
        }
    }
}
