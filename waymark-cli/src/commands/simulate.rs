//! Simulate command - replay a saved route as a live navigation session.

use std::fs;
use std::sync::Arc;
use std::time::SystemTime;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use waymark::config::ConfigFile;
use waymark::deviation::{RouteDeviation, RouteDeviationTracking};
use waymark::model::{GeographicCoordinate, Route, UserLocation};
use waymark::routing::{
    OsrmResponseParser, ReqwestClient, RouteAdapter, RouteResponseParser, RoutingError,
};
use waymark::session::{
    CorrectiveAction, NavigationConfig, NavigationDelegate, NavigationRunner, NavigationSession,
    TripState,
};
use waymark::simulation::{SimulatedLocationProvider, SimulationConfig};

use super::common::AdvanceMode;
use crate::error::CliError;

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Saved routing response, as written by `waymark route --output`
    #[arg(long)]
    pub route: String,

    /// Playback speed multiplier; 1.0 replays in real time
    #[arg(long)]
    pub warp: Option<f64>,

    /// Step advance strategy
    #[arg(long, value_enum, default_value_t = AdvanceMode::Relative)]
    pub advance: AdvanceMode,

    /// Request a new route over the configured endpoint when off route
    #[arg(long)]
    pub recalculate: bool,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_session(args))
}

async fn run_session(args: SimulateArgs) -> Result<(), CliError> {
    let _log_guard = waymark::logging::init_logging(
        waymark::logging::default_log_dir(),
        waymark::logging::default_log_file(),
    )?;

    let config = ConfigFile::load().unwrap_or_default();

    let body = fs::read(&args.route)?;
    let routes = OsrmResponseParser::new().parse_response(&body)?;
    let route = match routes.into_iter().next() {
        Some(route) => route,
        None => {
            return Err(CliError::Routing(RoutingError::Parse(format!(
                "{} contains no routes",
                args.route
            ))))
        }
    };

    let warp = args.warp.unwrap_or(config.simulation.warp_factor);
    let start = match route.geometry.first() {
        Some(coordinate) => *coordinate,
        None => {
            return Err(CliError::Routing(RoutingError::Parse(format!(
                "{} contains a route without geometry",
                args.route
            ))))
        }
    };

    println!("Waymark Simulation v{}", waymark::VERSION);
    println!("=====================");
    println!();
    println!("Route:   {} ({:.0} m, {} steps)", args.route, route.distance, route.steps.len());
    println!("Warp:    {}x", warp);
    println!("Advance: {:?}", args.advance);
    if args.recalculate {
        println!("Reroute: via {}", config.routing.endpoint);
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let client = Arc::new(ReqwestClient::new()?);
    let adapter = Arc::new(RouteAdapter::osrm_with_client(
        &config.routing.endpoint,
        &config.routing.profile,
        client,
    ));

    let mut nav_config =
        NavigationConfig::default().with_step_advance(args.advance.to_step_advance());
    let delegate: Arc<dyn NavigationDelegate> = if args.recalculate {
        nav_config = nav_config.with_deviation_tracking(RouteDeviationTracking::StaticThreshold {
            minimum_horizontal_accuracy: 25,
            max_acceptable_deviation: 25.0,
        });
        Arc::new(RerouteDelegate)
    } else {
        Arc::new(StayOnRouteDelegate)
    };

    let provider = SimulatedLocationProvider::new(
        SimulationConfig::default()
            .with_warp_factor(warp)
            .with_horizontal_accuracy(config.simulation.horizontal_accuracy),
    );
    provider.start_simulating(&route)?;

    let initial = UserLocation {
        coordinate: start,
        horizontal_accuracy: config.simulation.horizontal_accuracy,
        course_over_ground: None,
        timestamp: SystemTime::now(),
    };
    let session = Arc::new(NavigationSession::start(
        route, initial, nav_config, delegate, adapter,
    ));
    let mut states = session.subscribe();
    let runner = NavigationRunner::spawn(session.clone(), &provider);

    // Ctrl+C cancels the token from the signal handler thread.
    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let mut printer = TransitionPrinter::new();
    printer.report(&session.trip_state());

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                println!();
                println!("Received shutdown signal, stopping navigation...");
                runner.shutdown().await;
                provider.stop();
                println!("Stopped before arrival.");
                return Ok(());
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                printer.report(&state);
                if state.is_complete() {
                    break;
                }
            }
        }
    }

    runner.wait().await;
    provider.stop();
    println!();
    println!("Arrived at the destination.");
    Ok(())
}

/// Prints step and deviation changes, skipping repeats.
struct TransitionPrinter {
    last_instruction: String,
    was_off_route: bool,
}

impl TransitionPrinter {
    fn new() -> Self {
        Self {
            last_instruction: String::new(),
            was_off_route: false,
        }
    }

    fn report(&mut self, state: &TripState) {
        match state {
            TripState::Navigating {
                remaining_steps,
                distance_to_next_maneuver,
                deviation,
                ..
            } => {
                if let Some(step) = remaining_steps.first() {
                    if step.instruction != self.last_instruction {
                        self.last_instruction = step.instruction.clone();
                        match &step.road_name {
                            Some(name) => println!(
                                "  {} ({}, {:.0} m)",
                                step.instruction, name, distance_to_next_maneuver
                            ),
                            None => println!(
                                "  {} ({:.0} m)",
                                step.instruction, distance_to_next_maneuver
                            ),
                        }
                    }
                }
                match deviation {
                    RouteDeviation::NoDeviation => {
                        if self.was_off_route {
                            self.was_off_route = false;
                            println!("  Back on route");
                        }
                    }
                    RouteDeviation::OffRoute {
                        deviation_from_route_line,
                    } => {
                        if !self.was_off_route {
                            self.was_off_route = true;
                            println!("  Off route by {:.0} m", deviation_from_route_line);
                        }
                    }
                }
            }
            TripState::Complete => {}
        }
    }
}

/// Keeps the current route no matter how far off it the traveler gets.
struct StayOnRouteDelegate;

impl NavigationDelegate for StayOnRouteDelegate {}

/// Requests new routes through the offered waypoints on every
/// departure from the route.
struct RerouteDelegate;

impl NavigationDelegate for RerouteDelegate {
    fn corrective_action_for_deviation(
        &self,
        deviation_in_meters: f64,
        remaining_waypoints: &[GeographicCoordinate],
    ) -> CorrectiveAction {
        info!(deviation_m = deviation_in_meters, "Off route, requesting recalculation");
        CorrectiveAction::GetNewRoutes {
            waypoints: remaining_waypoints.to_vec(),
        }
    }

    fn loaded_alternative_routes(&self, routes: &[Route]) {
        info!(count = routes.len(), "Loaded recalculated routes");
    }

    fn recalculation_failed(&self, error: &RoutingError) {
        warn!(%error, "Route recalculation failed");
    }
}
