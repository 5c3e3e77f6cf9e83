//! Route command - fetch a route and print its steps.

use std::fs;
use std::time::SystemTime;

use clap::Args;
use tracing::info;

use waymark::config::ConfigFile;
use waymark::model::{GeographicCoordinate, Route, UserLocation};
use waymark::routing::{
    HttpClient, OsrmHttpRequestGenerator, OsrmResponseParser, ReqwestClient, RouteRequestGenerator,
    RouteResponseParser, RoutingError,
};

use super::common::{parse_coordinate, resolve_endpoint, resolve_profile};
use crate::error::CliError;

/// Arguments for the route command.
#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Start position as LAT,LNG decimal degrees
    #[arg(long)]
    pub from: String,

    /// Destination as LAT,LNG decimal degrees
    #[arg(long)]
    pub to: String,

    /// Intermediate waypoint as LAT,LNG; repeat for several, in visiting order
    #[arg(long)]
    pub via: Vec<String>,

    /// Routing server root, for example https://router.project-osrm.org
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Routing profile such as driving or cycling
    #[arg(long)]
    pub profile: Option<String>,

    /// Write the raw response to this file for `waymark simulate`
    #[arg(long)]
    pub output: Option<String>,
}

/// Run the route command.
pub fn run(args: RouteArgs) -> Result<(), CliError> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(fetch_and_print(args))
}

async fn fetch_and_print(args: RouteArgs) -> Result<(), CliError> {
    let _log_guard = waymark::logging::init_logging(
        waymark::logging::default_log_dir(),
        waymark::logging::default_log_file(),
    )?;

    let origin = parse_coordinate(&args.from)?;
    let destination = parse_coordinate(&args.to)?;
    let mut waypoints: Vec<GeographicCoordinate> = Vec::with_capacity(args.via.len() + 1);
    for via in &args.via {
        waypoints.push(parse_coordinate(via)?);
    }
    waypoints.push(destination);

    let config = ConfigFile::load().unwrap_or_default();
    let endpoint = resolve_endpoint(args.endpoint, &config);
    let profile = resolve_profile(args.profile, &config);

    println!("Waymark Route v{}", waymark::VERSION);
    println!("==================");
    println!();
    println!("From:     {:.6}, {:.6}", origin.lat, origin.lng);
    for via in waypoints.iter().take(waypoints.len() - 1) {
        println!("Via:      {:.6}, {:.6}", via.lat, via.lng);
    }
    println!("To:       {:.6}, {:.6}", destination.lat, destination.lng);
    println!("Endpoint: {}", endpoint);
    println!("Profile:  {}", profile);
    println!();

    // The strategy pieces are used directly instead of through
    // RouteAdapter so the raw body is available for --output.
    let generator = OsrmHttpRequestGenerator::new(&endpoint, &profile);
    let client = ReqwestClient::new()?;
    let parser = OsrmResponseParser::new();

    let origin_fix = UserLocation {
        coordinate: origin,
        horizontal_accuracy: 0.0,
        course_over_ground: None,
        timestamp: SystemTime::now(),
    };
    let request = generator.generate_request(&origin_fix, &waypoints)?;
    info!(url = %request.url, "Requesting route");

    let response = client.execute(request).await?;
    if !(200..300).contains(&response.status) {
        return Err(CliError::Routing(RoutingError::InvalidStatus {
            code: response.status,
        }));
    }

    if let Some(path) = &args.output {
        fs::write(path, &response.body)?;
        println!("Saved raw response to {}", path);
        println!();
    }

    let routes = parser.parse_response(&response.body)?;
    let route = match routes.first() {
        Some(route) => route,
        None => {
            println!("No route found between the given positions.");
            return Ok(());
        }
    };
    if routes.len() > 1 {
        println!(
            "Service returned {} candidate routes; showing the first.",
            routes.len()
        );
        println!();
    }

    print_route(route);
    Ok(())
}

fn print_route(route: &Route) {
    println!("Route: {:.0} m in {} steps", route.distance, route.steps.len());
    println!();
    for (index, step) in route.steps.iter().enumerate() {
        match &step.road_name {
            Some(name) => println!(
                "  {:>3}. {} ({}, {:.0} m)",
                index + 1,
                step.instruction,
                name,
                step.distance
            ),
            None => println!(
                "  {:>3}. {} ({:.0} m)",
                index + 1,
                step.instruction,
                step.distance
            ),
        }
    }
}
