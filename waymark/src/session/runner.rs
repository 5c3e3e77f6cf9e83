//! Binds a location provider to a navigation session

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::location::LocationProvider;
use crate::session::NavigationSession;

/// Background task feeding every provider fix into a session.
///
/// The loop ends on its own when the trip completes or the provider's
/// stream closes; [`shutdown`](NavigationRunner::shutdown) ends it
/// early. If the session falls behind the provider, stale fixes are
/// dropped rather than replayed.
pub struct NavigationRunner {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl NavigationRunner {
    /// Subscribes to `provider` and spawns the update loop.
    pub fn spawn<P>(session: Arc<NavigationSession>, provider: &P) -> Self
    where
        P: LocationProvider + ?Sized,
    {
        let mut locations = provider.subscribe();
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = loop_token.cancelled() => {
                        debug!("Navigation runner stopped");
                        break;
                    }
                    received = locations.recv() => match received {
                        Ok(location) => {
                            if session.update_user_location(location).is_complete() {
                                info!("Trip complete, navigation runner exiting");
                                break;
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "Location stream lagging, dropping stale fixes");
                        }
                        Err(RecvError::Closed) => {
                            debug!("Location stream closed, navigation runner exiting");
                            break;
                        }
                    }
                }
            }
        });

        Self { handle, token }
    }

    /// Waits for the loop to end on its own.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use tokio::sync::broadcast;

    use super::*;
    use crate::model::{BoundingBox, GeographicCoordinate, Route, RouteStep, UserLocation};
    use crate::routing::http::tests::MockHttpClient;
    use crate::routing::RouteAdapter;
    use crate::session::types::StepAdvanceMode;
    use crate::session::{NavigationConfig, NavigationDelegate, TripState};
    use crate::simulation::{SimulatedLocationProvider, SimulationConfig};

    fn coord(lat: f64, lng: f64) -> GeographicCoordinate {
        GeographicCoordinate { lat, lng }
    }

    fn fix(lat: f64, lng: f64) -> UserLocation {
        UserLocation {
            coordinate: coord(lat, lng),
            horizontal_accuracy: 5.0,
            course_over_ground: None,
            timestamp: SystemTime::UNIX_EPOCH,
        }
    }

    fn step(instruction: &str, points: &[(f64, f64)]) -> RouteStep {
        RouteStep {
            geometry: points.iter().map(|&(lat, lng)| coord(lat, lng)).collect(),
            distance: 111.0,
            road_name: None,
            instruction: instruction.to_string(),
            visual_instructions: vec![],
            spoken_instructions: vec![],
        }
    }

    fn test_route() -> Route {
        Route {
            geometry: vec![coord(0.0, 0.0), coord(0.0, 0.001), coord(0.001, 0.001)],
            bbox: BoundingBox {
                sw: coord(0.0, 0.0),
                ne: coord(0.001, 0.001),
            },
            distance: 222.0,
            waypoints: vec![coord(0.0, 0.0), coord(0.001, 0.001)],
            steps: vec![
                step("Head east", &[(0.0, 0.0), (0.0, 0.001)]),
                step("Turn left", &[(0.0, 0.001), (0.001, 0.001)]),
            ],
        }
    }

    struct NoopDelegate;

    impl NavigationDelegate for NoopDelegate {}

    fn unused_adapter() -> Arc<RouteAdapter> {
        Arc::new(RouteAdapter::osrm_with_client(
            "http://router.test",
            "driving",
            Arc::new(MockHttpClient::with_responses(vec![])),
        ))
    }

    /// Provider backed by a plain broadcast channel the test feeds by
    /// hand.
    struct ChannelProvider {
        sender: broadcast::Sender<UserLocation>,
    }

    impl LocationProvider for ChannelProvider {
        fn subscribe(&self) -> broadcast::Receiver<UserLocation> {
            self.sender.subscribe()
        }

        fn last_location(&self) -> Option<UserLocation> {
            None
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_drives_simulated_trip_to_completion() {
        let route = test_route();
        let provider =
            SimulatedLocationProvider::new(SimulationConfig::default().with_warp_factor(10.0));
        provider.start_simulating(&route).unwrap();

        let session = Arc::new(NavigationSession::start(
            route,
            fix(0.0, 0.0),
            NavigationConfig::default(),
            Arc::new(NoopDelegate),
            unused_adapter(),
        ));
        let mut states = session.subscribe();
        let runner = NavigationRunner::spawn(session.clone(), &provider);

        let complete = states.wait_for(|state| state.is_complete()).await;
        assert!(complete.is_ok());
        runner.wait().await;
        assert_eq!(session.trip_state(), TripState::Complete);
    }

    #[tokio::test]
    async fn test_runner_skips_lag_and_stops_on_closed_stream() {
        let (sender, _) = broadcast::channel(1);
        let provider = ChannelProvider { sender };
        let session = Arc::new(NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            NavigationConfig::default().with_step_advance(StepAdvanceMode::Manual),
            Arc::new(NoopDelegate),
            unused_adapter(),
        ));
        let runner = NavigationRunner::spawn(session.clone(), &provider);

        // Overflow the single-slot channel before the runner task has
        // run at all; it sees a lag error, then the surviving fix.
        for lng in [0.0001, 0.0002, 0.0003] {
            provider.sender.send(fix(0.0, lng)).unwrap();
        }
        drop(provider);
        runner.wait().await;

        match session.trip_state() {
            TripState::Navigating {
                snapped_user_location,
                ..
            } => {
                assert!((snapped_user_location.coordinate.lat).abs() < 1e-9);
                assert!((snapped_user_location.coordinate.lng - 0.0003).abs() < 1e-9);
            }
            TripState::Complete => panic!("manual mode cannot complete on its own"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_runner() {
        let (sender, _) = broadcast::channel(8);
        let provider = ChannelProvider { sender };
        let session = Arc::new(NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            NavigationConfig::default().with_step_advance(StepAdvanceMode::Manual),
            Arc::new(NoopDelegate),
            unused_adapter(),
        ));
        let initial = session.trip_state();
        let runner = NavigationRunner::spawn(session.clone(), &provider);

        runner.shutdown().await;

        // The runner's receiver is gone, so the send has no takers and
        // the session never saw a fix.
        assert!(provider.sender.send(fix(0.0, 0.0005)).is_err());
        assert_eq!(session.trip_state(), initial);
    }
}
