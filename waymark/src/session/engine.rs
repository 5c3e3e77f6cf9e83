//! The navigation session engine
//!
//! Owns the trip state machine and drives it from location updates.
//! All mutation happens under a single mutex held only for short,
//! non-blocking sections; route recalculation runs on a spawned task
//! that re-enters the session through a weak reference, so a dropped
//! session silently absorbs a late result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coord::{distance_to_end_of_polyline, snap_to_polyline};
use crate::deviation::RouteDeviation;
use crate::model::{GeographicCoordinate, Route, RouteStep, UserLocation};
use crate::routing::RouteAdapter;
use crate::session::advance::{prune_visited_waypoints, should_advance_to_next_step};
use crate::session::delegate::NavigationDelegate;
use crate::session::types::{
    CorrectiveAction, NavigationConfig, TripState, DEFAULT_ARRIVAL_DISTANCE,
};

/// A single trip from start to arrival.
///
/// Created with [`start`](NavigationSession::start) and driven by
/// [`update_user_location`](NavigationSession::update_user_location);
/// observers either poll [`trip_state`](NavigationSession::trip_state)
/// or watch [`subscribe`](NavigationSession::subscribe). Dropping the
/// session cancels any recalculation still in flight.
pub struct NavigationSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: NavigationConfig,
    delegate: Arc<dyn NavigationDelegate>,
    route_adapter: Arc<RouteAdapter>,
    state: Mutex<SessionState>,
    recalculating: AtomicBool,
    state_tx: watch::Sender<TripState>,
    token: CancellationToken,
}

struct SessionState {
    route: Route,
    trip: TripState,
    last_location: UserLocation,
}

struct UpdateOutcome {
    trip: TripState,
    rising_edge: Option<RisingEdge>,
}

struct RisingEdge {
    deviation_in_meters: f64,
    waypoints: Vec<GeographicCoordinate>,
}

impl NavigationSession {
    /// Starts navigating `route` from `initial_location`.
    ///
    /// A route without steps completes immediately. The adapter is only
    /// used when the delegate requests a recalculation.
    pub fn start(
        route: Route,
        initial_location: UserLocation,
        config: NavigationConfig,
        delegate: Arc<dyn NavigationDelegate>,
        route_adapter: Arc<RouteAdapter>,
    ) -> Self {
        let trip = initial_trip_state(&route, initial_location);
        match &trip {
            TripState::Navigating {
                remaining_steps, ..
            } => info!(
                steps = remaining_steps.len(),
                distance_m = route.distance,
                "Navigation session started"
            ),
            TripState::Complete => warn!("Route has no steps, trip is already complete"),
        }

        let (state_tx, _) = watch::channel(trip.clone());
        let inner = Arc::new(SessionInner {
            config,
            delegate,
            route_adapter,
            state: Mutex::new(SessionState {
                route,
                trip,
                last_location: initial_location,
            }),
            recalculating: AtomicBool::new(false),
            state_tx,
            token: CancellationToken::new(),
        });

        Self { inner }
    }

    /// The current trip state.
    pub fn trip_state(&self) -> TripState {
        self.inner.state.lock().trip.clone()
    }

    /// A watch receiver that always holds the latest trip state.
    pub fn subscribe(&self) -> watch::Receiver<TripState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether a route recalculation is currently in flight.
    pub fn is_recalculating(&self) -> bool {
        self.inner.recalculating.load(Ordering::Acquire)
    }

    /// Feeds one location fix through the update pipeline and returns
    /// the resulting state.
    ///
    /// Non-blocking and safe to call at any rate; after arrival this is
    /// a no-op. If the fix newly leaves the route the delegate decides
    /// on a corrective action before this returns, and any requested
    /// recalculation runs on a background task.
    pub fn update_user_location(&self, location: UserLocation) -> TripState {
        let outcome = {
            let mut state = self.inner.state.lock();
            self.inner.apply_location(&mut state, location)
        };

        // The delegate runs outside the lock so it may call back into
        // the session.
        if let Some(edge) = outcome.rising_edge {
            let action = self
                .inner
                .delegate
                .corrective_action_for_deviation(edge.deviation_in_meters, &edge.waypoints);
            match action {
                CorrectiveAction::DoNothing => {
                    debug!("Delegate chose to stay on the current route")
                }
                CorrectiveAction::GetNewRoutes { waypoints } => {
                    SessionInner::dispatch_recalculation(&self.inner, waypoints)
                }
            }
        }

        outcome.trip
    }

    /// Advances past the current step regardless of position.
    ///
    /// Advancing past the final step completes the trip; after that
    /// this is a no-op.
    pub fn advance_to_next_step(&self) -> TripState {
        let mut state = self.inner.state.lock();
        if state.trip.is_complete() {
            return TripState::Complete;
        }
        advance_one_step(&mut state);
        if state.trip.is_complete() {
            info!("Arrived at destination, trip complete");
        }
        self.inner.publish(&state);
        state.trip.clone()
    }
}

impl Drop for NavigationSession {
    fn drop(&mut self) {
        self.inner.token.cancel();
    }
}

impl SessionInner {
    /// Runs one fix through advance, snap and deviation. Returns the
    /// new state plus the deviation rising edge, if this fix caused
    /// one.
    fn apply_location(&self, state: &mut SessionState, location: UserLocation) -> UpdateOutcome {
        if state.trip.is_complete() {
            return UpdateOutcome {
                trip: TripState::Complete,
                rising_edge: None,
            };
        }
        state.last_location = location;

        let advance = match &state.trip {
            TripState::Navigating {
                remaining_steps, ..
            } => should_advance_to_next_step(
                &remaining_steps[0],
                remaining_steps.get(1),
                &location,
                self.config.step_advance,
            ),
            TripState::Complete => false,
        };
        if advance {
            advance_one_step(state);
        }
        if state.trip.is_complete() {
            info!("Arrived at destination, trip complete");
            self.publish(state);
            return UpdateOutcome {
                trip: TripState::Complete,
                rising_edge: None,
            };
        }

        let snapped = snap_location(location, &state.route.geometry);
        let mut rising_edge = None;
        if let TripState::Navigating {
            snapped_user_location,
            remaining_steps,
            remaining_waypoints,
            distance_to_next_maneuver,
            deviation,
        } = &mut state.trip
        {
            *snapped_user_location = snapped;
            *distance_to_next_maneuver =
                distance_to_end_of_polyline(snapped.coordinate, &remaining_steps[0].geometry);

            let previous = *deviation;
            let verdict = self.config.deviation_tracking.check_route_deviation(
                location,
                &state.route,
                &remaining_steps[0],
                previous,
            );
            *deviation = verdict;

            if let (
                RouteDeviation::NoDeviation,
                RouteDeviation::OffRoute {
                    deviation_from_route_line,
                },
            ) = (previous, verdict)
            {
                info!(
                    deviation_m = deviation_from_route_line,
                    "User left the route"
                );
                rising_edge = Some(RisingEdge {
                    deviation_in_meters: deviation_from_route_line,
                    waypoints: delegate_waypoints(&remaining_steps[0], remaining_waypoints),
                });
            }
        }
        self.publish(state);

        UpdateOutcome {
            trip: state.trip.clone(),
            rising_edge,
        }
    }

    /// Kicks off a recalculation unless one is already running.
    ///
    /// The spawned task holds only a weak reference to the session;
    /// if the session is dropped before the response arrives, the
    /// result is discarded.
    fn dispatch_recalculation(inner: &Arc<SessionInner>, waypoints: Vec<GeographicCoordinate>) {
        if inner
            .recalculating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Recalculation already in flight, ignoring deviation");
            return;
        }

        let last_location = inner.state.lock().last_location;
        let adapter = Arc::clone(&inner.route_adapter);
        let delegate = Arc::clone(&inner.delegate);
        let token = inner.token.child_token();
        let weak = Arc::downgrade(inner);
        info!(waypoints = waypoints.len(), "Requesting route recalculation");

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Recalculation cancelled");
                    return;
                }
                result = adapter.get_routes(last_location, &waypoints) => result,
            };

            let inner = match weak.upgrade() {
                Some(inner) => inner,
                None => return,
            };
            match result {
                Ok(routes) => {
                    match routes.first() {
                        Some(route) => inner.install_route(route.clone()),
                        None => info!("Recalculation found no routes, keeping current route"),
                    }
                    inner.recalculating.store(false, Ordering::Release);
                    delegate.loaded_alternative_routes(&routes);
                }
                Err(error) => {
                    warn!(error = %error, "Route recalculation failed");
                    inner.recalculating.store(false, Ordering::Release);
                    delegate.recalculation_failed(&error);
                }
            }
        });
    }

    /// Replaces the active route and restarts the trip on its first
    /// step. A trip that completed while the request was in flight
    /// stays complete.
    fn install_route(&self, route: Route) {
        let mut state = self.state.lock();
        if state.trip.is_complete() {
            debug!("Trip completed during recalculation, dropping new route");
            return;
        }
        info!(
            distance_m = route.distance,
            steps = route.steps.len(),
            "Switching to recalculated route"
        );
        state.trip = initial_trip_state(&route, state.last_location);
        state.route = route;
        self.publish(&state);
    }

    fn publish(&self, state: &SessionState) {
        self.state_tx.send_replace(state.trip.clone());
    }
}

/// The state a trip starts in: all steps remaining, all waypoints but
/// the origin unvisited, no deviation.
fn initial_trip_state(route: &Route, location: UserLocation) -> TripState {
    if route.steps.is_empty() {
        return TripState::Complete;
    }
    let snapped = snap_location(location, &route.geometry);
    let remaining_steps = route.steps.clone();
    let remaining_waypoints = route.waypoints.get(1..).unwrap_or_default().to_vec();
    let distance_to_next_maneuver =
        distance_to_end_of_polyline(snapped.coordinate, &remaining_steps[0].geometry);
    TripState::Navigating {
        snapped_user_location: snapped,
        remaining_steps,
        remaining_waypoints,
        distance_to_next_maneuver,
        deviation: RouteDeviation::NoDeviation,
    }
}

/// Moves the step cursor forward by one, dropping any waypoint the
/// completed step ended on. Past the final step the trip is complete.
fn advance_one_step(state: &mut SessionState) {
    let completed = if let TripState::Navigating {
        snapped_user_location,
        remaining_steps,
        remaining_waypoints,
        distance_to_next_maneuver,
        ..
    } = &mut state.trip
    {
        let done = remaining_steps.remove(0);
        if let Some(end) = done.end() {
            prune_visited_waypoints(
                remaining_waypoints,
                end,
                f64::from(DEFAULT_ARRIVAL_DISTANCE),
            );
        }
        match remaining_steps.first() {
            Some(next) => {
                *distance_to_next_maneuver = distance_to_end_of_polyline(
                    snapped_user_location.coordinate,
                    &next.geometry,
                );
                debug!(
                    remaining = remaining_steps.len(),
                    instruction = %next.instruction,
                    "Advanced to next step"
                );
                false
            }
            None => true,
        }
    } else {
        false
    };
    if completed {
        state.trip = TripState::Complete;
    }
}

fn snap_location(location: UserLocation, polyline: &[GeographicCoordinate]) -> UserLocation {
    match snap_to_polyline(location.coordinate, polyline) {
        Some(coordinate) => UserLocation {
            coordinate,
            ..location
        },
        None => location,
    }
}

/// Waypoints handed to the delegate on a deviation: the end of the
/// step being traveled, then every waypoint not yet visited.
fn delegate_waypoints(
    current_step: &RouteStep,
    remaining_waypoints: &[GeographicCoordinate],
) -> Vec<GeographicCoordinate> {
    let mut waypoints = Vec::with_capacity(remaining_waypoints.len() + 1);
    if let Some(end) = current_step.end() {
        waypoints.push(end);
    }
    waypoints.extend_from_slice(remaining_waypoints);
    waypoints
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::SystemTime;

    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;
    use crate::deviation::{DeviationDetector, RouteDeviationTracking};
    use crate::model::BoundingBox;
    use crate::routing::http::tests::MockHttpClient;
    use crate::routing::http::{HttpClient, HttpResponse};
    use crate::routing::{
        RequestMethod, RouteRequest, RouteRequestGenerator, RouteResponseParser, RoutingError,
    };
    use crate::session::types::StepAdvanceMode;

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

    /// Two roughly 111 m steps: east along the equator, then north.
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

    /// A one-step replacement route joining the destination diagonally.
    fn detour_route() -> Route {
        Route {
            geometry: vec![coord(0.0005, 0.0005), coord(0.001, 0.001)],
            bbox: BoundingBox {
                sw: coord(0.0005, 0.0005),
                ne: coord(0.001, 0.001),
            },
            distance: 78.0,
            waypoints: vec![coord(0.0005, 0.0005), coord(0.001, 0.001)],
            steps: vec![step("Head northeast", &[(0.0005, 0.0005), (0.001, 0.001)])],
        }
    }

    struct StubGenerator;

    impl RouteRequestGenerator for StubGenerator {
        fn generate_request(
            &self,
            _user_location: &UserLocation,
            _waypoints: &[GeographicCoordinate],
        ) -> Result<RouteRequest, RoutingError> {
            Ok(RouteRequest {
                method: RequestMethod::Get,
                url: "http://router.test/route".to_string(),
                headers: Default::default(),
                body: Vec::new(),
            })
        }
    }

    struct StubParser {
        routes: Vec<Route>,
    }

    impl RouteResponseParser for StubParser {
        fn parse_response(&self, _response: &[u8]) -> Result<Vec<Route>, RoutingError> {
            Ok(self.routes.clone())
        }
    }

    fn adapter_with(client: Arc<dyn HttpClient>, routes: Vec<Route>) -> Arc<RouteAdapter> {
        Arc::new(RouteAdapter::new(
            Arc::new(StubGenerator),
            Arc::new(StubParser { routes }),
            client,
        ))
    }

    fn unused_adapter() -> Arc<RouteAdapter> {
        adapter_with(Arc::new(MockHttpClient::with_responses(vec![])), vec![])
    }

    fn ok_response() -> HttpResponse {
        HttpResponse {
            status: 200,
            body: b"{}".to_vec(),
        }
    }

    /// Records every delegate call and answers deviations with a fixed
    /// action.
    struct RecordingDelegate {
        action: CorrectiveAction,
        corrective_calls: Mutex<Vec<(f64, Vec<GeographicCoordinate>)>>,
        loaded_routes: Mutex<Vec<Vec<Route>>>,
        failures: Mutex<Vec<RoutingError>>,
    }

    impl RecordingDelegate {
        fn answering(action: CorrectiveAction) -> Arc<Self> {
            Arc::new(Self {
                action,
                corrective_calls: Mutex::new(Vec::new()),
                loaded_routes: Mutex::new(Vec::new()),
                failures: Mutex::new(Vec::new()),
            })
        }

        fn corrective_calls(&self) -> Vec<(f64, Vec<GeographicCoordinate>)> {
            self.corrective_calls.lock().clone()
        }

        fn loaded_routes(&self) -> Vec<Vec<Route>> {
            self.loaded_routes.lock().clone()
        }

        fn failures(&self) -> Vec<RoutingError> {
            self.failures.lock().clone()
        }
    }

    impl NavigationDelegate for RecordingDelegate {
        fn corrective_action_for_deviation(
            &self,
            deviation_in_meters: f64,
            remaining_waypoints: &[GeographicCoordinate],
        ) -> CorrectiveAction {
            self.corrective_calls
                .lock()
                .push((deviation_in_meters, remaining_waypoints.to_vec()));
            self.action.clone()
        }

        fn loaded_alternative_routes(&self, routes: &[Route]) {
            self.loaded_routes.lock().push(routes.to_vec());
        }

        fn recalculation_failed(&self, error: &RoutingError) {
            self.failures.lock().push(error.clone());
        }
    }

    /// Always returns the same verdict.
    struct ConstantDetector(RouteDeviation);

    impl DeviationDetector for ConstantDetector {
        fn check_route_deviation(
            &self,
            _location: UserLocation,
            _route: &Route,
            _current_route_step: &RouteStep,
        ) -> RouteDeviation {
            self.0
        }
    }

    /// Pops one scripted verdict per call, then stays on route.
    struct ScriptedDetector {
        verdicts: Mutex<VecDeque<RouteDeviation>>,
    }

    impl ScriptedDetector {
        fn new(verdicts: Vec<RouteDeviation>) -> Arc<Self> {
            Arc::new(Self {
                verdicts: Mutex::new(verdicts.into()),
            })
        }
    }

    impl DeviationDetector for ScriptedDetector {
        fn check_route_deviation(
            &self,
            _location: UserLocation,
            _route: &Route,
            _current_route_step: &RouteStep,
        ) -> RouteDeviation {
            self.verdicts
                .lock()
                .pop_front()
                .unwrap_or(RouteDeviation::NoDeviation)
        }
    }

    fn off_route(meters: f64) -> RouteDeviation {
        RouteDeviation::OffRoute {
            deviation_from_route_line: meters,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached after 1000 yields");
    }

    #[test]
    fn test_route_without_steps_completes_immediately() {
        let mut route = test_route();
        route.steps.clear();
        let session = NavigationSession::start(
            route,
            fix(0.0, 0.0),
            NavigationConfig::default(),
            RecordingDelegate::answering(CorrectiveAction::DoNothing),
            unused_adapter(),
        );
        assert_eq!(session.trip_state(), TripState::Complete);
    }

    #[test]
    fn test_initial_state() {
        let route = test_route();
        let session = NavigationSession::start(
            route.clone(),
            fix(0.0, 0.0),
            NavigationConfig::default(),
            RecordingDelegate::answering(CorrectiveAction::DoNothing),
            unused_adapter(),
        );

        match session.trip_state() {
            TripState::Navigating {
                snapped_user_location,
                remaining_steps,
                remaining_waypoints,
                distance_to_next_maneuver,
                deviation,
            } => {
                assert_eq!(snapped_user_location.coordinate, coord(0.0, 0.0));
                assert_eq!(remaining_steps, route.steps);
                assert_eq!(remaining_waypoints, vec![coord(0.001, 0.001)]);
                // The whole first step is still ahead, about 111.19 m.
                assert!((distance_to_next_maneuver - 111.19).abs() < 0.1);
                assert_eq!(deviation, RouteDeviation::NoDeviation);
            }
            TripState::Complete => panic!("expected a navigating state"),
        }
    }

    #[test]
    fn test_manual_mode_never_auto_advances() {
        let config =
            NavigationConfig::default().with_step_advance(StepAdvanceMode::Manual);
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            config,
            RecordingDelegate::answering(CorrectiveAction::DoNothing),
            unused_adapter(),
        );

        for location in [
            fix(0.0, 0.0005),
            fix(0.0, 0.001),
            fix(0.0005, 0.001),
            fix(0.001, 0.001),
            fix(0.001, 0.001),
        ] {
            let state = session.update_user_location(location);
            match state {
                TripState::Navigating {
                    remaining_steps, ..
                } => assert_eq!(remaining_steps.len(), 2),
                TripState::Complete => panic!("manual mode must not complete on its own"),
            }
        }
    }

    #[test]
    fn test_manual_advance_prunes_waypoints_and_completes() {
        let mut route = test_route();
        // Extra waypoint exactly at the first step's end.
        route.waypoints = vec![coord(0.0, 0.0), coord(0.0, 0.001), coord(0.001, 0.001)];
        let config =
            NavigationConfig::default().with_step_advance(StepAdvanceMode::Manual);
        let session = NavigationSession::start(
            route,
            fix(0.0, 0.0),
            config,
            RecordingDelegate::answering(CorrectiveAction::DoNothing),
            unused_adapter(),
        );

        match session.advance_to_next_step() {
            TripState::Navigating {
                remaining_steps,
                remaining_waypoints,
                ..
            } => {
                assert_eq!(remaining_steps.len(), 1);
                assert_eq!(remaining_steps[0].instruction, "Turn left");
                assert_eq!(remaining_waypoints, vec![coord(0.001, 0.001)]);
            }
            TripState::Complete => panic!("one step should remain"),
        }

        assert_eq!(session.advance_to_next_step(), TripState::Complete);
        // Terminal: further advances and updates stay complete.
        assert_eq!(session.advance_to_next_step(), TripState::Complete);
        assert_eq!(
            session.update_user_location(fix(0.0, 0.0)),
            TripState::Complete
        );
    }

    #[test]
    fn test_walking_the_route_completes_exactly_once() {
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            NavigationConfig::default(),
            RecordingDelegate::answering(CorrectiveAction::DoNothing),
            unused_adapter(),
        );
        let full_steps = test_route().steps;

        let walk = [
            fix(0.0, 0.0),
            fix(0.0, 0.0005),
            fix(0.0, 0.001),
            fix(0.0005, 0.001),
            fix(0.001, 0.001),
            fix(0.001, 0.001),
        ];

        let mut completion_transitions = 0;
        let mut was_complete = false;
        let mut last_len = full_steps.len();
        for location in walk {
            match session.update_user_location(location) {
                TripState::Navigating {
                    remaining_steps, ..
                } => {
                    assert!(!was_complete, "the trip must never leave Complete");
                    // Steps only ever shrink, and always form a suffix
                    // of the route.
                    assert!(remaining_steps.len() <= last_len);
                    assert_eq!(
                        remaining_steps.as_slice(),
                        &full_steps[full_steps.len() - remaining_steps.len()..]
                    );
                    last_len = remaining_steps.len();
                }
                TripState::Complete => {
                    if !was_complete {
                        completion_transitions += 1;
                    }
                    was_complete = true;
                }
            }
        }

        assert_eq!(completion_transitions, 1);
        assert_eq!(session.trip_state(), TripState::Complete);
    }

    #[test]
    fn test_rising_edge_invokes_delegate_once_per_departure() {
        let config = NavigationConfig::default()
            .with_step_advance(StepAdvanceMode::Manual)
            .with_deviation_tracking(RouteDeviationTracking::StaticThreshold {
                minimum_horizontal_accuracy: 25,
                max_acceptable_deviation: 25.0,
            });
        let delegate = RecordingDelegate::answering(CorrectiveAction::DoNothing);
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            config,
            delegate.clone(),
            unused_adapter(),
        );

        // Two off-route fixes produce one delegate call.
        session.update_user_location(fix(0.0005, 0.0));
        session.update_user_location(fix(0.00051, 0.0));
        assert_eq!(delegate.corrective_calls().len(), 1);

        let (meters, waypoints) = delegate.corrective_calls()[0].clone();
        assert!((meters - 55.6).abs() < 1.0);
        // Current step's end, then the untouched destination waypoint.
        assert_eq!(waypoints, vec![coord(0.0, 0.001), coord(0.001, 0.001)]);

        // Returning to the route re-arms the edge.
        session.update_user_location(fix(0.0, 0.0003));
        session.update_user_location(fix(0.0005, 0.0003));
        assert_eq!(delegate.corrective_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_recalculation_switches_to_first_new_route() {
        let config = NavigationConfig::default()
            .with_step_advance(StepAdvanceMode::Manual)
            .with_deviation_tracking(RouteDeviationTracking::Custom {
                detector: Arc::new(ConstantDetector(off_route(42.0))),
            });
        let delegate = RecordingDelegate::answering(CorrectiveAction::GetNewRoutes {
            waypoints: vec![coord(0.001, 0.001)],
        });
        let detour = detour_route();
        let adapter = adapter_with(
            Arc::new(MockHttpClient::with_response(Ok(ok_response()))),
            vec![detour.clone()],
        );
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            config,
            delegate.clone(),
            adapter,
        );

        let state = session.update_user_location(fix(0.0, 0.0005));
        assert_eq!(state.deviation(), Some(off_route(42.0)));
        let calls = delegate.corrective_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 42.0);

        wait_until(|| !session.is_recalculating() && delegate.loaded_routes().len() == 1).await;

        match session.trip_state() {
            TripState::Navigating {
                remaining_steps,
                remaining_waypoints,
                deviation,
                ..
            } => {
                assert_eq!(remaining_steps, detour.steps);
                assert_eq!(remaining_waypoints, vec![coord(0.001, 0.001)]);
                assert_eq!(deviation, RouteDeviation::NoDeviation);
            }
            TripState::Complete => panic!("detour should still be navigating"),
        }
        assert_eq!(delegate.loaded_routes()[0].len(), 1);
        assert!(delegate.failures().is_empty());
    }

    #[tokio::test]
    async fn test_failed_recalculation_leaves_state_untouched() {
        let config = NavigationConfig::default()
            .with_step_advance(StepAdvanceMode::Manual)
            .with_deviation_tracking(RouteDeviationTracking::Custom {
                detector: Arc::new(ConstantDetector(off_route(42.0))),
            });
        let delegate = RecordingDelegate::answering(CorrectiveAction::GetNewRoutes {
            waypoints: vec![coord(0.001, 0.001)],
        });
        let adapter = adapter_with(
            Arc::new(MockHttpClient::with_response(Err(RoutingError::Transport(
                "connection refused".to_string(),
            )))),
            vec![detour_route()],
        );
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            config,
            delegate.clone(),
            adapter,
        );

        let state_after_update = session.update_user_location(fix(0.0, 0.0005));
        wait_until(|| delegate.failures().len() == 1).await;

        assert_eq!(session.trip_state(), state_after_update);
        assert!(!session.is_recalculating());
        assert_eq!(
            delegate.failures(),
            vec![RoutingError::Transport("connection refused".to_string())]
        );
        assert!(delegate.loaded_routes().is_empty());
    }

    #[tokio::test]
    async fn test_inflight_recalculation_is_never_duplicated() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(MockHttpClient::gated(
            vec![Ok(ok_response()), Ok(ok_response())],
            gate.clone(),
        ));
        let detector = ScriptedDetector::new(vec![
            off_route(42.0),
            RouteDeviation::NoDeviation,
            off_route(42.0),
        ]);
        let config = NavigationConfig::default()
            .with_step_advance(StepAdvanceMode::Manual)
            .with_deviation_tracking(RouteDeviationTracking::Custom { detector });
        let delegate = RecordingDelegate::answering(CorrectiveAction::GetNewRoutes {
            waypoints: vec![coord(0.001, 0.001)],
        });
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            config,
            delegate.clone(),
            adapter_with(client.clone(), vec![detour_route()]),
        );

        // First departure starts a request that parks at the gate.
        session.update_user_location(fix(0.0, 0.0001));
        wait_until(|| client.request_count() == 1).await;
        assert!(session.is_recalculating());

        // Back on route, then a second departure while the first
        // request is still in flight: the delegate is consulted again
        // but no second request goes out.
        session.update_user_location(fix(0.0, 0.0002));
        session.update_user_location(fix(0.0, 0.0003));
        assert_eq!(delegate.corrective_calls().len(), 2);
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(client.request_count(), 1);
        assert!(session.is_recalculating());

        gate.notify_one();
        wait_until(|| !session.is_recalculating()).await;
        assert_eq!(client.request_count(), 1);
        assert_eq!(delegate.loaded_routes().len(), 1);
    }

    #[tokio::test]
    async fn test_recalculation_without_routes_keeps_current_route() {
        let config = NavigationConfig::default()
            .with_step_advance(StepAdvanceMode::Manual)
            .with_deviation_tracking(RouteDeviationTracking::Custom {
                detector: Arc::new(ConstantDetector(off_route(42.0))),
            });
        let delegate = RecordingDelegate::answering(CorrectiveAction::GetNewRoutes {
            waypoints: vec![coord(0.001, 0.001)],
        });
        let adapter = adapter_with(
            Arc::new(MockHttpClient::with_response(Ok(ok_response()))),
            vec![],
        );
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            config,
            delegate.clone(),
            adapter,
        );

        let state_after_update = session.update_user_location(fix(0.0, 0.0005));
        wait_until(|| delegate.loaded_routes().len() == 1).await;

        assert_eq!(delegate.loaded_routes()[0], Vec::<Route>::new());
        assert_eq!(session.trip_state(), state_after_update);
        assert!(!session.is_recalculating());
    }

    #[tokio::test]
    async fn test_dropping_the_session_cancels_recalculation() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(MockHttpClient::gated(vec![Ok(ok_response())], gate.clone()));
        let config = NavigationConfig::default()
            .with_step_advance(StepAdvanceMode::Manual)
            .with_deviation_tracking(RouteDeviationTracking::Custom {
                detector: Arc::new(ConstantDetector(off_route(42.0))),
            });
        let delegate = RecordingDelegate::answering(CorrectiveAction::GetNewRoutes {
            waypoints: vec![coord(0.001, 0.001)],
        });
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            config,
            delegate.clone(),
            adapter_with(client, vec![detour_route()]),
        );

        session.update_user_location(fix(0.0, 0.0005));
        drop(session);

        gate.notify_one();
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert!(delegate.loaded_routes().is_empty());
        assert!(delegate.failures().is_empty());
    }

    #[test]
    fn test_subscribe_tracks_transitions() {
        let config =
            NavigationConfig::default().with_step_advance(StepAdvanceMode::Manual);
        let session = NavigationSession::start(
            test_route(),
            fix(0.0, 0.0),
            config,
            RecordingDelegate::answering(CorrectiveAction::DoNothing),
            unused_adapter(),
        );
        let mut receiver = session.subscribe();

        match &*receiver.borrow_and_update() {
            TripState::Navigating {
                remaining_steps, ..
            } => assert_eq!(remaining_steps.len(), 2),
            TripState::Complete => panic!("should start navigating"),
        }

        session.advance_to_next_step();
        session.advance_to_next_step();
        assert_eq!(*receiver.borrow_and_update(), TripState::Complete);
    }
}
