//! Simulated location provider
//!
//! Replays a route's geometry as a stream of location fixes so a full
//! navigation session can run without a physical sensor.
//!
//! # Design
//!
//! [`RoutePlayback`] holds the deterministic part: which fix comes
//! next, on a purely simulated clock. [`SimulatedLocationProvider`]
//! adds the real-time part: a background task that emits playback
//! fixes at `update_interval / warp_factor` cadence and fans them out
//! over a broadcast channel. Warp only changes how fast fixes are
//! emitted; the fixes themselves (coordinates, timestamps) are
//! identical at every warp factor.
//!
//! The provider position can also be overridden directly with
//! [`SimulatedLocationProvider::set_location`], which is how tests
//! teleport the traveler off route without waiting for playback.

mod playback;

pub use playback::RoutePlayback;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::location::LocationProvider;
use crate::model::{Route, UserLocation};

/// Capacity of the fix fan-out channel; laggards lose old fixes.
const BROADCAST_CAPACITY: usize = 32;

/// Simulated provider configuration.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Time multiplier: 1.0 replays in real time, larger is faster.
    /// Must be at least 1.0.
    pub warp_factor: f64,

    /// Simulated time between fixes. Sub-millisecond values are
    /// clamped to 1 ms of emission cadence.
    pub update_interval: Duration,

    /// Horizontal accuracy reported on every fix, in meters.
    pub horizontal_accuracy: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            warp_factor: 1.0,
            update_interval: Duration::from_secs(1),
            horizontal_accuracy: 5.0,
        }
    }
}

impl SimulationConfig {
    pub fn with_warp_factor(mut self, warp_factor: f64) -> Self {
        self.warp_factor = warp_factor;
        self
    }

    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn with_horizontal_accuracy(mut self, horizontal_accuracy: f64) -> Self {
        self.horizontal_accuracy = horizontal_accuracy;
        self
    }
}

/// Error type for the simulated provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    /// The route has no coordinates to replay.
    #[error("route has no geometry to replay")]
    EmptyGeometry,

    /// The provider was already started; it is not restartable.
    #[error("simulation is already running")]
    AlreadyRunning,

    /// Warp factor outside the supported range.
    #[error("warp factor must be a finite value of at least 1.0, got {0}")]
    InvalidWarpFactor(f64),
}

/// A location provider that replays a route.
pub struct SimulatedLocationProvider {
    config: SimulationConfig,
    sender: broadcast::Sender<UserLocation>,
    last: Arc<Mutex<Option<UserLocation>>>,
    started: AtomicBool,
    token: CancellationToken,
}

impl SimulatedLocationProvider {
    /// Create a new provider; nothing is emitted until
    /// [`start_simulating`](Self::start_simulating) is called.
    pub fn new(config: SimulationConfig) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            config,
            sender,
            last: Arc::new(Mutex::new(None)),
            started: AtomicBool::new(false),
            token: CancellationToken::new(),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SimulationConfig::default())
    }

    /// Begin replaying `route` on a background task.
    ///
    /// Fails if the route has no geometry, the warp factor is invalid,
    /// or the provider was started before (providers are single-shot).
    pub fn start_simulating(&self, route: &Route) -> Result<(), SimulationError> {
        let warp = self.config.warp_factor;
        if !warp.is_finite() || warp < 1.0 {
            return Err(SimulationError::InvalidWarpFactor(warp));
        }

        let mut playback = RoutePlayback::new(
            route.geometry.clone(),
            self.config.horizontal_accuracy,
            self.config.update_interval,
            SystemTime::now(),
        )?;

        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SimulationError::AlreadyRunning);
        }

        let cadence = self
            .config
            .update_interval
            .div_f64(warp)
            .max(Duration::from_millis(1));
        info!(
            warp_factor = warp,
            cadence_ms = cadence.as_millis() as u64,
            points = route.geometry.len(),
            "Starting route playback"
        );

        let sender = self.sender.clone();
        let last = self.last.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut end_logged = false;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Route playback stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let fix = playback.next_fix();
                        *last.lock() = Some(fix);
                        // No receivers is fine; fixes are just dropped
                        let _ = sender.send(fix);

                        if playback.is_exhausted() && !end_logged {
                            end_logged = true;
                            debug!("Playback reached the end of the route geometry");
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Override the provider position immediately.
    ///
    /// The fix is recorded as the latest location and broadcast to all
    /// subscribers, ahead of whatever playback emits next.
    pub fn set_location(&self, location: UserLocation) {
        *self.last.lock() = Some(location);
        let _ = self.sender.send(location);
    }

    /// Stop emitting fixes. Irreversible, like the rest of the
    /// provider lifecycle.
    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl LocationProvider for SimulatedLocationProvider {
    fn subscribe(&self) -> broadcast::Receiver<UserLocation> {
        self.sender.subscribe()
    }

    fn last_location(&self) -> Option<UserLocation> {
        *self.last.lock()
    }
}

impl Drop for SimulatedLocationProvider {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
