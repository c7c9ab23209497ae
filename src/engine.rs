//! # Tracking Engine
//!
//! The state machine that turns a stream of position samples into turn alerts,
//! off-route warnings and reroute requests.
//!
//! ## Per-sample evaluation
//!
//! Each call to [`TrackingEngine::update`] runs, in order:
//!
//! 1. **Arrival**: within `arrival_radius_m` of the destination ends the session.
//! 2. **Off-route**: farther than `off_route_threshold_m` from the polyline raises
//!    an `OffRoute` alert (debounced) and, when online, asks for a reroute. When on
//!    route but offline, a `Disconnected` alert is raised instead (own debounce).
//! 3. **Step advancement**: entering `preview_radius_m` of the next maneuver
//!    previews it and arms a fallback timer; entering `trigger_radius_m` fires the
//!    turn alert immediately.
//!
//! ## Fallback timers
//!
//! GPS fixes often drop out right at intersections. When a step is previewed, a
//! [`PendingTrigger`] is recorded with the step index and the route generation.
//! If the fast path has not fired the turn by the time the timer is due, the
//! timer fires it instead. A timer whose step was already triggered, whose step
//! index is no longer active, or whose route has since been replaced is dropped
//! without effect.
//!
//! The engine never reads a clock: every entry point takes `now_ms`, so hosts
//! call [`TrackingEngine::poll_timers`] when [`TrackingEngine::next_timer_deadline`]
//! passes, and tests drive time explicitly.
//!
//! ## Example
//!
//! ```rust
//! use route_guidance::{AlertKind, GpsPoint, PositionSample, Route, Step, TrackingEngine, TurnKind};
//!
//! let route = Route::new(
//!     vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.01, 0.0)],
//!     vec![Step::new(TurnKind::Left, "turn on Elm St (left)", GpsPoint::new(0.005, 0.0))],
//! ).unwrap();
//!
//! let mut engine = TrackingEngine::default();
//! engine.start(route);
//!
//! // ~22m before the turn: preview and turn fire together
//! let sample = PositionSample::new(GpsPoint::new(0.0048, 0.0), 0);
//! let update = engine.update(&sample, 0, true);
//! assert_eq!(update.alerts, vec![AlertKind::Preview, AlertKind::Left]);
//! assert_eq!(update.next_turn.as_deref(), Some("continue to destination"));
//! ```

use log::{debug, info, warn};

use crate::alert::AlertKind;
use crate::error::NavError;
use crate::geo_utils::{distance_to_polyline, format_meters, haversine_distance};
use crate::reroute::RerouteCoordinator;
use crate::route::{RawRoute, Route};
use crate::{GpsPoint, PositionSample};

/// Next-turn text once every step has been passed.
pub const FINISHED_TEXT: &str = "continue to destination";

// ============================================================================
// Configuration
// ============================================================================

/// Distances and timings used by the tracking engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrackingConfig {
    /// Distance to destination that counts as arrived.
    /// Default: 25.0 meters
    pub arrival_radius_m: f64,

    /// Distance from the polyline beyond which the walker is off route.
    /// Default: 45.0 meters (consumer GPS wanders 10-20m in cities)
    pub off_route_threshold_m: f64,

    /// Distance to a maneuver at which it is previewed.
    /// Default: 120.0 meters
    pub preview_radius_m: f64,

    /// Distance to a maneuver at which the turn alert fires.
    /// Default: 35.0 meters
    pub trigger_radius_m: f64,

    /// Delay after a preview before the fallback timer fires the turn.
    /// Default: 10000 ms
    pub preview_fallback_ms: u64,

    /// `OffRoute` alerts repeat only once more than this has passed.
    /// Default: 20000 ms
    pub off_route_alert_interval_ms: u64,

    /// Minimum spacing of reroute attempts (inclusive).
    /// Default: 30000 ms
    pub reroute_cooldown_ms: u64,

    /// `Disconnected` alerts raised while tracking repeat only once more than
    /// this has passed.
    /// Default: 30000 ms
    pub disconnected_alert_interval_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            arrival_radius_m: 25.0,
            off_route_threshold_m: 45.0,
            preview_radius_m: 120.0,
            trigger_radius_m: 35.0,
            preview_fallback_ms: 10_000,
            off_route_alert_interval_ms: 20_000,
            reroute_cooldown_ms: 30_000,
            disconnected_alert_interval_ms: 30_000,
        }
    }
}

// ============================================================================
// Engine Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum EngineState {
    /// No route loaded
    Idle,
    Tracking,
    Arrived,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum StopReason {
    Manual,
    Arrived,
    Error,
}

/// Ask the host to fetch a new route between these points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RerouteRequest {
    /// Hand this back to `complete_reroute` with the result
    pub attempt: u64,
    pub from: GpsPoint,
    pub to: GpsPoint,
}

/// Everything one engine call produced.
///
/// `status` and `next_turn` are `None` when the call had nothing new to say;
/// hosts keep showing the previous text.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrackingUpdate {
    /// Alerts to dispatch, in order
    pub alerts: Vec<AlertKind>,
    pub status: Option<String>,
    pub next_turn: Option<String>,
    pub reroute: Option<RerouteRequest>,
    /// Engine state after the call
    pub state: EngineState,
}

impl TrackingUpdate {
    fn new(state: EngineState) -> Self {
        Self {
            alerts: Vec::new(),
            status: None,
            next_turn: None,
            reroute: None,
            state,
        }
    }

    fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Append another update produced later in the same call.
    fn merge(&mut self, later: TrackingUpdate) {
        self.alerts.extend(later.alerts);
        if later.status.is_some() {
            self.status = later.status;
        }
        if later.next_turn.is_some() {
            self.next_turn = later.next_turn;
        }
        if later.reroute.is_some() {
            self.reroute = later.reroute;
        }
        self.state = later.state;
    }
}

/// A deferred turn trigger armed by a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTrigger {
    pub step_index: usize,
    /// Route generation at the time the timer was armed
    pub generation: u64,
    pub fires_at_ms: u64,
}

// ============================================================================
// Tracking Engine
// ============================================================================

/// One navigation session's tracking state.
///
/// Not re-entrant: calls must be serialized by the owner.
#[derive(Debug, Clone)]
pub struct TrackingEngine {
    config: TrackingConfig,
    state: EngineState,
    route: Option<Route>,
    /// Bumped on every route install; stale timers compare against it
    generation: u64,
    current_position: Option<GpsPoint>,
    active_step_index: usize,
    last_off_route_ms: Option<u64>,
    last_disconnected_ms: Option<u64>,
    reroute: RerouteCoordinator,
    /// Monotonic across sessions so late results never match a newer request
    reroute_attempts: u64,
    awaiting_attempt: Option<u64>,
    pending: Vec<PendingTrigger>,
}

impl Default for TrackingEngine {
    fn default() -> Self {
        Self::new(TrackingConfig::default())
    }
}

impl TrackingEngine {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            state: EngineState::Idle,
            route: None,
            generation: 0,
            current_position: None,
            active_step_index: 0,
            last_off_route_ms: None,
            last_disconnected_ms: None,
            reroute: RerouteCoordinator::new(config.reroute_cooldown_ms),
            reroute_attempts: 0,
            awaiting_attempt: None,
            pending: Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Begin tracking `route`, discarding any previous session state.
    pub fn start(&mut self, route: Route) -> TrackingUpdate {
        self.current_position = None;
        self.last_off_route_ms = None;
        self.last_disconnected_ms = None;
        self.reroute.reset();
        self.awaiting_attempt = None;

        info!(
            "[Tracker] Starting navigation: {} steps, {:.0}m",
            route.step_count(),
            route.distance_m()
        );
        let next_turn = initial_next_turn(&route);
        self.install_route(route);
        self.state = EngineState::Tracking;

        let mut update = TrackingUpdate::new(self.state).with_status("navigation running");
        update.next_turn = next_turn;
        update
    }

    /// Build a route from a provider response and start tracking it.
    ///
    /// On error the engine is left exactly as it was.
    pub fn start_raw(&mut self, raw: &RawRoute) -> Result<TrackingUpdate, NavError> {
        let route = Route::from_raw(raw)?;
        Ok(self.start(route))
    }

    /// End the session. Pending timers are discarded and nothing fires afterwards.
    pub fn stop(&mut self, reason: StopReason) -> TrackingUpdate {
        let was_tracking = self.state == EngineState::Tracking;
        self.pending.clear();
        self.state = EngineState::Stopped;

        let mut update = TrackingUpdate::new(self.state).with_status("navigation stopped");
        if was_tracking && reason == StopReason::Manual {
            update.alerts.push(AlertKind::Cancelled);
        }
        info!("[Tracker] Navigation stopped ({:?})", reason);
        update
    }

    // ------------------------------------------------------------------------
    // Per-sample evaluation
    // ------------------------------------------------------------------------

    /// Process one position sample.
    ///
    /// Due fallback timers are fired first so alerts stay in time order.
    /// Non-finite samples are dropped without changing any state.
    pub fn update(&mut self, sample: &PositionSample, now_ms: u64, online: bool) -> TrackingUpdate {
        let mut update = self.poll_timers(now_ms);

        if self.state != EngineState::Tracking {
            return update;
        }
        if !sample.point.is_finite() {
            debug!("[Tracker] {} at {}ms", NavError::SampleRejected, sample.timestamp_ms);
            return update;
        }

        let position = sample.point;
        self.current_position = Some(position);

        let (destination, route_distance) = match &self.route {
            Some(route) => (
                route.destination(),
                distance_to_polyline(&position, route.polyline()),
            ),
            None => return update,
        };

        // 1. Arrival
        if haversine_distance(&position, &destination) < self.config.arrival_radius_m {
            info!("[Tracker] Arrived at destination");
            self.pending.clear();
            self.state = EngineState::Arrived;
            update.alerts.push(AlertKind::Arrived);
            update.status = Some("arrived".to_string());
            update.next_turn = Some("done".to_string());
            update.state = self.state;
            return update;
        }

        // 2. Off-route / connectivity
        if route_distance > self.config.off_route_threshold_m {
            if interval_elapsed(self.last_off_route_ms, now_ms, self.config.off_route_alert_interval_ms) {
                debug!("[Tracker] Off route by {:.1}m", route_distance);
                self.last_off_route_ms = Some(now_ms);
                update.alerts.push(AlertKind::OffRoute);
                update.status = Some("off-route warning".to_string());
            }
            if online && self.reroute.begin(now_ms) {
                self.reroute_attempts += 1;
                self.awaiting_attempt = Some(self.reroute_attempts);
                update.alerts.push(AlertKind::Rerouting);
                update.status = Some("building route...".to_string());
                update.reroute = Some(RerouteRequest {
                    attempt: self.reroute_attempts,
                    from: position,
                    to: destination,
                });
            }
        } else if !online
            && interval_elapsed(
                self.last_disconnected_ms,
                now_ms,
                self.config.disconnected_alert_interval_ms,
            )
        {
            self.last_disconnected_ms = Some(now_ms);
            update.alerts.push(AlertKind::Disconnected);
            update.status = Some("offline: rerouting unavailable".to_string());
        }

        // 3. Step advancement
        self.advance_steps(position, now_ms, &mut update);
        update
    }

    fn advance_steps(&mut self, position: GpsPoint, now_ms: u64, update: &mut TrackingUpdate) {
        let config = self.config;
        let generation = self.generation;
        let Some(route) = self.route.as_mut() else {
            return;
        };

        while self.active_step_index < route.step_count()
            && route.steps()[self.active_step_index].is_triggered()
        {
            self.active_step_index += 1;
        }

        let index = self.active_step_index;
        if let Some(step) = route.step_mut(index) {
            let distance = haversine_distance(&position, &step.trigger_point);

            if !step.is_previewed() && distance <= config.preview_radius_m {
                step.mark_previewed();
                update.alerts.push(AlertKind::Preview);
                self.pending.push(PendingTrigger {
                    step_index: index,
                    generation,
                    fires_at_ms: now_ms.saturating_add(config.preview_fallback_ms),
                });
                debug!("[Tracker] Preview step {} at {:.0}m", index, distance);
            }

            if distance <= config.trigger_radius_m {
                self.pending
                    .retain(|t| !(t.step_index == index && t.generation == generation));
                step.mark_triggered();
                update.alerts.extend(step.turn.alert());
                self.active_step_index += 1;
                info!("[Tracker] Step {} triggered at {:.0}m ({:?})", index, distance, step.turn);
            }
        }

        update.next_turn = Some(next_turn_text(route, self.active_step_index, position));
    }

    // ------------------------------------------------------------------------
    // Fallback timers
    // ------------------------------------------------------------------------

    /// Fire every fallback timer due at `now_ms`. Stale timers are discarded.
    pub fn poll_timers(&mut self, now_ms: u64) -> TrackingUpdate {
        let mut update = TrackingUpdate::new(self.state);
        if self.pending.is_empty() {
            return update;
        }

        let (mut due, waiting): (Vec<PendingTrigger>, Vec<PendingTrigger>) =
            std::mem::take(&mut self.pending)
                .into_iter()
                .partition(|t| t.fires_at_ms <= now_ms);
        self.pending = waiting;
        due.sort_by_key(|t| t.fires_at_ms);

        let mut fired = false;
        for timer in due {
            fired |= self.fire_timer(timer, &mut update);
        }

        if fired {
            if let (Some(route), Some(position)) = (&self.route, self.current_position) {
                update.next_turn = Some(next_turn_text(route, self.active_step_index, position));
            }
        }
        update
    }

    fn fire_timer(&mut self, timer: PendingTrigger, update: &mut TrackingUpdate) -> bool {
        if self.state != EngineState::Tracking
            || timer.generation != self.generation
            || timer.step_index != self.active_step_index
        {
            debug!("[Tracker] Dropping stale timer for step {}", timer.step_index);
            return false;
        }

        let Some(step) = self.route.as_mut().and_then(|r| r.step_mut(timer.step_index)) else {
            return false;
        };
        if step.is_triggered() {
            return false;
        }

        step.mark_triggered();
        update.alerts.extend(step.turn.alert());
        info!("[Tracker] Step {} triggered by fallback timer ({:?})", timer.step_index, step.turn);
        self.active_step_index += 1;
        true
    }

    /// Earliest time at which [`poll_timers`](Self::poll_timers) has work to do.
    pub fn next_timer_deadline(&self) -> Option<u64> {
        self.pending.iter().map(|t| t.fires_at_ms).min()
    }

    // ------------------------------------------------------------------------
    // Reroute and external signals
    // ------------------------------------------------------------------------

    /// Reconcile the outcome of a reroute fetch requested by [`update`](Self::update).
    ///
    /// A new route replaces the old one wholesale (keeping the session's
    /// destination); a failure leaves the old route in charge. Results whose
    /// `attempt` is not the outstanding request are ignored.
    pub fn complete_reroute(&mut self, attempt: u64, result: Result<Route, NavError>) -> TrackingUpdate {
        let update = TrackingUpdate::new(self.state);

        if self.awaiting_attempt != Some(attempt) {
            warn!(
                "[Tracker] Ignoring result for reroute #{} (awaiting {:?})",
                attempt, self.awaiting_attempt
            );
            return update;
        }
        self.awaiting_attempt = None;

        if self.state != EngineState::Tracking {
            debug!("[Tracker] Discarding reroute result after session ended");
            self.reroute.complete(false);
            return update;
        }

        match result {
            Ok(route) => {
                self.reroute.complete(true);
                let route = match &self.route {
                    Some(current) => route.with_destination(current.destination()),
                    None => route,
                };
                let status = format!("route ready ({:.0} m)", route.distance_m());
                let next_turn = initial_next_turn(&route);
                self.install_route(route);

                let mut update = update.with_status(status);
                update.next_turn = next_turn;
                update
            }
            Err(err) => {
                warn!("[Tracker] {}", err);
                self.reroute.complete(false);
                update.with_status("reroute failed")
            }
        }
    }

    /// The position source reported an error. Tracking state is unchanged.
    pub fn on_position_error(&mut self, message: &str) -> TrackingUpdate {
        let mut update = TrackingUpdate::new(self.state);
        if self.state == EngineState::Tracking {
            warn!("[Tracker] Position error: {}", message);
            update.alerts.push(AlertKind::GpsLost);
            update.status = Some(format!("watch error: {message}"));
        }
        update
    }

    /// Network reachability changed while tracking.
    pub fn on_connectivity_change(&mut self, online: bool) -> TrackingUpdate {
        let mut update = TrackingUpdate::new(self.state);
        if self.state != EngineState::Tracking {
            return update;
        }
        if online {
            update.status = Some("network restored".to_string());
        } else {
            update.alerts.push(AlertKind::Disconnected);
            update.status = Some("disconnected: network offline".to_string());
        }
        update
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn active_step_index(&self) -> usize {
        self.active_step_index
    }

    pub fn current_position(&self) -> Option<GpsPoint> {
        self.current_position
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_reroute_in_flight(&self) -> bool {
        self.reroute.is_in_flight()
    }

    pub fn pending_timers(&self) -> &[PendingTrigger] {
        &self.pending
    }

    fn install_route(&mut self, route: Route) {
        self.generation += 1;
        self.route = Some(route);
        self.active_step_index = 0;
        self.pending.clear();
    }
}

/// Run a single update and merge in timers that became due during it.
///
/// Convenience for hosts that poll rather than schedule wake-ups.
pub fn update_and_poll(
    engine: &mut TrackingEngine,
    sample: &PositionSample,
    now_ms: u64,
    online: bool,
) -> TrackingUpdate {
    let mut update = engine.update(sample, now_ms, online);
    update.merge(engine.poll_timers(now_ms));
    update
}

/// Strictly more than `interval_ms` since the last alert.
fn interval_elapsed(last_ms: Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
    match last_ms {
        Some(last) => now_ms.saturating_sub(last) > interval_ms,
        None => true,
    }
}

fn next_turn_text(route: &Route, active_step_index: usize, position: GpsPoint) -> String {
    match route.steps().get(active_step_index) {
        Some(step) => {
            let distance = haversine_distance(&position, &step.trigger_point);
            format!("{} in {}", step.instruction, format_meters(distance))
        }
        None => FINISHED_TEXT.to_string(),
    }
}

fn initial_next_turn(route: &Route) -> Option<String> {
    route.steps().first().map(|s| s.instruction.clone())
}

// ============================================================================
// Tests
// ============================================================================
