//! Session control surface.
//!
//! [`NavigationSession`] owns one [`TrackingEngine`] and one [`AlertDispatcher`]
//! and is what a host wires its position source and network monitor into.
//! Alerts are dispatched as they are produced; the latest status and next-turn
//! text are kept for display.

use log::{info, warn};

use crate::alert::AlertDispatcher;
use crate::engine::{
    EngineState, RerouteRequest, StopReason, TrackingConfig, TrackingEngine, TrackingUpdate,
};
use crate::error::NavError;
use crate::route::Route;
use crate::PositionSample;

/// A device or simulated feed that produces position samples.
pub trait PositionSource {
    /// Whether the source can deliver fixes at all on this device.
    fn is_available(&self) -> bool;

    /// Human-readable name for logs and errors.
    fn name(&self) -> &str {
        "position source"
    }
}

/// One navigation session: engine, dispatcher and the text a UI shows.
pub struct NavigationSession<D: AlertDispatcher> {
    engine: TrackingEngine,
    dispatcher: D,
    status: Option<String>,
    next_turn: Option<String>,
    online: bool,
}

impl<D: AlertDispatcher> NavigationSession<D> {
    pub fn new(config: TrackingConfig, dispatcher: D) -> Self {
        Self {
            engine: TrackingEngine::new(config),
            dispatcher,
            status: None,
            next_turn: None,
            online: true,
        }
    }

    /// Start guiding along `route` using fixes from `source`.
    ///
    /// Fails with [`NavError::SourceUnavailable`] if the source cannot deliver
    /// fixes; the session is left untouched in that case.
    pub fn start_navigation<S: PositionSource + ?Sized>(
        &mut self,
        route: Route,
        source: &S,
    ) -> Result<(), NavError> {
        if !source.is_available() {
            warn!("[Session] {} unavailable, not starting", source.name());
            return Err(NavError::SourceUnavailable(format!(
                "{} is not available",
                source.name()
            )));
        }

        info!("[Session] Starting navigation with {}", source.name());
        let update = self.engine.start(route);
        self.apply(update);
        Ok(())
    }

    pub fn stop_navigation(&mut self, reason: StopReason) {
        let update = self.engine.stop(reason);
        self.apply(update);
    }

    /// Feed a position fix. The sample's timestamp is the session clock.
    ///
    /// Returns a reroute request when the host should fetch a new route and
    /// report back through [`complete_reroute`](Self::complete_reroute).
    pub fn on_position_update(&mut self, sample: PositionSample) -> Option<RerouteRequest> {
        let update = self.engine.update(&sample, sample.timestamp_ms, self.online);
        self.apply(update)
    }

    pub fn on_position_error(&mut self, message: &str) {
        let update = self.engine.on_position_error(message);
        self.apply(update);
    }

    pub fn on_connectivity_change(&mut self, online: bool) {
        self.online = online;
        let update = self.engine.on_connectivity_change(online);
        self.apply(update);
    }

    /// Fire fallback timers that are due at `now_ms`.
    pub fn poll_timers(&mut self, now_ms: u64) {
        let update = self.engine.poll_timers(now_ms);
        self.apply(update);
    }

    /// Report the outcome of the fetch for the request numbered `attempt`.
    pub fn complete_reroute(&mut self, attempt: u64, result: Result<Route, NavError>) {
        let update = self.engine.complete_reroute(attempt, result);
        self.apply(update);
    }

    fn apply(&mut self, update: TrackingUpdate) -> Option<RerouteRequest> {
        for alert in &update.alerts {
            self.dispatcher.dispatch(*alert);
        }
        if let Some(status) = update.status {
            self.status = Some(status);
        }
        if let Some(next_turn) = update.next_turn {
            self.next_turn = Some(next_turn);
        }
        update.reroute
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn next_turn(&self) -> Option<&str> {
        self.next_turn.as_deref()
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn next_timer_deadline(&self) -> Option<u64> {
        self.engine.next_timer_deadline()
    }

    pub fn engine(&self) -> &TrackingEngine {
        &self.engine
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }
}

impl<D: AlertDispatcher + Default> Default for NavigationSession<D> {
    fn default() -> Self {
        Self::new(TrackingConfig::default(), D::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;
    use crate::route::{Step, TurnKind};
    use crate::GpsPoint;

    const M_PER_DEG: f64 = 111_194.926_6;

    struct FakeSource(bool);

    impl PositionSource for FakeSource {
        fn is_available(&self) -> bool {
            self.0
        }

        fn name(&self) -> &str {
            "fake gps"
        }
    }

    fn north(m: f64) -> GpsPoint {
        GpsPoint::new(m / M_PER_DEG, 0.0)
    }

    fn route() -> Route {
        Route::new(
            vec![north(0.0), north(800.0)],
            vec![Step::new(TurnKind::Right, "turn on Mill Rd (right)", north(400.0))],
        )
        .unwrap()
    }

    fn session() -> NavigationSession<Vec<AlertKind>> {
        let mut session = NavigationSession::default();
        session.start_navigation(route(), &FakeSource(true)).unwrap();
        session
    }

    #[test]
    fn test_unavailable_source_refuses_to_start() {
        let mut session: NavigationSession<Vec<AlertKind>> = NavigationSession::default();
        let err = session.start_navigation(route(), &FakeSource(false)).unwrap_err();
        assert!(matches!(err, NavError::SourceUnavailable(ref msg) if msg.contains("fake gps")));
        assert_eq!(session.state(), EngineState::Idle);
        assert!(session.status().is_none());
    }

    #[test]
    fn test_start_sets_texts() {
        let session = session();
        assert_eq!(session.state(), EngineState::Tracking);
        assert_eq!(session.status(), Some("navigation running"));
        assert_eq!(session.next_turn(), Some("turn on Mill Rd (right)"));
    }

    #[test]
    fn test_alerts_reach_dispatcher_in_order() {
        let mut session = session();
        assert!(session.on_position_update(PositionSample::new(north(300.0), 0)).is_none());
        assert!(session.on_position_update(PositionSample::new(north(380.0), 1_000)).is_none());
        assert_eq!(session.dispatcher(), &vec![AlertKind::Preview, AlertKind::Right]);
        assert_eq!(session.next_turn(), Some("continue to destination"));

        session.on_position_update(PositionSample::new(north(790.0), 2_000));
        assert_eq!(session.dispatcher().last(), Some(&AlertKind::Arrived));
        assert_eq!(session.status(), Some("arrived"));
        assert_eq!(session.next_turn(), Some("done"));
    }

    #[test]
    fn test_timer_fires_through_poll() {
        let mut session = session();
        session.on_position_update(PositionSample::new(north(300.0), 0));
        assert_eq!(session.next_timer_deadline(), Some(10_000));

        session.poll_timers(10_000);
        assert_eq!(session.dispatcher(), &vec![AlertKind::Preview, AlertKind::Right]);
    }

    #[test]
    fn test_reroute_round_trip() {
        let mut session = session();
        let off_route = GpsPoint::new(100.0 / M_PER_DEG, 0.001);

        let request = session.on_position_update(PositionSample::new(off_route, 0));
        let request = request.expect("reroute requested");
        assert_eq!(request.from, off_route);
        assert_eq!(request.to, north(800.0));
        assert_eq!(session.status(), Some("building route..."));

        // A result for some other attempt changes nothing
        session.complete_reroute(request.attempt + 1, Ok(route()));
        assert_eq!(session.status(), Some("building route..."));

        session.complete_reroute(request.attempt, Ok(route()));
        assert!(session.status().unwrap().starts_with("route ready"));
        assert!(!session.engine().is_reroute_in_flight());
    }

    #[test]
    fn test_offline_session_never_requests_reroute() {
        let mut session = session();
        session.on_connectivity_change(false);
        assert_eq!(session.status(), Some("disconnected: network offline"));

        let off_route = GpsPoint::new(100.0 / M_PER_DEG, 0.001);
        assert!(session.on_position_update(PositionSample::new(off_route, 0)).is_none());
        assert_eq!(session.dispatcher(), &vec![AlertKind::Disconnected, AlertKind::OffRoute]);

        session.on_connectivity_change(true);
        assert_eq!(session.status(), Some("network restored"));
        assert!(session.is_online());
    }

    #[test]
    fn test_manual_stop_cancels() {
        let mut session = session();
        session.on_position_update(PositionSample::new(north(300.0), 0));
        session.stop_navigation(StopReason::Manual);

        assert_eq!(session.state(), EngineState::Stopped);
        assert_eq!(session.status(), Some("navigation stopped"));
        assert_eq!(session.dispatcher().last(), Some(&AlertKind::Cancelled));

        let before = session.dispatcher().len();
        session.poll_timers(60_000);
        session.on_position_error("signal lost");
        assert_eq!(session.dispatcher().len(), before);
    }

    #[test]
    fn test_position_error_dispatches_gps_lost() {
        let mut session = session();
        session.on_position_error("permission denied");
        assert_eq!(session.dispatcher(), &vec![AlertKind::GpsLost]);
        assert_eq!(session.status(), Some("watch error: permission denied"));
    }
}
