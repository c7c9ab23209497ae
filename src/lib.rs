//! # Route Guidance
//!
//! Pedestrian route tracking and turn advancement for mobile navigation.
//!
//! This library provides:
//! - A tracking engine that turns live GPS fixes into turn alerts, off-route
//!   warnings and reroute requests
//! - A route model normalized from OSRM-style provider responses
//! - Haptic and tone tables so every host renders alerts the same way
//! - Optional HTTP clients for walking routes and destination search
//!
//! ## Features
//!
//! - **`http`** - Enable OSRM/Nominatim provider clients
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_guidance::{
//!     AlertKind, GpsPoint, NavigationSession, PositionSample, PositionSource, Route, Step,
//!     StopReason, TrackingConfig, TurnKind,
//! };
//!
//! struct Gps;
//! impl PositionSource for Gps {
//!     fn is_available(&self) -> bool { true }
//! }
//!
//! let route = Route::new(
//!     vec![GpsPoint::new(51.5074, -0.1278), GpsPoint::new(51.5120, -0.1278)],
//!     vec![Step::new(TurnKind::Right, "turn on Strand (right)", GpsPoint::new(51.5100, -0.1278))],
//! ).unwrap();
//!
//! let mut session = NavigationSession::new(TrackingConfig::default(), Vec::<AlertKind>::new());
//! session.start_navigation(route, &Gps).unwrap();
//!
//! session.on_position_update(PositionSample::new(GpsPoint::new(51.5098, -0.1278), 1_000));
//! assert_eq!(session.dispatcher(), &vec![AlertKind::Preview, AlertKind::Right]);
//!
//! session.stop_navigation(StopReason::Manual);
//! assert_eq!(session.dispatcher().last(), Some(&AlertKind::Cancelled));
//! ```

pub mod error;
pub use error::NavError;

pub mod alert;
pub use alert::{AlertDispatcher, AlertKind, LogDispatcher, Tone};

pub mod geo_utils;

pub mod route;
pub use route::{build_route, RawRoute, Route, Step, TurnKind};

pub mod reroute;
pub use reroute::RerouteCoordinator;

// Tracking state machine
pub mod engine;
pub use engine::{
    EngineState, PendingTrigger, RerouteRequest, StopReason, TrackingConfig, TrackingEngine,
    TrackingUpdate,
};

pub mod session;
pub use session::{NavigationSession, PositionSource};

pub mod place;
pub use place::PlaceCandidate;

// HTTP providers for routes and place search
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{BlockingProviders, PlaceSearchClient, ProviderConfig, RouteClient};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RouteGuidanceRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use route_guidance::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Both coordinates are finite numbers. Out-of-range values still pass.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// A square box extending `half_span_deg` in each direction from `center`.
    pub fn around(center: GpsPoint, half_span_deg: f64) -> Self {
        Self {
            min_lat: center.latitude - half_span_deg,
            max_lat: center.latitude + half_span_deg,
            min_lng: center.longitude - half_span_deg,
            max_lng: center.longitude + half_span_deg,
        }
    }
}

/// One fix from the position source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PositionSample {
    pub point: GpsPoint,
    /// Milliseconds on the host's monotonic clock
    pub timestamp_ms: u64,
}

impl PositionSample {
    pub fn new(point: GpsPoint, timestamp_ms: u64) -> Self {
        Self { point, timestamp_ms }
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::info;
    use std::sync::{Arc, Mutex, MutexGuard};

    // ========================================================================
    // Alert Callback Interface
    // ========================================================================

    /// Receives alerts as the engine produces them.
    /// Implement this in Kotlin/Swift to vibrate, beep and speak.
    #[uniffi::export(callback_interface)]
    pub trait AlertListener: Send + Sync {
        fn on_alert(&self, alert: AlertKind);
    }

    /// The host owns the platform location API and reports whether it has one.
    struct HostPositionSource {
        available: bool,
    }

    impl PositionSource for HostPositionSource {
        fn is_available(&self) -> bool {
            self.available
        }

        fn name(&self) -> &str {
            "host location service"
        }
    }

    // ========================================================================
    // Route Records
    // ========================================================================

    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiStep {
        pub turn: TurnKind,
        pub instruction: String,
        pub trigger_point: GpsPoint,
        pub previewed: bool,
        pub triggered: bool,
    }

    /// A route as plain data. Progress flags are informational; a route
    /// passed back in always starts fresh.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiRoute {
        pub polyline: Vec<GpsPoint>,
        pub steps: Vec<FfiStep>,
        pub distance_m: f64,
        pub destination: GpsPoint,
    }

    impl From<&Route> for FfiRoute {
        fn from(route: &Route) -> Self {
            Self {
                polyline: route.polyline().to_vec(),
                steps: route
                    .steps()
                    .iter()
                    .map(|s| FfiStep {
                        turn: s.turn,
                        instruction: s.instruction.clone(),
                        trigger_point: s.trigger_point,
                        previewed: s.is_previewed(),
                        triggered: s.is_triggered(),
                    })
                    .collect(),
                distance_m: route.distance_m(),
                destination: route.destination(),
            }
        }
    }

    impl TryFrom<FfiRoute> for Route {
        type Error = NavError;

        fn try_from(route: FfiRoute) -> Result<Self, NavError> {
            let steps = route
                .steps
                .into_iter()
                .map(|s| Step::new(s.turn, s.instruction, s.trigger_point))
                .collect();
            Ok(Route::new(route.polyline, steps)?.with_destination(route.destination))
        }
    }

    // ========================================================================
    // Navigator
    // ========================================================================

    /// Thread-safe navigation session. Every call takes the same lock, so
    /// GPS callbacks, timers and UI actions never interleave.
    ///
    /// Alerts are buffered under the lock and handed to the listener after it
    /// is released, so `on_alert` may call straight back into the navigator.
    #[derive(uniffi::Object)]
    pub struct FfiNavigator {
        session: Mutex<NavigationSession<Vec<AlertKind>>>,
        listener: Box<dyn AlertListener>,
    }

    impl FfiNavigator {
        fn session(&self) -> MutexGuard<'_, NavigationSession<Vec<AlertKind>>> {
            self.session.lock().unwrap_or_else(|e| e.into_inner())
        }

        /// Run `f` under the lock, then deliver the alerts it produced.
        fn with_session<T>(&self, f: impl FnOnce(&mut NavigationSession<Vec<AlertKind>>) -> T) -> T {
            let (out, alerts) = {
                let mut session = self.session();
                let out = f(&mut *session);
                (out, std::mem::take(session.dispatcher_mut()))
            };
            for alert in alerts {
                LogDispatcher.dispatch(alert);
                self.listener.on_alert(alert);
            }
            out
        }
    }

    #[uniffi::export]
    impl FfiNavigator {
        #[uniffi::constructor]
        pub fn new(config: TrackingConfig, listener: Box<dyn AlertListener>) -> Arc<Self> {
            init_logging();
            info!("[RouteGuidanceRust] FfiNavigator created");
            Arc::new(Self {
                session: Mutex::new(NavigationSession::new(config, Vec::new())),
                listener,
            })
        }

        pub fn start_navigation(&self, route: FfiRoute, location_available: bool) -> Result<(), NavError> {
            let route = Route::try_from(route)?;
            let source = HostPositionSource { available: location_available };
            self.with_session(|s| s.start_navigation(route, &source))
        }

        pub fn stop_navigation(&self, reason: StopReason) {
            self.with_session(|s| s.stop_navigation(reason));
        }

        pub fn on_position_update(&self, sample: PositionSample) -> Option<RerouteRequest> {
            self.with_session(|s| s.on_position_update(sample))
        }

        pub fn on_position_error(&self, message: String) {
            self.with_session(|s| s.on_position_error(&message));
        }

        pub fn on_connectivity_change(&self, online: bool) {
            self.with_session(|s| s.on_connectivity_change(online));
        }

        pub fn poll_timers(&self, now_ms: u64) {
            self.with_session(|s| s.poll_timers(now_ms));
        }

        pub fn next_timer_deadline(&self) -> Option<u64> {
            self.session().next_timer_deadline()
        }

        /// Hand back the route fetched for the [`RerouteRequest`] numbered `attempt`.
        pub fn complete_reroute(&self, attempt: u64, route: FfiRoute) {
            let result = Route::try_from(route);
            self.with_session(|s| s.complete_reroute(attempt, result));
        }

        /// Report that the fetch for the [`RerouteRequest`] numbered `attempt` failed.
        pub fn fail_reroute(&self, attempt: u64, message: String) {
            self.with_session(|s| s.complete_reroute(attempt, Err(NavError::RerouteFailed(message))));
        }

        pub fn status(&self) -> Option<String> {
            self.session().status().map(str::to_string)
        }

        pub fn next_turn(&self) -> Option<String> {
            self.session().next_turn().map(str::to_string)
        }

        pub fn state(&self) -> EngineState {
            self.session().state()
        }

        pub fn active_step_index(&self) -> u32 {
            self.session().engine().active_step_index() as u32
        }

        pub fn current_route(&self) -> Option<FfiRoute> {
            self.session().engine().route().map(FfiRoute::from)
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    #[uniffi::export]
    pub fn default_tracking_config() -> TrackingConfig {
        TrackingConfig::default()
    }

    /// Vibration pattern in ms, alternating on/off.
    #[uniffi::export]
    pub fn alert_haptic_pattern(alert: AlertKind) -> Vec<u32> {
        alert.haptic_pattern().to_vec()
    }

    /// Tone schedule flattened to [offset_s, duration_s, frequency_hz, ...].
    #[uniffi::export]
    pub fn alert_tone_schedule(alert: AlertKind) -> Vec<f32> {
        alert
            .tone_schedule()
            .iter()
            .flat_map(|t| [t.offset_s, t.duration_s, t.frequency_hz])
            .collect()
    }

    #[uniffi::export]
    pub fn format_distance(meters: f64) -> String {
        geo_utils::format_meters(meters)
    }

    #[uniffi::export]
    pub fn ffi_rank_places(candidates: Vec<PlaceCandidate>, origin: Option<GpsPoint>) -> Vec<PlaceCandidate> {
        place::top_suggestions(candidates, origin)
    }

    // ========================================================================
    // Providers
    // ========================================================================

    /// Build a route from a raw OSRM `route` response body.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn route_from_osrm_json(json: String) -> Result<FfiRoute, NavError> {
        crate::http::parse_route_response(json.as_bytes()).map(|r| FfiRoute::from(&r))
    }

    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn default_provider_config() -> ProviderConfig {
        ProviderConfig::default()
    }

    /// Blocking route and place lookups for hosts that call from a worker thread.
    #[cfg(feature = "http")]
    #[derive(uniffi::Object)]
    pub struct FfiProviders {
        inner: BlockingProviders,
    }

    #[cfg(feature = "http")]
    #[uniffi::export]
    impl FfiProviders {
        #[uniffi::constructor]
        pub fn new(config: ProviderConfig) -> Result<Arc<Self>, NavError> {
            init_logging();
            info!("[RouteGuidanceRust] FfiProviders created for {}", config.route_base_url);
            Ok(Arc::new(Self {
                inner: BlockingProviders::new(config)?,
            }))
        }

        pub fn fetch_route(&self, from: GpsPoint, to: GpsPoint) -> Result<FfiRoute, NavError> {
            self.inner.fetch_route(from, to).map(|r| FfiRoute::from(&r))
        }

        pub fn reroute(&self, request: RerouteRequest) -> Result<FfiRoute, NavError> {
            self.inner.reroute(&request).map(|r| FfiRoute::from(&r))
        }

        pub fn search_places(&self, query: String, origin: Option<GpsPoint>) -> Result<Vec<PlaceCandidate>, NavError> {
            self.inner.search(&query, origin)
        }

        pub fn geocode(&self, query: String, origin: Option<GpsPoint>) -> Result<PlaceCandidate, NavError> {
            self.inner.geocode(&query, origin)
        }
    }

}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_gps_point_finiteness() {
        assert!(GpsPoint::new(91.0, 0.0).is_finite());
        assert!(!GpsPoint::new(0.0, f64::INFINITY).is_finite());
        assert!(!GpsPoint::new(f64::NAN, f64::NAN).is_finite());
    }

    #[test]
    fn test_bounds_around() {
        let bounds = Bounds::around(GpsPoint::new(48.8566, 2.3522), 0.12);
        assert!((bounds.min_lat - 48.7366).abs() < 1e-9);
        assert!((bounds.max_lng - 2.4722).abs() < 1e-9);
        assert!((bounds.max_lat - bounds.min_lat - 0.24).abs() < 1e-9);
    }

    /// A whole walk driven from a provider-shaped route.
    #[test]
    fn test_walk_from_raw_route() {
        use route::{RawGeometry, RawLeg, RawManeuver, RawStep};

        struct Gps;
        impl PositionSource for Gps {
            fn is_available(&self) -> bool {
                true
            }
        }

        // 0.0 -> 0.006 north, then east to 0.003
        let raw = RawRoute {
            distance: None,
            geometry: RawGeometry {
                coordinates: vec![[0.0, 0.0], [0.0, 0.006], [0.003, 0.006]],
            },
            legs: vec![RawLeg {
                steps: vec![
                    RawStep {
                        name: Some("North Path".to_string()),
                        maneuver: RawManeuver {
                            kind: Some("depart".to_string()),
                            modifier: None,
                            location: [0.0, 0.0],
                        },
                    },
                    RawStep {
                        name: Some("East Lane".to_string()),
                        maneuver: RawManeuver {
                            kind: Some("turn".to_string()),
                            modifier: Some("right".to_string()),
                            location: [0.0, 0.006],
                        },
                    },
                ],
            }],
        };
        let route = build_route(&raw).unwrap();

        let mut session = NavigationSession::new(TrackingConfig::default(), Vec::<AlertKind>::new());
        session.start_navigation(route, &Gps).unwrap();
        assert_eq!(session.next_turn(), Some("depart on North Path (continue)"));

        let walk = [
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.003, 0.0),
            GpsPoint::new(0.0058, 0.0),
            GpsPoint::new(0.006, 0.0015),
            GpsPoint::new(0.006, 0.0029),
        ];
        for (i, point) in walk.iter().enumerate() {
            session.on_position_update(PositionSample::new(*point, i as u64 * 5_000));
        }

        // The depart step is "other": previewed and passed silently
        assert_eq!(
            session.dispatcher(),
            &vec![AlertKind::Preview, AlertKind::Preview, AlertKind::Right, AlertKind::Arrived]
        );
        assert_eq!(session.state(), EngineState::Arrived);
    }
}
