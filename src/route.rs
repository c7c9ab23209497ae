//! Route model: normalizes a provider response into steps plus a polyline.
//!
//! The raw types mirror the OSRM route object (`geometries=geojson`,
//! `steps=true`). Coordinates in the raw types are `[lon, lat]` as GeoJSON
//! dictates; everything past [`Route::from_raw`] uses [`GpsPoint`].

use crate::alert::AlertKind;
use crate::error::NavError;
use crate::geo_utils::polyline_length;
use crate::GpsPoint;

#[cfg(feature = "http")]
use serde::Deserialize;

// ============================================================================
// Raw Provider Types
// ============================================================================

/// A single route as returned by the route provider.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "http", derive(Deserialize), serde(default))]
pub struct RawRoute {
    /// Provider-computed length in meters
    pub distance: Option<f64>,
    pub geometry: RawGeometry,
    pub legs: Vec<RawLeg>,
}

/// GeoJSON LineString geometry.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "http", derive(Deserialize), serde(default))]
pub struct RawGeometry {
    /// `[lon, lat]` pairs
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "http", derive(Deserialize), serde(default))]
pub struct RawLeg {
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "http", derive(Deserialize))]
pub struct RawStep {
    /// Road name; empty or missing for unnamed paths
    pub name: Option<String>,
    pub maneuver: RawManeuver,
}

/// `location` is required: a maneuver without one cannot be triggered.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "http", derive(Deserialize))]
pub struct RawManeuver {
    /// Maneuver type ("turn", "depart", "arrive", ...)
    #[cfg_attr(feature = "http", serde(rename = "type"))]
    pub kind: Option<String>,
    /// Direction modifier ("left", "slight right", "uturn", ...)
    pub modifier: Option<String>,
    /// `[lon, lat]`
    pub location: [f64; 2],
}

// ============================================================================
// Normalized Route
// ============================================================================

/// Direction class of a maneuver, used to pick the turn alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TurnKind {
    Left,
    Right,
    Uturn,
    Other,
}

impl TurnKind {
    /// Classify a maneuver by case-insensitive substring match.
    ///
    /// "uturn" in either field wins, then "left", then "right" in the modifier.
    ///
    /// ```rust
    /// use route_guidance::TurnKind;
    ///
    /// assert_eq!(TurnKind::classify("turn", "Sharp Left"), TurnKind::Left);
    /// assert_eq!(TurnKind::classify("continue", "uturn"), TurnKind::Uturn);
    /// assert_eq!(TurnKind::classify("depart", ""), TurnKind::Other);
    /// ```
    pub fn classify(kind: &str, modifier: &str) -> Self {
        let kind = kind.to_lowercase();
        let modifier = modifier.to_lowercase();

        if modifier.contains("uturn") || kind.contains("uturn") {
            TurnKind::Uturn
        } else if modifier.contains("left") {
            TurnKind::Left
        } else if modifier.contains("right") {
            TurnKind::Right
        } else {
            TurnKind::Other
        }
    }

    /// The alert to fire when this turn is reached. `Other` has none.
    pub fn alert(&self) -> Option<AlertKind> {
        match self {
            TurnKind::Left => Some(AlertKind::Left),
            TurnKind::Right => Some(AlertKind::Right),
            TurnKind::Uturn => Some(AlertKind::Uturn),
            TurnKind::Other => None,
        }
    }
}

/// One maneuver along the route.
///
/// `previewed` and `triggered` only ever go from false to true, and only the
/// tracking engine sets them.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub turn: TurnKind,
    pub instruction: String,
    /// Where the maneuver happens
    pub trigger_point: GpsPoint,
    previewed: bool,
    triggered: bool,
}

impl Step {
    pub fn new(turn: TurnKind, instruction: impl Into<String>, trigger_point: GpsPoint) -> Self {
        Self {
            turn,
            instruction: instruction.into(),
            trigger_point,
            previewed: false,
            triggered: false,
        }
    }

    pub fn is_previewed(&self) -> bool {
        self.previewed
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub(crate) fn mark_previewed(&mut self) {
        self.previewed = true;
    }

    pub(crate) fn mark_triggered(&mut self) {
        self.triggered = true;
    }
}

/// A walkable route: polyline, steps, length and arrival target.
#[derive(Debug, Clone)]
pub struct Route {
    polyline: Vec<GpsPoint>,
    steps: Vec<Step>,
    distance_m: f64,
    destination: GpsPoint,
}

impl Route {
    /// Build a route from an already-normalized polyline and steps.
    ///
    /// Invalid points are dropped from the polyline. Fails with
    /// [`NavError::RouteEmpty`] if fewer than two points remain, there are no
    /// steps, or any step's trigger point is not a valid coordinate.
    /// The destination defaults to the last polyline point.
    pub fn new(polyline: Vec<GpsPoint>, steps: Vec<Step>) -> Result<Self, NavError> {
        let polyline: Vec<GpsPoint> = polyline.into_iter().filter(|p| p.is_valid()).collect();

        if polyline.len() < 2 {
            return Err(NavError::RouteEmpty(
                "route geometry has fewer than two points".to_string(),
            ));
        }
        if steps.is_empty() {
            return Err(NavError::RouteEmpty("route has no steps".to_string()));
        }
        if let Some(index) = steps.iter().position(|s| !s.trigger_point.is_valid()) {
            return Err(NavError::RouteEmpty(format!(
                "step {} has no usable location",
                index
            )));
        }

        let distance_m = polyline_length(&polyline);
        let destination = polyline[polyline.len() - 1];

        Ok(Self { polyline, steps, distance_m, destination })
    }

    /// Flatten a provider route into a [`Route`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use route_guidance::{Route, TurnKind};
    /// use route_guidance::route::{RawGeometry, RawLeg, RawManeuver, RawRoute, RawStep};
    ///
    /// let raw = RawRoute {
    ///     distance: Some(120.0),
    ///     geometry: RawGeometry { coordinates: vec![[-0.1278, 51.5074], [-0.1278, 51.5085]] },
    ///     legs: vec![RawLeg {
    ///         steps: vec![RawStep {
    ///             name: Some("Whitehall".to_string()),
    ///             maneuver: RawManeuver {
    ///                 kind: Some("turn".to_string()),
    ///                 modifier: Some("left".to_string()),
    ///                 location: [-0.1278, 51.5080],
    ///             },
    ///         }],
    ///     }],
    /// };
    ///
    /// let route = Route::from_raw(&raw).unwrap();
    /// assert_eq!(route.steps()[0].turn, TurnKind::Left);
    /// assert_eq!(route.steps()[0].instruction, "turn on Whitehall (left)");
    /// ```
    pub fn from_raw(raw: &RawRoute) -> Result<Self, NavError> {
        if raw.legs.is_empty() {
            return Err(NavError::RouteEmpty("route has no legs".to_string()));
        }

        let steps: Vec<Step> = raw
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(normalize_step)
            .collect();

        let polyline: Vec<GpsPoint> = raw
            .geometry
            .coordinates
            .iter()
            .map(|[lon, lat]| GpsPoint::new(*lat, *lon))
            .collect();

        let mut route = Self::new(polyline, steps)?;

        if let Some(distance) = raw.distance.filter(|d| d.is_finite() && *d > 0.0) {
            route.distance_m = distance;
        }

        Ok(route)
    }

    /// Use the user's chosen destination as the arrival target instead of the
    /// end of the polyline.
    pub fn with_destination(mut self, destination: GpsPoint) -> Self {
        if destination.is_valid() {
            self.destination = destination;
        }
        self
    }

    pub fn polyline(&self) -> &[GpsPoint] {
        &self.polyline
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Route length in meters.
    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn destination(&self) -> GpsPoint {
        self.destination
    }

    pub(crate) fn step_mut(&mut self, index: usize) -> Option<&mut Step> {
        self.steps.get_mut(index)
    }
}

/// Convenience wrapper around [`Route::from_raw`].
pub fn build_route(raw: &RawRoute) -> Result<Route, NavError> {
    Route::from_raw(raw)
}

fn normalize_step(raw: &RawStep) -> Step {
    let kind = raw.maneuver.kind.as_deref().unwrap_or("").to_lowercase();
    let modifier = raw.maneuver.modifier.as_deref().unwrap_or("").to_lowercase();
    let [lon, lat] = raw.maneuver.location;

    Step::new(
        TurnKind::classify(&kind, &modifier),
        compose_instruction(&kind, raw.name.as_deref(), &modifier),
        GpsPoint::new(lat, lon),
    )
}

/// "turn on Main Street (left)", or "turn (left)" for unnamed paths.
fn compose_instruction(kind: &str, name: Option<&str>, modifier: &str) -> String {
    let kind = if kind.is_empty() { "continue" } else { kind };
    let modifier = if modifier.is_empty() { "continue" } else { modifier };

    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{kind} on {name} ({modifier})"),
        None => format!("{kind} ({modifier})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_step(kind: &str, modifier: Option<&str>, name: Option<&str>, lon: f64, lat: f64) -> RawStep {
        RawStep {
            name: name.map(String::from),
            maneuver: RawManeuver {
                kind: Some(kind.to_string()),
                modifier: modifier.map(String::from),
                location: [lon, lat],
            },
        }
    }

    fn raw_route(legs: Vec<RawLeg>) -> RawRoute {
        RawRoute {
            distance: Some(1234.0),
            geometry: RawGeometry {
                coordinates: vec![[-122.4194, 37.7749], [-122.4194, 37.7760], [-122.4180, 37.7760]],
            },
            legs,
        }
    }

    #[test]
    fn test_classify_turns() {
        assert_eq!(TurnKind::classify("turn", "left"), TurnKind::Left);
        assert_eq!(TurnKind::classify("turn", "slight right"), TurnKind::Right);
        assert_eq!(TurnKind::classify("turn", "UTURN"), TurnKind::Uturn);
        assert_eq!(TurnKind::classify("uturn", "left"), TurnKind::Uturn);
        assert_eq!(TurnKind::classify("depart", "straight"), TurnKind::Other);
        assert_eq!(TurnKind::classify("", ""), TurnKind::Other);
    }

    #[test]
    fn test_turn_alerts() {
        assert_eq!(TurnKind::Left.alert(), Some(AlertKind::Left));
        assert_eq!(TurnKind::Right.alert(), Some(AlertKind::Right));
        assert_eq!(TurnKind::Uturn.alert(), Some(AlertKind::Uturn));
        assert_eq!(TurnKind::Other.alert(), None);
    }

    #[test]
    fn test_compose_instruction() {
        assert_eq!(compose_instruction("turn", Some("Market St"), "right"), "turn on Market St (right)");
        assert_eq!(compose_instruction("depart", None, ""), "depart (continue)");
        assert_eq!(compose_instruction("turn", Some("  "), "left"), "turn (left)");
        assert_eq!(compose_instruction("", None, ""), "continue (continue)");
    }

    #[test]
    fn test_from_raw_flattens_legs_in_order() {
        let raw = raw_route(vec![
            RawLeg {
                steps: vec![
                    raw_step("depart", None, Some("Market St"), -122.4194, 37.7749),
                    raw_step("turn", Some("Left"), Some("5th St"), -122.4194, 37.7760),
                ],
            },
            RawLeg {
                steps: vec![raw_step("arrive", None, None, -122.4180, 37.7760)],
            },
        ]);

        let route = Route::from_raw(&raw).unwrap();
        assert_eq!(route.step_count(), 3);
        assert_eq!(route.steps()[0].turn, TurnKind::Other);
        assert_eq!(route.steps()[1].turn, TurnKind::Left);
        assert_eq!(route.steps()[1].instruction, "turn on 5th St (left)");
        assert_eq!(route.steps()[2].instruction, "arrive (continue)");
        assert_eq!(route.steps()[1].trigger_point, GpsPoint::new(37.7760, -122.4194));
        assert_eq!(route.polyline().len(), 3);
        assert_eq!(route.polyline()[0], GpsPoint::new(37.7749, -122.4194));
        assert_eq!(route.distance_m(), 1234.0);
        assert_eq!(route.destination(), GpsPoint::new(37.7760, -122.4180));
        assert!(route.steps().iter().all(|s| !s.is_previewed() && !s.is_triggered()));
    }

    #[test]
    fn test_from_raw_zero_legs() {
        let raw = raw_route(vec![]);
        assert!(matches!(Route::from_raw(&raw), Err(NavError::RouteEmpty(_))));
    }

    #[test]
    fn test_from_raw_zero_steps() {
        let raw = raw_route(vec![RawLeg { steps: vec![] }, RawLeg::default()]);
        assert!(matches!(build_route(&raw), Err(NavError::RouteEmpty(_))));
    }

    #[test]
    fn test_from_raw_short_geometry() {
        let mut raw = raw_route(vec![RawLeg {
            steps: vec![raw_step("depart", None, None, -122.4194, 37.7749)],
        }]);
        raw.geometry.coordinates.truncate(1);
        assert!(matches!(Route::from_raw(&raw), Err(NavError::RouteEmpty(_))));
    }

    #[test]
    fn test_missing_distance_falls_back_to_polyline_length() {
        let mut raw = raw_route(vec![RawLeg {
            steps: vec![raw_step("depart", None, None, -122.4194, 37.7749)],
        }]);
        raw.distance = None;
        let route = Route::from_raw(&raw).unwrap();
        let expected = polyline_length(route.polyline());
        assert!((route.distance_m() - expected).abs() < 1e-9);
        assert!(route.distance_m() > 100.0);
    }

    #[test]
    fn test_with_destination() {
        let route = Route::new(
            vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.001, 0.0)],
            vec![Step::new(TurnKind::Other, "go", GpsPoint::new(0.0005, 0.0))],
        )
        .unwrap();

        let dest = GpsPoint::new(0.0011, 0.0001);
        assert_eq!(route.clone().with_destination(dest).destination(), dest);
        // Invalid destinations are ignored
        let kept = route.with_destination(GpsPoint::new(f64::NAN, 0.0));
        assert_eq!(kept.destination(), GpsPoint::new(0.001, 0.0));
    }

    #[test]
    fn test_new_rejects_invalid_trigger_point() {
        let polyline = vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.01, 0.0)];
        let result = Route::new(
            polyline.clone(),
            vec![
                Step::new(TurnKind::Left, "turn (left)", GpsPoint::new(f64::NAN, 0.0)),
                Step::new(TurnKind::Right, "turn (right)", GpsPoint::new(0.0045, 0.0)),
            ],
        );
        assert!(matches!(result, Err(NavError::RouteEmpty(ref msg)) if msg.contains("step 0")));

        let result = Route::new(
            polyline,
            vec![
                Step::new(TurnKind::Left, "turn (left)", GpsPoint::new(0.002, 0.0)),
                Step::new(TurnKind::Right, "turn (right)", GpsPoint::new(95.0, 0.0)),
            ],
        );
        assert!(matches!(result, Err(NavError::RouteEmpty(ref msg)) if msg.contains("step 1")));
    }

    #[test]
    fn test_from_raw_rejects_non_finite_maneuver_location() {
        let raw = raw_route(vec![RawLeg {
            steps: vec![raw_step("turn", Some("left"), None, f64::INFINITY, 37.7760)],
        }]);
        assert!(matches!(Route::from_raw(&raw), Err(NavError::RouteEmpty(_))));
    }

    #[test]
    fn test_new_drops_invalid_points() {
        let result = Route::new(
            vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(f64::NAN, 0.0)],
            vec![Step::new(TurnKind::Other, "go", GpsPoint::new(0.0, 0.0))],
        );
        assert!(matches!(result, Err(NavError::RouteEmpty(_))));
    }
}
