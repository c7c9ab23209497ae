//! # Geographic Utilities
//!
//! Distance computations used by the tracking engine to decide whether a walker
//! has reached a turn, strayed from the route, or arrived.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`distance_to_segment`] | Distance from a point to one segment (local planar projection) |
//! | [`distance_to_polyline`] | Minimum distance from a point to a route polyline |
//! | [`polyline_length`] | Total length of a polyline in meters |
//! | [`format_meters`] | Human-readable distance ("85 m", "1.2 km") |
//!
//! ## Example
//!
//! ```rust
//! use route_guidance::{GpsPoint, geo_utils};
//!
//! let route = vec![
//!     GpsPoint::new(51.5074, -0.1278),
//!     GpsPoint::new(51.5084, -0.1278),
//! ];
//!
//! // Standing on the route
//! let d = geo_utils::distance_to_polyline(&GpsPoint::new(51.5079, -0.1278), &route);
//! assert!(d < 0.01);
//!
//! // Unknown position never matches anything
//! let unknown = GpsPoint::new(f64::NAN, 0.0);
//! assert!(geo_utils::haversine_distance(&unknown, &route[0]).is_infinite());
//! ```
//!
//! ## Infinity Sentinel
//!
//! Every distance function returns `f64::INFINITY` when an input is missing or
//! non-finite. Callers compare distances against thresholds, so an infinite
//! distance reads as "condition not met" and a bad GPS fix never advances a step.
//!
//! ## Planar Projection
//!
//! Point-to-segment distance projects both ends of the segment onto a flat plane
//! centred on the query point's latitude: latitude scales by a fixed
//! meters-per-degree, longitude by the same factor times `cos(latitude)`. The
//! error is negligible at city-block scale.

use geo::{Distance, Haversine, Point};
use crate::GpsPoint;

/// Meters per degree used by the local planar projection.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (spherical Earth,
/// mean radius). Returns `f64::INFINITY` if either point has a non-finite coordinate.
///
/// # Example
///
/// ```rust
/// use route_guidance::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    if !p1.is_finite() || !p2.is_finite() {
        return f64::INFINITY;
    }
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Distance in meters from `p` to the segment `a`-`b`.
///
/// The segment is projected onto a flat plane around `p`'s latitude and the
/// closest point is clamped to the segment, so a point beyond either end measures
/// to that endpoint rather than to the infinite line. A zero-length segment
/// reduces to point-to-point distance.
pub fn distance_to_segment(p: &GpsPoint, a: &GpsPoint, b: &GpsPoint) -> f64 {
    if !p.is_finite() || !a.is_finite() || !b.is_finite() {
        return f64::INFINITY;
    }

    let lat_scale = METERS_PER_DEGREE;
    let lon_scale = p.latitude.to_radians().cos() * METERS_PER_DEGREE;

    let (ax, ay) = (a.longitude * lon_scale, a.latitude * lat_scale);
    let (bx, by) = (b.longitude * lon_scale, b.latitude * lat_scale);
    let (px, py) = (p.longitude * lon_scale, p.latitude * lat_scale);

    let abx = bx - ax;
    let aby = by - ay;
    let len2 = abx * abx + aby * aby;

    let t = if len2 > 0.0 {
        (((px - ax) * abx + (py - ay) * aby) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let dx = px - (ax + t * abx);
    let dy = py - (ay + t * aby);
    (dx * dx + dy * dy).sqrt()
}

/// Minimum distance in meters from `point` to any segment of `polyline`.
///
/// Returns `f64::INFINITY` for an empty or single-point polyline (there is no
/// segment to measure against) and for a non-finite point.
///
/// # Example
///
/// ```rust
/// use route_guidance::{GpsPoint, geo_utils};
///
/// let route = vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.01, 0.0)];
///
/// // ~50m east of the route
/// let off = GpsPoint::new(0.005, 50.0 / geo_utils::METERS_PER_DEGREE);
/// let d = geo_utils::distance_to_polyline(&off, &route);
/// assert!((d - 50.0).abs() < 0.01);
///
/// assert!(geo_utils::distance_to_polyline(&off, &[]).is_infinite());
/// ```
pub fn distance_to_polyline(point: &GpsPoint, polyline: &[GpsPoint]) -> f64 {
    polyline
        .windows(2)
        .map(|w| distance_to_segment(point, &w[0], &w[1]))
        .fold(f64::INFINITY, f64::min)
}

/// Calculate the total length of a polyline in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// polylines return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Formatting
// =============================================================================

/// Format a distance for status text.
///
/// ```rust
/// use route_guidance::geo_utils::format_meters;
///
/// assert_eq!(format_meters(84.6), "85 m");
/// assert_eq!(format_meters(1240.0), "1.2 km");
/// assert_eq!(format_meters(f64::INFINITY), "n/a");
/// ```
pub fn format_meters(meters: f64) -> String {
    if !meters.is_finite() {
        return "n/a".to_string();
    }
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
