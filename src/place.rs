//! Destination search ranking.
//!
//! Place-search providers return candidates in their own relevance order.
//! For a walker the nearest match is almost always the intended one, so
//! candidates are re-ranked by straight-line distance from the current
//! position. Search is biased (not bounded) to a box around that position.

use crate::geo_utils::{format_meters, haversine_distance};
use crate::{Bounds, GpsPoint};

/// Maximum number of suggestions shown to the user.
pub const SUGGESTION_LIMIT: usize = 6;

/// Queries shorter than this (after trimming) are not sent to the provider.
pub const MIN_QUERY_LEN: usize = 2;

/// Half-width of the search bias box, in degrees.
pub const VIEWBOX_HALF_SPAN_DEG: f64 = 0.12;

/// A place-search result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PlaceCandidate {
    pub label: String,
    pub location: GpsPoint,
    /// Distance from the search origin; infinite when the origin is unknown
    pub distance_m: f64,
}

impl PlaceCandidate {
    pub fn new(label: impl Into<String>, location: GpsPoint) -> Self {
        Self {
            label: label.into(),
            location,
            distance_m: f64::INFINITY,
        }
    }

    /// "~350 m away", or "distance unavailable" without an origin.
    pub fn distance_label(&self) -> String {
        if self.distance_m.is_finite() {
            format!("~{} away", format_meters(self.distance_m))
        } else {
            "distance unavailable".to_string()
        }
    }
}

pub fn is_searchable_query(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_LEN
}

/// Fill in distances from `origin` and sort nearest first.
///
/// The sort is stable, so without an origin the provider's order is kept.
pub fn rank_by_distance(
    mut candidates: Vec<PlaceCandidate>,
    origin: Option<GpsPoint>,
) -> Vec<PlaceCandidate> {
    for candidate in &mut candidates {
        candidate.distance_m = match origin {
            Some(origin) => haversine_distance(&origin, &candidate.location),
            None => f64::INFINITY,
        };
    }
    candidates.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    candidates
}

/// The nearest [`SUGGESTION_LIMIT`] candidates.
pub fn top_suggestions(candidates: Vec<PlaceCandidate>, origin: Option<GpsPoint>) -> Vec<PlaceCandidate> {
    let mut ranked = rank_by_distance(candidates, origin);
    ranked.truncate(SUGGESTION_LIMIT);
    ranked
}

/// Search bias box as `left,top,right,bottom` (lon/lat), the order place-search
/// providers expect for a `viewbox` parameter.
pub fn viewbox_param(center: GpsPoint) -> String {
    let b = Bounds::around(center, VIEWBOX_HALF_SPAN_DEG);
    format!("{},{},{},{}", b.min_lng, b.max_lat, b.max_lng, b.min_lat)
}
