//! HTTP providers for walking routes and destination search.
//!
//! - [`RouteClient`] asks an OSRM server for a foot route with GeoJSON geometry
//!   and turn steps.
//! - [`PlaceSearchClient`] queries a Nominatim server, biased to a box around
//!   the walker, and ranks hits by distance.
//!
//! Both retry transport errors and HTTP 429 with exponential backoff. Place
//! search additionally spaces request starts (public Nominatim allows one
//! request per second).

use log::{debug, info, warn};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::engine::RerouteRequest;
use crate::error::NavError;
use crate::place::{is_searchable_query, rank_by_distance, top_suggestions, viewbox_param, PlaceCandidate};
use crate::route::{RawRoute, Route};
use crate::GpsPoint;

// ============================================================================
// Configuration
// ============================================================================

/// Endpoints and transport settings for the route and place providers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ProviderConfig {
    /// OSRM server root.
    /// Default: "https://router.project-osrm.org"
    pub route_base_url: String,

    /// Nominatim server root.
    /// Default: "https://nominatim.openstreetmap.org"
    pub search_base_url: String,

    /// Sent with every request; Nominatim rejects anonymous clients.
    pub user_agent: String,

    /// Per-request timeout.
    /// Default: 15 seconds
    pub timeout_secs: u64,

    /// Retries after the first attempt on transport errors or HTTP 429.
    /// Default: 3
    pub max_retries: u32,

    /// Minimum spacing between place-search request starts.
    /// Default: 1000 ms
    pub search_spacing_ms: u64,

    /// Raw hits requested from the place provider before ranking.
    /// Default: 8
    pub search_result_limit: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            route_base_url: "https://router.project-osrm.org".to_string(),
            search_base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("route-guidance/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 15,
            max_retries: 3,
            search_spacing_ms: 1000,
            search_result_limit: 8,
        }
    }
}

// ============================================================================
// Provider Responses
// ============================================================================

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<RawRoute>,
}

/// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    display_name: String,
    lat: String,
    lon: String,
}

/// Parse an OSRM `route` response body and build the first route.
pub fn parse_route_response(body: &[u8]) -> Result<Route, NavError> {
    let response: RouteResponse = serde_json::from_slice(body)
        .map_err(|e| NavError::Provider(format!("JSON parse error: {}", e)))?;

    match response.routes.first() {
        Some(raw) => Route::from_raw(raw),
        None => {
            let detail = response
                .message
                .or(response.code)
                .unwrap_or_else(|| "no route found".to_string());
            Err(NavError::RouteEmpty(detail))
        }
    }
}

/// Parse a Nominatim `jsonv2` search body. Hits with unparseable
/// coordinates are skipped.
pub fn parse_search_response(body: &[u8]) -> Result<Vec<PlaceCandidate>, NavError> {
    let hits: Vec<SearchHit> = serde_json::from_slice(body)
        .map_err(|e| NavError::Provider(format!("JSON parse error: {}", e)))?;
    Ok(candidates_from_hits(hits))
}

fn candidates_from_hits(hits: Vec<SearchHit>) -> Vec<PlaceCandidate> {
    hits.into_iter()
        .filter_map(|hit| {
            let lat = hit.lat.trim().parse::<f64>().ok()?;
            let lon = hit.lon.trim().parse::<f64>().ok()?;
            let location = GpsPoint::new(lat, lon);
            location
                .is_valid()
                .then(|| PlaceCandidate::new(hit.display_name, location))
        })
        .collect()
}

pub fn route_url(base_url: &str, from: GpsPoint, to: GpsPoint) -> String {
    format!(
        "{}/route/v1/foot/{},{};{},{}?overview=full&geometries=geojson&steps=true",
        base_url.trim_end_matches('/'),
        from.longitude,
        from.latitude,
        to.longitude,
        to.latitude
    )
}

pub fn search_url(
    base_url: &str,
    query: &str,
    origin: Option<GpsPoint>,
    limit: u32,
) -> Result<Url, NavError> {
    let endpoint = format!("{}/search", base_url.trim_end_matches('/'));
    let limit = limit.to_string();
    let mut url = Url::parse_with_params(
        &endpoint,
        &[
            ("format", "jsonv2"),
            ("limit", limit.as_str()),
            ("addressdetails", "1"),
            ("q", query),
        ],
    )
    .map_err(|e| NavError::Provider(format!("bad search URL: {}", e)))?;

    if let Some(origin) = origin.filter(GpsPoint::is_valid) {
        url.query_pairs_mut()
            .append_pair("viewbox", &viewbox_param(origin))
            .append_pair("bounded", "0");
    }
    Ok(url)
}

// ============================================================================
// Request Spacing
// ============================================================================

/// Spaces out when requests START, and tracks consecutive 429s for backoff.
pub(crate) struct RequestSpacer {
    interval: Duration,
    next_slot: Mutex<Instant>,
    dispatched: AtomicU32,
    consecutive_throttles: AtomicU32,
}

impl RequestSpacer {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
            dispatched: AtomicU32::new(0),
            consecutive_throttles: AtomicU32::new(0),
        }
    }

    /// Wait for this caller's slot. Returns the dispatch number.
    pub(crate) async fn wait_for_slot(&self) -> u32 {
        let (wait, num) = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = if *next > now { *next } else { now };
            *next = slot + self.interval;

            let num = self.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
            (slot.saturating_duration_since(now), num)
        };

        // Sleep outside the lock
        if wait > Duration::from_millis(5) {
            debug!("[RequestSpacer #{}] Waiting {:?} for slot", num, wait);
            tokio::time::sleep(wait).await;
        }
        num
    }

    pub(crate) fn record_success(&self) {
        self.consecutive_throttles.store(0, Ordering::Relaxed);
    }

    /// Backoff after a 429: 1s, 2s, 4s, then capped.
    pub(crate) fn record_throttle(&self) -> Duration {
        let count = self.consecutive_throttles.fetch_add(1, Ordering::Relaxed) + 1;
        let backoff = Duration::from_millis(500 * (1 << count.min(3)));
        warn!("[RequestSpacer] Got 429, consecutive: {}, backing off {:?}", count, backoff);
        backoff
    }
}

fn build_client(config: &ProviderConfig) -> Result<Client, NavError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .pool_idle_timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| NavError::Provider(format!("failed to create HTTP client: {}", e)))
}

/// GET `url` and decode JSON, retrying on transport errors and 429.
async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    spacer: &RequestSpacer,
    max_retries: u32,
    label: &str,
) -> Result<T, NavError> {
    let mut retries = 0;
    let started = Instant::now();

    loop {
        spacer.wait_for_slot().await;

        match client.get(url).header("Accept", "application/json").send().await {
            Ok(resp) => {
                let status = resp.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    retries += 1;
                    if retries > max_retries {
                        return Err(NavError::Provider("max retries exceeded (429)".to_string()));
                    }
                    let wait = spacer.record_throttle();
                    tokio::time::sleep(wait).await;
                    continue;
                }
                spacer.record_success();

                if !status.is_success() {
                    return Err(NavError::Provider(format!("{} request failed: HTTP {}", label, status)));
                }

                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| NavError::Provider(format!("body download error: {}", e)))?;
                debug!(
                    "[{}] {:.1}KB in {:?}",
                    label,
                    bytes.len() as f64 / 1024.0,
                    started.elapsed()
                );
                return serde_json::from_slice(&bytes)
                    .map_err(|e| NavError::Provider(format!("JSON parse error: {}", e)));
            }
            Err(e) => {
                retries += 1;
                if retries > max_retries {
                    return Err(NavError::Provider(format!("request error: {}", e)));
                }
                let wait = Duration::from_millis(200 * (1 << retries.min(5)));
                warn!("[{}] Error: {}, retry {} after {:?}", label, e, retries, wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

// ============================================================================
// Route Client
// ============================================================================

/// Walking-route provider.
pub struct RouteClient {
    client: Client,
    config: ProviderConfig,
    spacer: RequestSpacer,
}

impl RouteClient {
    pub fn new(config: ProviderConfig) -> Result<Self, NavError> {
        Ok(Self {
            client: build_client(&config)?,
            spacer: RequestSpacer::new(Duration::ZERO),
            config,
        })
    }

    /// Fetch a foot route. The returned route arrives at `to`.
    pub async fn fetch_route(&self, from: GpsPoint, to: GpsPoint) -> Result<Route, NavError> {
        if !from.is_valid() || !to.is_valid() {
            return Err(NavError::Provider("route endpoints must be valid coordinates".to_string()));
        }

        let url = route_url(&self.config.route_base_url, from, to);
        info!("[RouteClient] Fetching route {:?} -> {:?}", from, to);

        let response: RouteResponse =
            get_json(&self.client, &url, &self.spacer, self.config.max_retries, "RouteClient").await?;

        let raw = response.routes.into_iter().next().ok_or_else(|| {
            NavError::RouteEmpty(response.message.unwrap_or_else(|| "no route found".to_string()))
        })?;
        let route = Route::from_raw(&raw)?.with_destination(to);

        info!(
            "[RouteClient] Route ready: {:.0}m, {} steps",
            route.distance_m(),
            route.step_count()
        );
        Ok(route)
    }

    /// Serve a reroute request. Every failure is reported as
    /// [`NavError::RerouteFailed`].
    pub async fn reroute(&self, request: &RerouteRequest) -> Result<Route, NavError> {
        self.fetch_route(request.from, request.to)
            .await
            .map_err(|e| NavError::RerouteFailed(e.to_string()))
    }
}

// ============================================================================
// Place Search Client
// ============================================================================

/// Destination search provider.
pub struct PlaceSearchClient {
    client: Client,
    config: ProviderConfig,
    spacer: RequestSpacer,
}

impl PlaceSearchClient {
    pub fn new(config: ProviderConfig) -> Result<Self, NavError> {
        Ok(Self {
            client: build_client(&config)?,
            spacer: RequestSpacer::new(Duration::from_millis(config.search_spacing_ms)),
            config,
        })
    }

    async fn lookup(&self, query: &str, origin: Option<GpsPoint>) -> Result<Vec<PlaceCandidate>, NavError> {
        let url = search_url(
            &self.config.search_base_url,
            query.trim(),
            origin,
            self.config.search_result_limit,
        )?;
        let hits: Vec<SearchHit> = get_json(
            &self.client,
            url.as_str(),
            &self.spacer,
            self.config.max_retries,
            "PlaceSearch",
        )
        .await?;
        Ok(candidates_from_hits(hits))
    }

    /// Type-ahead suggestions, nearest first. Short queries return nothing
    /// without touching the network.
    pub async fn search(&self, query: &str, origin: Option<GpsPoint>) -> Result<Vec<PlaceCandidate>, NavError> {
        if !is_searchable_query(query) {
            return Ok(Vec::new());
        }
        let candidates = self.lookup(query, origin).await?;
        debug!("[PlaceSearch] {} hits for {:?}", candidates.len(), query);
        Ok(top_suggestions(candidates, origin))
    }

    /// Resolve free text to the nearest matching place.
    pub async fn geocode(&self, query: &str, origin: Option<GpsPoint>) -> Result<PlaceCandidate, NavError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(NavError::PlaceNotFound(String::new()));
        }
        let candidates = self.lookup(query, origin).await?;
        rank_by_distance(candidates, origin)
            .into_iter()
            .next()
            .ok_or_else(|| NavError::PlaceNotFound(query.to_string()))
    }
}

// ============================================================================
// Blocking Facade
// ============================================================================

/// Both providers plus a runtime, for callers without an async executor.
pub struct BlockingProviders {
    runtime: tokio::runtime::Runtime,
    routes: RouteClient,
    places: PlaceSearchClient,
}

impl BlockingProviders {
    pub fn new(config: ProviderConfig) -> Result<Self, NavError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| NavError::Provider(format!("runtime error: {}", e)))?;

        Ok(Self {
            runtime,
            routes: RouteClient::new(config.clone())?,
            places: PlaceSearchClient::new(config)?,
        })
    }

    pub fn fetch_route(&self, from: GpsPoint, to: GpsPoint) -> Result<Route, NavError> {
        self.runtime.block_on(self.routes.fetch_route(from, to))
    }

    pub fn reroute(&self, request: &RerouteRequest) -> Result<Route, NavError> {
        self.runtime.block_on(self.routes.reroute(request))
    }

    pub fn search(&self, query: &str, origin: Option<GpsPoint>) -> Result<Vec<PlaceCandidate>, NavError> {
        self.runtime.block_on(self.places.search(query, origin))
    }

    pub fn geocode(&self, query: &str, origin: Option<GpsPoint>) -> Result<PlaceCandidate, NavError> {
        self.runtime.block_on(self.places.geocode(query, origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::TurnKind;

    const OSRM_BODY: &str = r#"{
        "code": "Ok",
        "routes": [{
            "distance": 412.3,
            "duration": 296.9,
            "geometry": {
                "type": "LineString",
                "coordinates": [[13.3889, 52.5170], [13.3895, 52.5180], [13.3920, 52.5182]]
            },
            "legs": [{
                "steps": [
                    {"name": "Unter den Linden", "maneuver": {"type": "depart", "location": [13.3889, 52.5170]}},
                    {"name": "Friedrichstrasse", "maneuver": {"type": "turn", "modifier": "right", "location": [13.3895, 52.5180]}},
                    {"name": "", "maneuver": {"type": "arrive", "location": [13.3920, 52.5182]}}
                ]
            }]
        }]
    }"#;

    #[test]
    fn test_parse_route_response() {
        let route = parse_route_response(OSRM_BODY.as_bytes()).unwrap();
        assert_eq!(route.step_count(), 3);
        assert_eq!(route.distance_m(), 412.3);
        assert_eq!(route.polyline()[0], GpsPoint::new(52.5170, 13.3889));
        assert_eq!(route.steps()[0].instruction, "depart on Unter den Linden (continue)");
        assert_eq!(route.steps()[1].turn, TurnKind::Right);
        assert_eq!(route.steps()[2].instruction, "arrive (continue)");
    }

    #[test]
    fn test_parse_route_response_without_routes() {
        let body = br#"{"code": "NoRoute", "message": "Impossible route between points", "routes": []}"#;
        match parse_route_response(body) {
            Err(NavError::RouteEmpty(msg)) => assert_eq!(msg, "Impossible route between points"),
            other => panic!("unexpected: {:?}", other),
        }

        let body = br#"{"code": "Ok"}"#;
        assert!(matches!(parse_route_response(body), Err(NavError::RouteEmpty(_))));
    }

    #[test]
    fn test_parse_route_response_rejects_garbage() {
        assert!(matches!(parse_route_response(b"<html>"), Err(NavError::Provider(_))));
    }

    #[test]
    fn test_parse_route_response_requires_maneuver_location() {
        let body = OSRM_BODY.replace(r#", "location": [13.3895, 52.5180]"#, "");
        assert_ne!(body, OSRM_BODY);
        match parse_route_response(body.as_bytes()) {
            Err(NavError::Provider(msg)) => assert!(msg.contains("location"), "{}", msg),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_route_response_rejects_out_of_range_location() {
        let body = OSRM_BODY.replace("[13.3895, 52.5180]}", "[13.3895, 152.5180]}");
        assert_ne!(body, OSRM_BODY);
        assert!(matches!(parse_route_response(body.as_bytes()), Err(NavError::RouteEmpty(_))));
    }

    #[test]
    fn test_parse_search_response() {
        let body = br#"[
            {"place_id": 1, "display_name": "Brandenburger Tor, Berlin", "lat": "52.5162746", "lon": "13.3777041"},
            {"place_id": 2, "display_name": "Broken", "lat": "n/a", "lon": "13.0"},
            {"place_id": 3, "display_name": "Tiergarten, Berlin", "lat": "52.5145", "lon": "13.3501"}
        ]"#;
        let hits = parse_search_response(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].label, "Brandenburger Tor, Berlin");
        assert!((hits[0].location.latitude - 52.5162746).abs() < 1e-9);
        assert!(hits[0].distance_m.is_infinite());
    }

    #[test]
    fn test_route_url() {
        let url = route_url(
            "https://router.example.org/",
            GpsPoint::new(52.5, 13.4),
            GpsPoint::new(52.6, 13.5),
        );
        assert_eq!(
            url,
            "https://router.example.org/route/v1/foot/13.4,52.5;13.5,52.6?overview=full&geometries=geojson&steps=true"
        );
    }

    #[test]
    fn test_search_url_with_and_without_origin() {
        let url = search_url("https://search.example.org", "Cafe Luz", None, 8).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("format".to_string(), "jsonv2".to_string()));
        assert_eq!(pairs[1], ("limit".to_string(), "8".to_string()));
        assert_eq!(pairs[3], ("q".to_string(), "Cafe Luz".to_string()));
        assert!(!pairs.iter().any(|(k, _)| k == "viewbox"));

        let url = search_url("https://search.example.org", "cafe", Some(GpsPoint::new(10.0, 20.0)), 8).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("viewbox".to_string(), viewbox_param(GpsPoint::new(10.0, 20.0)))));
        assert!(pairs.contains(&("bounded".to_string(), "0".to_string())));
        assert_eq!(url.path(), "/search");
    }

    #[test]
    fn test_throttle_backoff_grows_and_resets() {
        let spacer = RequestSpacer::new(Duration::ZERO);
        assert_eq!(spacer.record_throttle(), Duration::from_millis(1000));
        assert_eq!(spacer.record_throttle(), Duration::from_millis(2000));
        assert_eq!(spacer.record_throttle(), Duration::from_millis(4000));
        assert_eq!(spacer.record_throttle(), Duration::from_millis(4000));
        spacer.record_success();
        assert_eq!(spacer.record_throttle(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_request_spacer() {
        let spacer = RequestSpacer::new(Duration::from_millis(50));

        // First request should not wait
        let start = Instant::now();
        assert_eq!(spacer.wait_for_slot().await, 1);
        assert!(start.elapsed() < Duration::from_millis(10));

        // Second request should wait ~50ms
        let start = Instant::now();
        assert_eq!(spacer.wait_for_slot().await, 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(40), "Expected ~50ms wait, got {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_short_query_skips_network() {
        let client = PlaceSearchClient::new(ProviderConfig {
            search_base_url: "http://127.0.0.1:9".to_string(),
            ..ProviderConfig::default()
        })
        .unwrap();
        assert!(client.search(" a ", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_endpoints_rejected_before_request() {
        let client = RouteClient::new(ProviderConfig::default()).unwrap();
        let result = client
            .fetch_route(GpsPoint::new(f64::NAN, 0.0), GpsPoint::new(1.0, 1.0))
            .await;
        assert!(matches!(result, Err(NavError::Provider(_))));
    }
}
