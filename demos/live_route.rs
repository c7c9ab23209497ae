//! Look up a destination and fetch a walking route from the public servers.
//!
//! Run with: cargo run --example live_route --features http -- "<lat>,<lon>" "<destination query>"

use route_guidance::{GpsPoint, PlaceSearchClient, ProviderConfig, RouteClient};
use std::time::Instant;

fn parse_point(text: &str) -> Option<GpsPoint> {
    let (lat, lon) = text.split_once(',')?;
    let point = GpsPoint::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?);
    point.is_valid().then_some(point)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let origin = args
        .next()
        .and_then(|s| parse_point(&s))
        .unwrap_or(GpsPoint::new(52.5163, 13.3777));
    let query = args.next().unwrap_or_else(|| "Alexanderplatz".to_string());

    let config = ProviderConfig::default();
    println!("Live Route Lookup");
    println!("=================");
    println!("Route server:  {}", config.route_base_url);
    println!("Search server: {}", config.search_base_url);
    println!("Origin: {:.5},{:.5}  Query: {:?}\n", origin.latitude, origin.longitude, query);

    let places = PlaceSearchClient::new(config.clone())?;
    let routes = RouteClient::new(config)?;

    let start = Instant::now();
    let suggestions = places.search(&query, Some(origin)).await?;
    println!("Suggestions ({:.2}s):", start.elapsed().as_secs_f64());
    for place in &suggestions {
        println!("  {} ({})", place.label, place.distance_label());
    }

    let destination = places.geocode(&query, Some(origin)).await?;
    println!("\nDestination: {}", destination.label);

    let start = Instant::now();
    let route = routes.fetch_route(origin, destination.location).await?;
    println!(
        "\nRoute: {:.0}m, {} points, {} steps ({:.2}s)",
        route.distance_m(),
        route.polyline().len(),
        route.step_count(),
        start.elapsed().as_secs_f64()
    );
    for (i, step) in route.steps().iter().enumerate() {
        println!("  {:>2}. {:<40} {:?}", i + 1, step.instruction, step.turn);
    }
    Ok(())
}
