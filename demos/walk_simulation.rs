//! Simulated walk through a short route, printing every alert and status change.
//!
//! Covers a turn fired by the fast path, a turn fired by the fallback timer
//! after a GPS dropout, an off-route excursion with a reroute, and arrival.
//!
//! Run with: cargo run --example walk_simulation

use route_guidance::{
    AlertDispatcher, AlertKind, GpsPoint, NavigationSession, PositionSample, PositionSource,
    Route, Step, TrackingConfig, TurnKind,
};

/// Meters per degree of latitude on the haversine sphere
const M_PER_DEG: f64 = 111_194.9;

struct SimulatedGps;

impl PositionSource for SimulatedGps {
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "simulated gps"
    }
}

struct PrintDispatcher;

impl AlertDispatcher for PrintDispatcher {
    fn dispatch(&mut self, alert: AlertKind) {
        println!(
            "   >> {:<12} vibrate {:?}, {} tone(s)",
            alert,
            alert.haptic_pattern(),
            alert.tone_schedule().len()
        );
    }
}

/// Point `north_m` north and `east_m` east of the origin (near the equator).
fn at(north_m: f64, east_m: f64) -> GpsPoint {
    GpsPoint::new(north_m / M_PER_DEG, east_m / M_PER_DEG)
}

fn route() -> Result<Route, route_guidance::NavError> {
    // North 400m, east 300m, north 200m
    Route::new(
        vec![at(0.0, 0.0), at(400.0, 0.0), at(400.0, 300.0), at(600.0, 300.0)],
        vec![
            Step::new(TurnKind::Right, "turn on Canal St (right)", at(400.0, 0.0)),
            Step::new(TurnKind::Left, "turn on Dock Rd (left)", at(400.0, 300.0)),
        ],
    )
}

fn print_texts(session: &NavigationSession<PrintDispatcher>) {
    println!(
        "   status: {:<32} next: {}",
        session.status().unwrap_or("-"),
        session.next_turn().unwrap_or("-")
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = TrackingConfig::default();
    println!("Walk Simulation\n");
    println!(
        "Config: arrival={}m, off_route={}m, preview={}m, trigger={}m, fallback={}ms\n",
        config.arrival_radius_m,
        config.off_route_threshold_m,
        config.preview_radius_m,
        config.trigger_radius_m,
        config.preview_fallback_ms
    );

    let mut session = NavigationSession::new(config, PrintDispatcher);
    session.start_navigation(route()?, &SimulatedGps)?;
    print_texts(&session);

    // (north, east, time) fixes. The gap between 20s and 34s is a GPS dropout
    // right before the second turn.
    let fixes = [
        (0.0, 0.0, 0),
        (150.0, 0.0, 5_000),
        (300.0, 0.0, 10_000),
        (380.0, 0.0, 13_000),
        (400.0, 100.0, 17_000),
        (400.0, 190.0, 20_000),
        (400.0, 250.0, 34_000),
        (430.0, 300.0, 38_000),
        (500.0, 380.0, 45_000),
        (590.0, 300.0, 60_000),
    ];

    for (north, east, t) in fixes {
        // Timers due during a dropout fire before the next fix is processed
        if let Some(deadline) = session.next_timer_deadline() {
            if deadline <= t {
                println!("[{:>5.1}s] timer", deadline as f64 / 1000.0);
                session.poll_timers(deadline);
                print_texts(&session);
            }
        }

        println!("[{:>5.1}s] fix {:>4.0}m N {:>4.0}m E", t as f64 / 1000.0, north, east);
        if let Some(request) = session.on_position_update(PositionSample::new(at(north, east), t)) {
            println!(
                "   reroute requested from {:.5},{:.5}",
                request.from.latitude, request.from.longitude
            );
            // Pretend the provider answered with a route back to the canal
            let fresh = Route::new(
                vec![request.from, at(500.0, 300.0), request.to],
                vec![Step::new(TurnKind::Left, "turn on Dock Rd (left)", at(500.0, 300.0))],
            );
            session.complete_reroute(request.attempt, fresh);
        }
        print_texts(&session);
    }

    println!("\nFinal state: {:?}", session.state());
    Ok(())
}
