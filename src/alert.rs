//! Alert kinds and the dispatcher boundary.
//!
//! The engine only decides *which* alert fires and *when*. Turning an
//! [`AlertKind`] into vibration, sound or on-screen text is the job of an
//! [`AlertDispatcher`] supplied by the host. The haptic and tone tables below
//! describe how each alert is meant to feel and sound so every host renders
//! them the same way.

use log::info;

/// Every event the engine can ask the host to signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum AlertKind {
    /// A turn is coming up within the preview radius.
    Preview,
    Left,
    Right,
    Uturn,
    /// The walker has strayed from the route polyline.
    OffRoute,
    /// The network is unreachable, so rerouting is unavailable.
    Disconnected,
    /// The position source reported an error.
    GpsLost,
    /// A new route is being requested.
    Rerouting,
    /// Navigation was stopped by the user.
    Cancelled,
    /// The destination has been reached.
    Arrived,
}

/// One beep in a tone schedule. Offsets and durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub offset_s: f32,
    pub duration_s: f32,
    pub frequency_hz: f32,
}

const fn tone(offset_s: f32, duration_s: f32, frequency_hz: f32) -> Tone {
    Tone { offset_s, duration_s, frequency_hz }
}

impl AlertKind {
    pub const ALL: [AlertKind; 10] = [
        AlertKind::Preview,
        AlertKind::Left,
        AlertKind::Right,
        AlertKind::Uturn,
        AlertKind::OffRoute,
        AlertKind::Disconnected,
        AlertKind::GpsLost,
        AlertKind::Rerouting,
        AlertKind::Cancelled,
        AlertKind::Arrived,
    ];

    /// Stable lowercase token, suitable for logs and host-side lookups.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Preview => "preview",
            AlertKind::Left => "left",
            AlertKind::Right => "right",
            AlertKind::Uturn => "uturn",
            AlertKind::OffRoute => "offroute",
            AlertKind::Disconnected => "disconnected",
            AlertKind::GpsLost => "gpslost",
            AlertKind::Rerouting => "rerouting",
            AlertKind::Cancelled => "cancelled",
            AlertKind::Arrived => "arrived",
        }
    }

    /// Vibration pattern in milliseconds, alternating on/off starting with "on".
    ///
    /// Left and right are told apart by rhythm alone (one long pulse vs. two
    /// short ones) so the phone can stay in a pocket.
    pub fn haptic_pattern(&self) -> &'static [u32] {
        match self {
            AlertKind::Right => &[220],
            AlertKind::Left => &[150, 130, 150],
            AlertKind::Preview => &[80, 80, 80, 80, 80],
            AlertKind::Uturn => &[260, 120, 260, 120, 260],
            AlertKind::OffRoute => &[1200],
            AlertKind::Disconnected => &[800, 200, 800],
            AlertKind::GpsLost => &[500, 120, 500, 120, 500],
            AlertKind::Rerouting => &[120, 90, 120, 90, 120, 90, 120],
            AlertKind::Cancelled => &[120, 90, 350],
            AlertKind::Arrived => &[100, 80, 100, 80, 280],
        }
    }

    /// Audio cue as a list of sine beeps.
    pub fn tone_schedule(&self) -> &'static [Tone] {
        static RIGHT: [Tone; 1] = [tone(0.0, 0.11, 660.0)];
        static LEFT: [Tone; 2] = [tone(0.0, 0.08, 440.0), tone(0.16, 0.08, 440.0)];
        static PREVIEW: [Tone; 3] = [
            tone(0.0, 0.06, 720.0),
            tone(0.12, 0.06, 720.0),
            tone(0.24, 0.06, 720.0),
        ];
        static UTURN: [Tone; 3] = [
            tone(0.0, 0.11, 330.0),
            tone(0.2, 0.11, 300.0),
            tone(0.4, 0.11, 280.0),
        ];
        static OFF_ROUTE: [Tone; 1] = [tone(0.0, 0.55, 180.0)];
        static DISCONNECTED: [Tone; 2] = [tone(0.0, 0.35, 220.0), tone(0.5, 0.35, 220.0)];
        static GPS_LOST: [Tone; 3] = [
            tone(0.0, 0.15, 220.0),
            tone(0.2, 0.15, 220.0),
            tone(0.4, 0.15, 220.0),
        ];
        static REROUTING: [Tone; 4] = [
            tone(0.0, 0.06, 520.0),
            tone(0.1, 0.06, 600.0),
            tone(0.2, 0.06, 680.0),
            tone(0.3, 0.06, 760.0),
        ];
        static CANCELLED: [Tone; 2] = [tone(0.0, 0.08, 480.0), tone(0.15, 0.2, 220.0)];
        static ARRIVED: [Tone; 3] = [
            tone(0.0, 0.09, 740.0),
            tone(0.14, 0.09, 740.0),
            tone(0.28, 0.2, 900.0),
        ];

        match self {
            AlertKind::Right => &RIGHT,
            AlertKind::Left => &LEFT,
            AlertKind::Preview => &PREVIEW,
            AlertKind::Uturn => &UTURN,
            AlertKind::OffRoute => &OFF_ROUTE,
            AlertKind::Disconnected => &DISCONNECTED,
            AlertKind::GpsLost => &GPS_LOST,
            AlertKind::Rerouting => &REROUTING,
            AlertKind::Cancelled => &CANCELLED,
            AlertKind::Arrived => &ARRIVED,
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Realizes alerts as haptics, audio and/or text on the host.
pub trait AlertDispatcher {
    fn dispatch(&mut self, alert: AlertKind);
}

/// Records alerts in order. Handy for tests and simulations.
impl AlertDispatcher for Vec<AlertKind> {
    fn dispatch(&mut self, alert: AlertKind) {
        self.push(alert);
    }
}

/// Dispatcher that only logs each alert with its haptic pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl AlertDispatcher for LogDispatcher {
    fn dispatch(&mut self, alert: AlertKind) {
        let beeps = alert.tone_schedule().len();
        info!(
            "[Alert] {} (vibrate {:?}, {} beep{})",
            alert,
            alert.haptic_pattern(),
            beeps,
            if beeps == 1 { "" } else { "s" }
        );
    }
}
