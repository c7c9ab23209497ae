//! Reroute throttling and mutual exclusion.
//!
//! A reroute is a network fetch, so it is both rate limited (cool-down since
//! the last *attempt*, successful or not) and exclusive (one fetch in flight).

use log::{debug, info, warn};

/// Default minimum time between reroute attempts.
pub const DEFAULT_REROUTE_COOLDOWN_MS: u64 = 30_000;

/// Decides when a new route fetch may start and tracks the one in flight.
#[derive(Debug, Clone)]
pub struct RerouteCoordinator {
    cooldown_ms: u64,
    last_attempt_ms: Option<u64>,
    in_flight: bool,
}

impl Default for RerouteCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_REROUTE_COOLDOWN_MS)
    }
}

impl RerouteCoordinator {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last_attempt_ms: None,
            in_flight: false,
        }
    }

    /// `true` if nothing is in flight and the cool-down has elapsed.
    pub fn can_reroute(&self, now_ms: u64) -> bool {
        if self.in_flight {
            return false;
        }
        match self.last_attempt_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.cooldown_ms,
            None => true,
        }
    }

    /// Claim the reroute slot. Returns `false` (and changes nothing) if a
    /// reroute is not currently allowed.
    pub fn begin(&mut self, now_ms: u64) -> bool {
        if !self.can_reroute(now_ms) {
            debug!("[Reroute] begin refused at {}ms (in_flight={})", now_ms, self.in_flight);
            return false;
        }
        self.in_flight = true;
        self.last_attempt_ms = Some(now_ms);
        info!("[Reroute] attempt started at {}ms", now_ms);
        true
    }

    /// Release the slot after the fetch finished. The cool-down keeps counting
    /// from the attempt start either way.
    pub fn complete(&mut self, success: bool) {
        if !self.in_flight {
            warn!("[Reroute] complete({}) with no reroute in flight", success);
        }
        self.in_flight = false;
        if success {
            info!("[Reroute] new route accepted");
        } else {
            warn!("[Reroute] attempt failed, keeping previous route");
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Forget all history, as at the start of a new session.
    pub fn reset(&mut self) {
        self.last_attempt_ms = None;
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_allowed() {
        let coordinator = RerouteCoordinator::default();
        assert!(coordinator.can_reroute(0));
        assert!(coordinator.can_reroute(5));
    }

    #[test]
    fn test_in_flight_blocks_regardless_of_time() {
        let mut coordinator = RerouteCoordinator::new(30_000);
        assert!(coordinator.begin(1_000));
        assert!(coordinator.is_in_flight());
        assert!(!coordinator.can_reroute(1_000_000));
        assert!(!coordinator.begin(1_000_000));

        // A refused begin does not restart the cool-down
        coordinator.complete(true);
        assert!(coordinator.can_reroute(31_000));
    }

    #[test]
    fn test_cooldown_after_failure() {
        let mut coordinator = RerouteCoordinator::new(30_000);
        assert!(coordinator.begin(1_000));
        coordinator.complete(false);
        assert!(!coordinator.is_in_flight());
        assert!(!coordinator.can_reroute(30_999));
        assert!(coordinator.can_reroute(31_000));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut coordinator = RerouteCoordinator::new(30_000);
        assert!(coordinator.begin(1_000));
        coordinator.reset();
        assert!(!coordinator.is_in_flight());
        assert!(coordinator.can_reroute(1_001));
    }

    #[test]
    fn test_clock_going_backwards_does_not_allow_reroute() {
        let mut coordinator = RerouteCoordinator::new(30_000);
        assert!(coordinator.begin(50_000));
        coordinator.complete(true);
        assert!(!coordinator.can_reroute(10_000));
    }
}
