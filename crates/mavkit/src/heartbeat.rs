//! Heartbeat liveness tracking.
//!
//! Generalizes the heartbeat-adoption logic that used to live inline in
//! `event_loop.rs`: tracks when the last accepted heartbeat arrived and
//! derives edge-triggered connect/disconnect transitions from it, rather than
//! every caller re-deriving "are we still connected" from a raw timestamp.

use std::time::{Duration, Instant};

pub(crate) struct HeartbeatMonitor {
    last_heartbeat: Option<Instant>,
    timeout: Duration,
    connected: bool,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_heartbeat: None,
            timeout,
            connected: false,
        }
    }

    /// Records an accepted vehicle heartbeat. Returns `true` the moment this
    /// flips the link from disconnected to connected (edge-triggered).
    pub fn on_heartbeat(&mut self, now: Instant) -> bool {
        self.last_heartbeat = Some(now);
        if !self.connected {
            self.connected = true;
            return true;
        }
        false
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Checks liveness against `now`. Returns `true` the moment the link
    /// transitions from connected to disconnected; a no-op once already
    /// disconnected.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        if !self.connected {
            return false;
        }
        let Some(last) = self.last_heartbeat else {
            return false;
        };
        if now.duration_since(last) > self.timeout {
            self.connected = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_heartbeat_connects() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(5));
        assert!(monitor.on_heartbeat(Instant::now()));
        assert!(monitor.is_connected());
    }

    #[test]
    fn second_heartbeat_does_not_re_signal_connect() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(monitor.on_heartbeat(t0));
        assert!(!monitor.on_heartbeat(t0));
    }

    #[test]
    fn timeout_flips_to_disconnected_once() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_millis(10));
        let t0 = Instant::now();
        monitor.on_heartbeat(t0);
        let later = t0 + Duration::from_millis(50);
        assert!(monitor.check_timeout(later));
        assert!(!monitor.is_connected());
        assert!(!monitor.check_timeout(later + Duration::from_millis(1)));
    }

    #[test]
    fn no_timeout_before_any_heartbeat() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_millis(10));
        assert!(!monitor.check_timeout(Instant::now()));
    }

    #[test]
    fn fresh_heartbeat_resets_timeout_window() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_millis(50));
        let t0 = Instant::now();
        monitor.on_heartbeat(t0);
        let t1 = t0 + Duration::from_millis(40);
        monitor.on_heartbeat(t1);
        assert!(!monitor.check_timeout(t1 + Duration::from_millis(40)));
    }
}
