//! Silent-tick counter for a single instance.

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

/// What a heartbeat tick asks the monitor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing; the server has been quiet for fewer than `N` ticks.
    Idle,
    /// Send a liveness probe.
    Probe,
    /// Send the last liveness probe before giving up.
    FinalProbe,
    /// Give up on the server.
    Unresponsive,
}

/// Counts ticks since the server was last heard from.
///
/// The counter is shared between the ticking task and the inbound event
/// path, so it lives in an atomic.
#[derive(Debug)]
pub struct HeartbeatTracker {
    silent_ticks: AtomicU32,
    threshold: u32,
}

impl HeartbeatTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            silent_ticks: AtomicU32::new(0),
            threshold: threshold.max(1),
        }
    }

    /// Advance one tick and decide what to do.
    pub fn tick(&self) -> HeartbeatAction {
        let ticks = self.silent_ticks.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        let n = self.threshold;
        match ticks {
            t if t < n => HeartbeatAction::Idle,
            t if t == n => HeartbeatAction::Probe,
            t if t == n + 1 => HeartbeatAction::FinalProbe,
            _ => HeartbeatAction::Unresponsive,
        }
    }

    /// The server said something; start counting from zero again.
    pub fn reset(&self) {
        let previous = self.silent_ticks.swap(0, Ordering::AcqRel);
        if previous >= self.threshold {
            debug!(silent_ticks = previous, "heartbeat recovered after probe");
        }
    }

    pub fn silent_ticks(&self) -> u32 {
        self.silent_ticks.load(Ordering::Acquire)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
