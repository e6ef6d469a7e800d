//! fleetgrid-health: heartbeat monitoring for running game servers.
//!
//! Every running instance gets one background task that ticks on a fixed
//! period after a warm-up delay. Each tick first checks that the server
//! process still exists, then advances a silent-tick counter that any
//! inbound message from the server resets to zero.
//!
//! # Escalation
//!
//! ```text
//! silent ticks < N      idle
//! silent ticks == N     liveness probe
//! silent ticks == N+1   final liveness probe
//! silent ticks >  N+1   unresponsive → forced stop
//! process gone          unresponsive → forced stop
//! ```
//!
//! A monitor cancels itself once it declares its instance unresponsive;
//! otherwise it runs until [`HeartbeatMonitor::stop`] is called.

pub mod monitor;
pub mod tracker;

pub use monitor::{HeartbeatMonitor, LivenessProbe, MonitorSettings, UnresponsiveReason};
pub use tracker::{HeartbeatAction, HeartbeatTracker};
