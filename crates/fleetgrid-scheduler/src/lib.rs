//! fleetgrid-scheduler: the lifecycle coordinator for a game-server fleet.
//!
//! The `Coordinator` owns the start and stop queues, launches servers one at
//! a time, enrolls stopped servers into the shutdown protocol one at a time,
//! and routes lifecycle events to the heartbeat monitor and capacity
//! controller.
//!
//! # Architecture
//!
//! ```text
//! inbound event ─► EventRouter ─► Coordinator ─┬─► Registry (fleetgrid-state)
//!                                              ├─► HeartbeatMonitor (fleetgrid-health)
//!                                              ├─► CapacityController (fleetgrid-autoscale)
//!                                              ├─► shutdown workflow (per instance task)
//!                                              ├─► Launcher  (process / container runtime)
//!                                              └─► Transport (outbound events)
//! ```
//!
//! # Shutdown protocol
//!
//! ```text
//! 1. NotifyProxy        ProxyRemoveRequest, wait for ack or proxy_ack_timeout
//! 2. RequestDisconnect  DisconnectGracefully, wait for ack or disconnect_timeout
//! 3. ForceTerminate     only if stage 2 timed out (or heartbeat gave up)
//! 4. Reclaim            back up or delete the working directory
//! 5. Finalize           remove from registry, run hooks, advance stop queue
//! ```
//!
//! Each waiting stage resolves exactly once: whichever of acknowledgement
//! and timeout comes first wins, the other is a no-op.

pub mod admin;
pub mod collaborators;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod router;
pub mod shutdown;

pub use admin::{AdminCommand, AdminReply};
pub use collaborators::{ChannelTransport, LaunchSpec, Launcher, Reclaim, Recipient, Transport};
pub use coordinator::{Coordinator, StopOutcome};
pub use error::{SchedulerError, SchedulerResult};
pub use events::{InboundEvent, InstanceInfo, LobbySummary, OutboundEvent};
pub use router::EventRouter;
pub use shutdown::{Resolution, ShutdownEntry, StageGate};
