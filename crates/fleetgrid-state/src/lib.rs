//! fleetgrid-state: the in-memory instance registry.
//!
//! Holds every known game server and which lifecycle bucket it sits in:
//! the start queue, the running set, or the stop queue. All containers are
//! safe for concurrent use without a registry-wide lock.
//!
//! # Architecture
//!
//! ```text
//! Registry
//!   ├── instances: DashMap<id, Arc<Instance>>   (per-instance lifecycle mutex)
//!   ├── running:   DashSet<id>
//!   ├── start_queue / stop_queue: InstanceQueue (FIFO, atomic check-and-push)
//!   ├── expired:   DashSet<ServerKind>
//!   └── RAM budget (atomic reservation) + port set
//! ```
//!
//! Ids are `<prefix><NN>`, always reusing the lowest free number.

pub mod error;
pub mod naming;
pub mod queue;
pub mod registry;
pub mod types;

pub use error::{StateError, StateResult};
pub use naming::next_instance_id;
pub use queue::{Enqueued, InstanceQueue, QueueRemoval};
pub use registry::{NewInstance, Registry};
pub use types::*;
