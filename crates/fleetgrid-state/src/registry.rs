//! Registry: the authoritative record of every known game server.
//!
//! Instances enter through [`Registry::create`] and leave through
//! [`Registry::remove`], which succeeds exactly once per instance. Creation
//! reserves the instance's RAM atomically against the network budget, so two
//! concurrent creations can never jointly overshoot it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tracing::{debug, warn};

use fleet_core::ServerKind;

use crate::error::{StateError, StateResult};
use crate::naming::next_instance_id;
use crate::queue::InstanceQueue;
use crate::types::*;

/// Parameters for a new instance, resolved from the kind's policy.
#[derive(Debug, Clone)]
pub struct NewInstance<'a> {
    pub kind: ServerKind,
    pub prefix: &'a str,
    pub ram_mb: u64,
    pub max_players: u32,
}

pub struct Registry {
    instances: DashMap<InstanceId, Arc<Instance>>,
    running: DashSet<InstanceId>,
    start_queue: InstanceQueue,
    stop_queue: InstanceQueue,
    expired: DashSet<ServerKind>,
    ports: DashSet<u16>,
    ram_budget_mb: u64,
    ram_reserved_mb: AtomicU64,
    next_seq: AtomicU64,
    host: String,
    base_port: u16,
}

impl Registry {
    pub fn new(ram_budget_mb: u64, host: impl Into<String>, base_port: u16) -> Self {
        Self {
            instances: DashMap::new(),
            running: DashSet::new(),
            start_queue: InstanceQueue::new("start"),
            stop_queue: InstanceQueue::new("stop"),
            expired: DashSet::new(),
            ports: DashSet::new(),
            ram_budget_mb,
            ram_reserved_mb: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
            host: host.into(),
            base_port,
        }
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Register a new instance in `PendingStart`.
    ///
    /// Fails without side effects if the RAM budget would be exceeded.
    pub fn create(&self, new: NewInstance<'_>) -> StateResult<Arc<Instance>> {
        self.reserve_ram(new.ram_mb)?;

        let port = match self.allocate_port() {
            Ok(port) => port,
            Err(e) => {
                self.release_ram(new.ram_mb);
                return Err(e);
            }
        };

        let instance = loop {
            let known: Vec<InstanceId> = self
                .instances
                .iter()
                .filter(|e| e.value().kind() == new.kind)
                .map(|e| e.key().clone())
                .collect();
            let id = next_instance_id(new.prefix, known.iter().map(String::as_str));

            // Another creation may have claimed the same id since the scan.
            match self.instances.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let instance = Arc::new(Instance::new(
                        id,
                        new.kind,
                        self.host.clone(),
                        port,
                        new.ram_mb,
                        new.max_players,
                        self.next_seq.fetch_add(1, Ordering::Relaxed),
                    ));
                    slot.insert(Arc::clone(&instance));
                    break instance;
                }
            }
        };

        debug!(instance = %instance.id(), kind = %new.kind, port, "instance registered");
        Ok(instance)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Instance>> {
        self.instances.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    /// Remove an instance and release its resources.
    ///
    /// Returns `None` if it was already removed; only the first caller
    /// receives the instance.
    pub fn remove(&self, id: &str) -> Option<Arc<Instance>> {
        let (_, instance) = self.instances.remove(id)?;
        self.running.remove(id);
        self.ports.remove(&instance.port());
        self.release_ram(instance.ram_mb());
        instance.set_state(LifecycleState::Stopped);
        debug!(instance = %id, "instance removed from registry");
        Some(instance)
    }

    /// All instances in registration order.
    pub fn instances(&self) -> Vec<Arc<Instance>> {
        let mut all: Vec<_> = self.instances.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by_key(|i| i.seq());
        all
    }

    pub fn of_kind(&self, kind: ServerKind) -> Vec<Arc<Instance>> {
        self.instances()
            .into_iter()
            .filter(|i| i.kind() == kind)
            .collect()
    }

    pub fn count_of_kind(&self, kind: ServerKind) -> usize {
        self.instances.iter().filter(|e| e.value().kind() == kind).count()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    // ── Running set ────────────────────────────────────────────────

    /// Returns false if the instance was already marked running.
    pub fn mark_running(&self, id: &InstanceId) -> bool {
        if !self.instances.contains_key(id) {
            warn!(instance = %id, "cannot mark unknown instance running");
            return false;
        }
        self.running.insert(id.clone())
    }

    /// Returns false if the instance was not in the running set.
    pub fn unmark_running(&self, id: &str) -> bool {
        self.running.remove(id).is_some()
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.contains(id)
    }

    /// Running instances of a kind in registration order.
    pub fn running_of_kind(&self, kind: ServerKind) -> Vec<Arc<Instance>> {
        let mut running: Vec<_> = self
            .running
            .iter()
            .filter_map(|id| self.get(id.key()))
            .filter(|i| i.kind() == kind)
            .collect();
        running.sort_by_key(|i| i.seq());
        running
    }

    // ── Queues ─────────────────────────────────────────────────────

    pub fn start_queue(&self) -> &InstanceQueue {
        &self.start_queue
    }

    pub fn stop_queue(&self) -> &InstanceQueue {
        &self.stop_queue
    }

    // ── Expire mode ────────────────────────────────────────────────

    /// Returns true if the flag changed.
    pub fn set_expired(&self, kind: ServerKind, expired: bool) -> bool {
        if expired {
            self.expired.insert(kind)
        } else {
            self.expired.remove(&kind).is_some()
        }
    }

    pub fn is_expired(&self, kind: ServerKind) -> bool {
        self.expired.contains(&kind)
    }

    pub fn expired_kinds(&self) -> Vec<ServerKind> {
        let mut kinds: Vec<_> = self.expired.iter().map(|k| *k).collect();
        kinds.sort();
        kinds
    }

    // ── Resources ──────────────────────────────────────────────────

    pub fn ram_budget_mb(&self) -> u64 {
        self.ram_budget_mb
    }

    pub fn ram_reserved_mb(&self) -> u64 {
        self.ram_reserved_mb.load(Ordering::Acquire)
    }

    fn reserve_ram(&self, mb: u64) -> StateResult<()> {
        let budget = self.ram_budget_mb;
        self.ram_reserved_mb
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                reserved.checked_add(mb).filter(|total| *total <= budget)
            })
            .map(|_| ())
            .map_err(|reserved| StateError::RamBudgetExceeded {
                requested: mb,
                available: budget.saturating_sub(reserved),
            })
    }

    fn release_ram(&self, mb: u64) {
        let _ = self
            .ram_reserved_mb
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                Some(reserved.saturating_sub(mb))
            });
    }

    fn allocate_port(&self) -> StateResult<u16> {
        (self.base_port..=u16::MAX)
            .find(|port| self.ports.insert(*port))
            .ok_or(StateError::NoFreePort(self.base_port))
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            instances: self.instances().iter().map(|i| i.view()).collect(),
            start_queue: self.start_queue.snapshot(),
            stop_queue: self.stop_queue.snapshot(),
            expired: self.expired_kinds(),
            ram_reserved_mb: self.ram_reserved_mb(),
            ram_budget_mb: self.ram_budget_mb,
        }
    }
}
