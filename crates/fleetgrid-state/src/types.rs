//! Domain types for the instance registry.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use fleet_core::{MatchState, ServerKind};

/// Unique network-wide identifier of a game server (`Lobby-01`).
pub type InstanceId = String;

/// Invoked once when an instance has been fully removed.
pub type StopCallback = Box<dyn FnOnce(&InstanceId) + Send + 'static>;

// ── Lifecycle ─────────────────────────────────────────────────────

/// Ordered steps of the graceful shutdown workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownStage {
    NotifyProxy,
    RequestDisconnect,
    ForceTerminate,
    Reclaim,
    Finalize,
}

/// Where an instance is in its lifecycle.
///
/// ```text
/// PendingStart → Starting → Running → MarkedForStop → Stopping(stage) → Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum LifecycleState {
    /// Queued behind another start.
    PendingStart,
    /// Launched, waiting for the server to register.
    Starting,
    Running,
    /// In the stop queue, shutdown not yet begun.
    MarkedForStop,
    Stopping(ShutdownStage),
    Stopped,
}

impl LifecycleState {
    /// Not yet running: either queued or launched but unregistered.
    pub fn is_starting(&self) -> bool {
        matches!(self, LifecycleState::PendingStart | LifecycleState::Starting)
    }

    /// On its way out: waiting in the stop queue or inside the workflow.
    pub fn is_stopping(&self) -> bool {
        matches!(
            self,
            LifecycleState::MarkedForStop | LifecycleState::Stopping(_) | LifecycleState::Stopped
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::PendingStart => f.write_str("pending_start"),
            LifecycleState::Starting => f.write_str("starting"),
            LifecycleState::Running => f.write_str("running"),
            LifecycleState::MarkedForStop => f.write_str("marked_for_stop"),
            LifecycleState::Stopping(stage) => write!(f, "stopping({stage:?})"),
            LifecycleState::Stopped => f.write_str("stopped"),
        }
    }
}

/// Mutable lifecycle fields of an instance, guarded by one mutex.
pub struct Lifecycle {
    pub state: LifecycleState,
    /// Stop was requested before the server finished starting.
    pub stop_requested: bool,
    /// Last sub-state reported by a minigame server.
    pub match_state: Option<MatchState>,
    /// Run once after the instance is removed.
    pub on_stopped: Option<StopCallback>,
}

// ── Instance ──────────────────────────────────────────────────────

/// One managed game server.
pub struct Instance {
    id: InstanceId,
    kind: ServerKind,
    address: String,
    port: u16,
    ram_mb: u64,
    max_players: u32,
    /// Registration order, used to find the oldest instance of a kind.
    seq: u64,
    players: AtomicU32,
    lifecycle: Mutex<Lifecycle>,
}

impl Instance {
    pub(crate) fn new(
        id: InstanceId,
        kind: ServerKind,
        address: String,
        port: u16,
        ram_mb: u64,
        max_players: u32,
        seq: u64,
    ) -> Self {
        Self {
            id,
            kind,
            address,
            port,
            ram_mb,
            max_players,
            seq,
            players: AtomicU32::new(0),
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::PendingStart,
                stop_requested: false,
                match_state: None,
                on_stopped: None,
            }),
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn kind(&self) -> ServerKind {
        self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ram_mb(&self) -> u64 {
        self.ram_mb
    }

    pub fn max_players(&self) -> u32 {
        self.max_players
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn players(&self) -> u32 {
        self.players.load(Ordering::Relaxed)
    }

    pub fn set_players(&self, count: u32) {
        self.players.store(count, Ordering::Relaxed);
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.lock().state
    }

    pub fn set_state(&self, state: LifecycleState) {
        self.lifecycle.lock().state = state;
    }

    /// Run `f` with the lifecycle lock held.
    ///
    /// Every check-then-transition on a single instance goes through here so
    /// that two racing paths cannot both act on the same state.
    pub fn with_lifecycle<R>(&self, f: impl FnOnce(&mut Lifecycle) -> R) -> R {
        f(&mut self.lifecycle.lock())
    }

    /// Take the stop callback, if any. Returns it at most once.
    pub fn take_stop_callback(&self) -> Option<StopCallback> {
        self.lifecycle.lock().on_stopped.take()
    }

    pub fn view(&self) -> InstanceView {
        let lifecycle = self.lifecycle.lock();
        InstanceView {
            id: self.id.clone(),
            kind: self.kind,
            state: lifecycle.state,
            match_state: lifecycle.match_state,
            players: self.players(),
            max_players: self.max_players,
            address: self.address.clone(),
            port: self.port,
            ram_mb: self.ram_mb,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("port", &self.port)
            .field("state", &self.state())
            .finish()
    }
}

/// Serializable snapshot of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceView {
    pub id: InstanceId,
    pub kind: ServerKind,
    pub state: LifecycleState,
    pub match_state: Option<MatchState>,
    pub players: u32,
    pub max_players: u32,
    pub address: String,
    pub port: u16,
    pub ram_mb: u64,
}

/// Serializable snapshot of the whole registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub instances: Vec<InstanceView>,
    pub start_queue: Vec<InstanceId>,
    pub stop_queue: Vec<InstanceId>,
    pub expired: Vec<ServerKind>,
    pub ram_reserved_mb: u64,
    pub ram_budget_mb: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> Instance {
        Instance::new(
            "Lobby-01".to_string(),
            ServerKind::Lobby,
            "127.0.0.1".to_string(),
            30000,
            1024,
            100,
            0,
        )
    }

    #[test]
    fn new_instance_is_pending() {
        let inst = lobby();
        assert_eq!(inst.state(), LifecycleState::PendingStart);
        assert!(inst.state().is_starting());
        assert_eq!(inst.players(), 0);
    }

    #[test]
    fn stop_callback_taken_once() {
        let inst = lobby();
        inst.with_lifecycle(|l| l.on_stopped = Some(Box::new(|_| {})));
        assert!(inst.take_stop_callback().is_some());
        assert!(inst.take_stop_callback().is_none());
    }

    #[test]
    fn view_serializes_stage() {
        let inst = lobby();
        inst.set_state(LifecycleState::Stopping(ShutdownStage::Reclaim));
        let json = serde_json::to_value(inst.view()).unwrap();
        assert_eq!(json["state"]["state"], "stopping");
        assert_eq!(json["state"]["stage"], "reclaim");
        assert_eq!(json["kind"], "lobby");
    }
}
