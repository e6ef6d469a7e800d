//! Shutdown protocol: the staged workflow that retires one instance.
//!
//! Stages 1 and 2 each race an acknowledgement against a timeout. The race
//! is settled by a [`StageGate`]: a single-resolution flag where the first
//! writer wins and every later writer is a no-op. A gate may be resolved
//! before anyone waits on it, so an acknowledgement that arrives early is
//! never lost and never replayed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use fleet_core::ServerKind;
use fleetgrid_state::{Instance, LifecycleState, ShutdownStage};

use crate::collaborators::{Reclaim, Recipient};
use crate::coordinator::Coordinator;
use crate::events::OutboundEvent;

const PENDING: u8 = 0;
const ACKNOWLEDGED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// How a waiting stage was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Acknowledged,
    TimedOut,
}

/// Single-resolution gate for one waiting stage.
#[derive(Debug, Default)]
pub struct StageGate {
    state: AtomicU8,
    notify: Notify,
}

impl StageGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the gate as acknowledged.
    ///
    /// Returns false if it was already resolved, either by an earlier
    /// acknowledgement or by the timeout.
    pub fn acknowledge(&self) -> bool {
        let won = self
            .state
            .compare_exchange(PENDING, ACKNOWLEDGED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.notify.notify_one();
        }
        won
    }

    /// Wait for an acknowledgement, resolving as timed out after `timeout`.
    pub async fn wait(&self, timeout: Duration) -> Resolution {
        if let Some(resolution) = self.resolution() {
            return resolution;
        }

        tokio::select! {
            _ = self.notify.notified() => Resolution::Acknowledged,
            _ = tokio::time::sleep(timeout) => {
                match self.state.compare_exchange(PENDING, TIMED_OUT, Ordering::AcqRel, Ordering::Acquire) {
                    Ok(_) => Resolution::TimedOut,
                    // Acknowledged between the timer firing and the swap.
                    Err(ACKNOWLEDGED) => Resolution::Acknowledged,
                    Err(_) => Resolution::TimedOut,
                }
            }
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match self.state.load(Ordering::Acquire) {
            ACKNOWLEDGED => Some(Resolution::Acknowledged),
            TIMED_OUT => Some(Resolution::TimedOut),
            _ => None,
        }
    }
}

/// Gates for one instance's workflow, created when it is enrolled.
#[derive(Debug, Default)]
pub struct ShutdownGates {
    pub proxy_removed: StageGate,
    pub disconnected: StageGate,
}

/// Where the workflow starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownEntry {
    /// From the stop queue; all five stages.
    Graceful,
    /// From the heartbeat monitor; straight to force-terminate.
    Forced,
}

impl Coordinator {
    /// Run the workflow to completion. Each stage is entered at most once.
    pub(crate) async fn run_shutdown(
        self: Arc<Self>,
        instance: Arc<Instance>,
        gates: Arc<ShutdownGates>,
        entry: ShutdownEntry,
    ) {
        let id = instance.id().clone();
        let kind = instance.kind();
        let settings = &self.config().shutdown;
        info!(instance = %id, %kind, ?entry, "shutdown started");

        let mut terminate = entry == ShutdownEntry::Forced;

        if entry == ShutdownEntry::Graceful {
            // ── Stage 1: notify proxies ─────────────────────────────
            instance.set_state(LifecycleState::Stopping(ShutdownStage::NotifyProxy));
            let has_proxies = !self.registry().running_of_kind(ServerKind::Proxy).is_empty();
            if kind == ServerKind::Proxy || !has_proxies {
                debug!(instance = %id, "no proxy to notify, skipping");
            } else {
                self.transport()
                    .send(Recipient::Proxies, OutboundEvent::ProxyRemoveRequest { instance: id.clone() });
                match gates.proxy_removed.wait(settings.proxy_ack()).await {
                    Resolution::Acknowledged => debug!(instance = %id, "proxies released server"),
                    Resolution::TimedOut => debug!(instance = %id, "proxy acknowledgement timed out"),
                }
            }

            // ── Stage 2: ask the server to disconnect ───────────────
            instance.set_state(LifecycleState::Stopping(ShutdownStage::RequestDisconnect));
            self.transport().send(
                Recipient::Instance(id.clone()),
                OutboundEvent::DisconnectGracefully { instance: id.clone() },
            );
            match gates.disconnected.wait(settings.disconnect()).await {
                Resolution::Acknowledged => debug!(instance = %id, "server disconnected gracefully"),
                Resolution::TimedOut => {
                    info!(instance = %id, timeout_ms = settings.disconnect().as_millis() as u64, "server did not disconnect in time");
                    terminate = true;
                }
            }
        }

        // ── Stage 3: force terminate ───────────────────────────────
        if terminate {
            instance.set_state(LifecycleState::Stopping(ShutdownStage::ForceTerminate));
            self.transport().send(
                Recipient::Instance(id.clone()),
                OutboundEvent::ShutdownCommand { instance: id.clone() },
            );
            if let Err(e) = self.launcher().terminate(&id).await {
                error!(instance = %id, error = %e, "failed to terminate server process");
            }
        }

        // ── Stage 4: reclaim ───────────────────────────────────────
        instance.set_state(LifecycleState::Stopping(ShutdownStage::Reclaim));
        let disposition = self.reclaim_for(kind);
        if let Err(e) = self.launcher().reclaim(&id, &disposition).await {
            warn!(instance = %id, error = %e, ?disposition, "failed to reclaim server files");
        }

        // ── Stage 5: finalize ──────────────────────────────────────
        instance.set_state(LifecycleState::Stopping(ShutdownStage::Finalize));
        self.notify_stopped(&id);
    }

    pub(crate) fn reclaim_for(&self, kind: ServerKind) -> Reclaim {
        if self.config().policy(kind).persistent {
            Reclaim::Backup(self.config().shutdown.backup_dir.clone())
        } else {
            Reclaim::Delete
        }
    }
}
