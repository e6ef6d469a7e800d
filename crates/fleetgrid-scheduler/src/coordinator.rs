//! Lifecycle coordinator: owns the start and stop queues.
//!
//! The `Coordinator` is the one place that moves instances between states:
//! - Creates instances and launches them one at a time from the start queue
//! - Promotes registered servers to running and starts their heartbeat
//! - Enrolls stopped servers into the shutdown workflow one at a time
//! - Applies capacity decisions and type-specific post-removal hooks
//!
//! Every operation is synchronous from the caller's point of view. Launches,
//! probes, and shutdown stages run in spawned tasks and report back through
//! the same operations.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use fleet_core::{FleetConfig, MatchState, ServerKind};
use fleetgrid_autoscale::{CapacityController, CapacitySettings, LobbyLoad, ScaleDecision};
use fleetgrid_health::{HeartbeatMonitor, LivenessProbe, MonitorSettings, UnresponsiveReason};
use fleetgrid_state::{
    Enqueued, FleetSnapshot, Instance, InstanceId, LifecycleState, NewInstance, Registry,
    ShutdownStage, StopCallback,
};

use crate::collaborators::{LaunchSpec, Launcher, Recipient, Transport};
use crate::error::{SchedulerError, SchedulerResult};
use crate::events::{InstanceInfo, LobbySummary, OutboundEvent};
use crate::shutdown::{ShutdownEntry, ShutdownGates};

/// What `request_stop` did with the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Enrolled in the stop queue.
    Enrolled,
    /// Still starting; it will be stopped once it registers, or never
    /// launched if it is still queued.
    DeferredUntilStarted,
    /// Already on its way out; nothing changed.
    AlreadyStopping,
}

pub struct Coordinator {
    me: Weak<Coordinator>,
    config: FleetConfig,
    registry: Arc<Registry>,
    heartbeat: HeartbeatMonitor,
    capacity: CapacityController,
    launcher: Arc<dyn Launcher>,
    transport: Arc<dyn Transport>,
    /// Gates of every enrolled shutdown, keyed by instance.
    shutdowns: DashMap<InstanceId, Arc<ShutdownGates>>,
    /// Set by `shutdown_all`; suppresses automatic replacements.
    draining: AtomicBool,
}

impl Coordinator {
    pub fn new(
        config: FleetConfig,
        launcher: Arc<dyn Launcher>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        let registry = Arc::new(Registry::new(
            config.network.ram_budget_mb,
            config.network.host.clone(),
            config.network.base_port,
        ));
        for kind in config.expired_kinds() {
            registry.set_expired(kind, true);
        }

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            heartbeat: HeartbeatMonitor::new(MonitorSettings::from(&config.heartbeat)),
            capacity: CapacityController::new(CapacitySettings::from(&config.network)),
            config,
            registry,
            launcher,
            transport,
            shutdowns: DashMap::new(),
            draining: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    pub fn capacity(&self) -> &CapacityController {
        &self.capacity
    }

    pub(crate) fn launcher(&self) -> &Arc<dyn Launcher> {
        &self.launcher
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    fn instance(&self, id: &str) -> SchedulerResult<Arc<Instance>> {
        self.registry.get(id).ok_or_else(|| {
            warn!(instance = %id, "event references unknown instance");
            SchedulerError::UnknownInstance(id.to_string())
        })
    }

    // ── Start path ─────────────────────────────────────────────────

    /// Create an instance of `kind` and queue it for launch.
    pub fn request_create(&self, kind: ServerKind) -> SchedulerResult<InstanceId> {
        if self.registry.is_expired(kind) {
            warn!(%kind, "creation rejected, kind is in expire mode");
            return Err(SchedulerError::KindExpired(kind));
        }

        let policy = self.config.policy(kind);
        if self.registry.count_of_kind(kind) >= policy.max as usize {
            warn!(%kind, max = policy.max, "creation rejected, kind at maximum");
            return Err(SchedulerError::KindAtCapacity {
                kind,
                max: policy.max,
            });
        }

        let instance = self
            .registry
            .create(NewInstance {
                kind,
                prefix: policy.prefix_for(kind),
                ram_mb: policy.ram_mb,
                max_players: policy.max_players,
            })
            .map_err(|e| {
                warn!(%kind, error = %e, "creation rejected");
                SchedulerError::from(e)
            })?;
        let id = instance.id().clone();

        match self.registry.start_queue().push(&id) {
            Enqueued::Head => {
                info!(instance = %id, %kind, "instance created, launching");
                self.launch_from(id.clone());
            }
            Enqueued::Behind(ahead) => {
                info!(instance = %id, %kind, ahead, "instance created, waiting to launch");
            }
            Enqueued::AlreadyQueued => {
                debug!(instance = %id, "instance already queued to start");
            }
        }

        Ok(id)
    }

    /// Launch `head` in the background, advancing past heads that cannot
    /// be launched.
    fn launch_from(&self, head: InstanceId) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(me.launch_loop(head));
    }

    async fn launch_loop(self: Arc<Self>, head: InstanceId) {
        let mut next = Some(head);

        while let Some(id) = next.take() {
            let Some(instance) = self.registry.get(&id) else {
                warn!(instance = %id, "queued instance vanished from registry");
                next = self.discard_unlaunched(&id);
                continue;
            };

            let launch = instance.with_lifecycle(|l| {
                if l.stop_requested {
                    Some(false)
                } else if l.state == LifecycleState::PendingStart {
                    l.state = LifecycleState::Starting;
                    Some(true)
                } else {
                    None
                }
            });
            match launch {
                Some(true) => {}
                Some(false) => {
                    info!(instance = %id, "stop requested before launch, discarding");
                    next = self.discard_unlaunched(&id);
                    continue;
                }
                None => {
                    debug!(instance = %id, state = %instance.state(), "head already launched");
                    return;
                }
            }

            let kind = instance.kind();
            let spec = LaunchSpec::for_instance(&instance, self.config.policy(kind).persistent);
            match self.launcher.launch(&spec).await {
                Ok(()) => {
                    debug!(instance = %id, port = spec.port, "server launched, waiting for registration");
                    self.arm_registration_timeout(&instance);
                    return;
                }
                Err(e) => {
                    error!(instance = %id, %kind, error = %e, "launch failed");
                    if kind == ServerKind::Lobby {
                        self.capacity.reset_scale_up();
                    }
                    next = self.discard_unlaunched(&id);
                }
            }
        }
    }

    /// Give up on a launched server that never registers.
    fn arm_registration_timeout(&self, instance: &Arc<Instance>) {
        let timeout = self.config.startup.registration();
        let me = self.me.clone();
        let id = instance.id().clone();
        let seq = instance.seq();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(me) = me.upgrade() else {
                return;
            };
            // The id may have been reused by a later instance.
            let Some(instance) = me.registry.get(&id).filter(|i| i.seq() == seq) else {
                return;
            };
            let expired = instance.with_lifecycle(|l| {
                if l.state == LifecycleState::Starting {
                    l.state = LifecycleState::Stopping(ShutdownStage::ForceTerminate);
                    true
                } else {
                    false
                }
            });
            if !expired {
                return;
            }

            warn!(instance = %id, timeout_secs = timeout.as_secs(), "server never registered, giving up");
            if let Err(e) = me.launcher.terminate(&id).await {
                error!(instance = %id, error = %e, "failed to terminate unregistered server");
            }
            if let Err(e) = me.launcher.reclaim(&id, &me.reclaim_for(instance.kind())).await {
                warn!(instance = %id, error = %e, "failed to reclaim unregistered server");
            }
            if instance.kind() == ServerKind::Lobby {
                me.capacity.reset_scale_up();
            }
            if let Some(next) = me.discard_unlaunched(&id) {
                me.launch_from(next);
            }
        });
    }

    /// Drop a start-queue entry that will never run. Returns the new head
    /// if the entry was the head.
    fn discard_unlaunched(&self, id: &InstanceId) -> Option<InstanceId> {
        let promoted = self
            .registry
            .start_queue()
            .remove(id)
            .and_then(|r| r.promoted);
        self.drop_unlaunched(id);
        promoted
    }

    fn drop_unlaunched(&self, id: &InstanceId) {
        if let Some(instance) = self.registry.remove(id)
            && let Some(callback) = instance.take_stop_callback()
        {
            callback(id);
        }
    }

    /// A server registered: promote it to running.
    pub fn notify_started(&self, id: &str) -> SchedulerResult<()> {
        let instance = self.instance(id)?;
        let id = instance.id().clone();

        let started = instance.with_lifecycle(|l| {
            if l.state.is_starting() {
                l.state = LifecycleState::Running;
                Some(l.stop_requested)
            } else {
                None
            }
        });
        let Some(stop_requested) = started else {
            warn!(instance = %id, state = %instance.state(), "duplicate or late registration ignored");
            return Ok(());
        };

        self.registry.mark_running(&id);
        self.heartbeat.start(&id, self.probe());
        let promoted = self
            .registry
            .start_queue()
            .remove(&id)
            .and_then(|r| r.promoted);
        info!(instance = %id, kind = %instance.kind(), "server running");

        self.after_start(&instance);

        if stop_requested {
            info!(instance = %id, "stop was requested while starting");
            self.request_stop(&id, None)?;
        }
        if let Some(next) = promoted {
            self.launch_from(next);
        }
        Ok(())
    }

    fn after_start(&self, instance: &Instance) {
        match instance.kind() {
            ServerKind::Lobby => self.broadcast_lobby_info(),
            ServerKind::Attack => self.broadcast_attack_count(),
            ServerKind::Proxy => {
                // A fresh proxy learns about every server already running.
                for kind in ServerKind::ALL.into_iter().filter(|k| *k != ServerKind::Proxy) {
                    for server in self.registry.running_of_kind(kind) {
                        self.transport.send(
                            Recipient::Instance(instance.id().clone()),
                            proxy_add(&server),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    /// A server is accepting players; tell the proxies to route to it.
    pub fn announce_to_proxies(&self, id: &str) -> SchedulerResult<()> {
        let instance = self.instance(id)?;
        if instance.kind() == ServerKind::Proxy {
            return Ok(());
        }
        self.transport.send(Recipient::Proxies, proxy_add(&instance));
        Ok(())
    }

    pub fn instance_info(&self, id: &str) -> SchedulerResult<InstanceInfo> {
        let instance = self.instance(id)?;
        Ok(InstanceInfo {
            instance: instance.id().clone(),
            kind: instance.kind(),
            address: instance.address().to_string(),
            port: instance.port(),
            max_players: instance.max_players(),
        })
    }

    // ── Stop path ──────────────────────────────────────────────────

    /// Stop an instance gracefully, running `on_stopped` once it is gone.
    ///
    /// A duplicate request is a no-op and its callback is dropped.
    pub fn request_stop(
        &self,
        id: &str,
        on_stopped: Option<StopCallback>,
    ) -> SchedulerResult<StopOutcome> {
        let instance = self.instance(id)?;
        let id = instance.id().clone();

        let mut on_stopped = on_stopped;
        let outcome = instance.with_lifecycle(|l| {
            if l.state.is_stopping() {
                return StopOutcome::AlreadyStopping;
            }
            if l.on_stopped.is_none() {
                l.on_stopped = on_stopped.take();
            }
            if l.state.is_starting() {
                l.stop_requested = true;
                return StopOutcome::DeferredUntilStarted;
            }
            l.state = LifecycleState::MarkedForStop;
            StopOutcome::Enrolled
        });

        match outcome {
            StopOutcome::AlreadyStopping => {
                debug!(instance = %id, "already stopping, request ignored");
            }
            StopOutcome::DeferredUntilStarted => {
                info!(instance = %id, "stop deferred until server registers");
            }
            StopOutcome::Enrolled => self.enroll_stop(instance),
        }
        Ok(outcome)
    }

    fn enroll_stop(&self, instance: Arc<Instance>) {
        let id = instance.id().clone();
        self.registry.unmark_running(&id);
        self.heartbeat.stop(&id);

        // Gates exist before the workflow does, so an early ack is kept.
        let gates = Arc::new(ShutdownGates::default());
        self.shutdowns.insert(id.clone(), Arc::clone(&gates));

        match self.registry.stop_queue().push(&id) {
            Enqueued::Head => self.begin_shutdown(instance, gates, ShutdownEntry::Graceful),
            Enqueued::Behind(ahead) => info!(instance = %id, ahead, "queued for shutdown"),
            Enqueued::AlreadyQueued => debug!(instance = %id, "already queued for shutdown"),
        }
    }

    fn begin_shutdown(&self, instance: Arc<Instance>, gates: Arc<ShutdownGates>, entry: ShutdownEntry) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(me.run_shutdown(instance, gates, entry));
    }

    /// Take a running server out of service without the graceful stages.
    ///
    /// Returns false if the instance is not running.
    pub fn force_stop(&self, id: &str, reason: UnresponsiveReason) -> bool {
        let Ok(instance) = self.instance(id) else {
            return false;
        };
        let id = instance.id().clone();

        let forced = instance.with_lifecycle(|l| {
            if l.state == LifecycleState::Running {
                l.state = LifecycleState::Stopping(ShutdownStage::ForceTerminate);
                true
            } else {
                false
            }
        });
        if !forced {
            debug!(instance = %id, state = %instance.state(), "not running, force stop ignored");
            return false;
        }

        warn!(instance = %id, ?reason, "forcing shutdown");
        self.registry.unmark_running(&id);
        self.heartbeat.stop(&id);
        let gates = Arc::new(ShutdownGates::default());
        self.shutdowns.insert(id, Arc::clone(&gates));
        self.begin_shutdown(instance, gates, ShutdownEntry::Forced);
        true
    }

    /// The workflow finished: remove the instance and advance the queue.
    pub fn notify_stopped(&self, id: &str) {
        let Some(instance) = self.registry.remove(id) else {
            warn!(instance = %id, "stop reported for instance no longer in registry");
            return;
        };
        let id = instance.id().clone();

        self.heartbeat.stop(&id);
        self.shutdowns.remove(&id);
        let promoted = self
            .registry
            .stop_queue()
            .remove(&id)
            .and_then(|r| r.promoted);
        info!(instance = %id, kind = %instance.kind(), "server removed");

        if let Some(callback) = instance.take_stop_callback() {
            callback(&id);
        }
        self.after_removal(&instance);
        self.advance_stop_queue(promoted);
    }

    fn advance_stop_queue(&self, mut next: Option<InstanceId>) {
        while let Some(id) = next.take() {
            let instance = self.registry.get(&id);
            let gates = self.shutdowns.get(&id).map(|g| Arc::clone(g.value()));
            match (instance, gates) {
                (Some(instance), Some(gates)) => {
                    self.begin_shutdown(instance, gates, ShutdownEntry::Graceful);
                    return;
                }
                _ => {
                    warn!(instance = %id, "queued shutdown lost its instance, skipping");
                    next = self
                        .registry
                        .stop_queue()
                        .remove(&id)
                        .and_then(|r| r.promoted);
                }
            }
        }
    }

    fn after_removal(&self, instance: &Instance) {
        match instance.kind() {
            ServerKind::Lobby => self.broadcast_lobby_info(),
            ServerKind::Attack => self.broadcast_attack_count(),
            kind if kind.is_minigame() => {
                let was_lobby =
                    instance.with_lifecycle(|l| l.match_state == Some(MatchState::Lobby));
                let decision = self.capacity.on_pool_member_removed(kind, was_lobby);
                self.apply_decision(decision);
            }
            _ => {}
        }
    }

    /// Stop an instance and create a fresh one of the same kind once it is
    /// gone.
    pub fn request_restart(&self, id: &str) -> SchedulerResult<StopOutcome> {
        let kind = self.instance(id)?.kind();
        let me = self.me.clone();
        let recreate: StopCallback = Box::new(move |old| {
            let Some(coordinator) = me.upgrade() else {
                return;
            };
            match coordinator.request_create(kind) {
                Ok(new) => info!(old = %old, new = %new, "instance restarted"),
                Err(e) => warn!(old = %old, error = %e, "restart could not recreate instance"),
            }
        });
        self.request_stop(id, Some(recreate))
    }

    // ── Acknowledgements ───────────────────────────────────────────

    /// Stage 1 acknowledgement. Returns false if it changed nothing.
    pub fn acknowledge_proxy_removal(&self, id: &str) -> bool {
        let Some(gates) = self.shutdowns.get(id).map(|g| Arc::clone(g.value())) else {
            warn!(instance = %id, "proxy removal acknowledged with no shutdown in progress");
            return false;
        };
        let accepted = gates.proxy_removed.acknowledge();
        if !accepted {
            debug!(instance = %id, "late or duplicate proxy acknowledgement ignored");
        }
        accepted
    }

    /// Stage 2 acknowledgement. Returns false if it changed nothing.
    pub fn acknowledge_disconnect(&self, id: &str) -> bool {
        let Some(gates) = self.shutdowns.get(id).map(|g| Arc::clone(g.value())) else {
            warn!(instance = %id, "graceful disconnect with no shutdown in progress");
            return false;
        };
        let accepted = gates.disconnected.acknowledge();
        if !accepted {
            debug!(instance = %id, "late or duplicate disconnect acknowledgement ignored");
        }
        accepted
    }

    /// Any message from a server counts as a heartbeat.
    pub fn record_activity(&self, id: &str) -> bool {
        self.heartbeat.record_response(id)
    }

    // ── Load signals ───────────────────────────────────────────────

    pub fn update_players(&self, id: &str, count: u32) -> SchedulerResult<()> {
        let instance = self.instance(id)?;
        instance.set_players(count);
        if instance.kind() == ServerKind::Lobby {
            self.broadcast_lobby_info();
        }
        Ok(())
    }

    pub fn network_players(&self, count: u32) {
        let lobbies: Vec<LobbyLoad> = self
            .registry
            .running_of_kind(ServerKind::Lobby)
            .iter()
            .map(|i| LobbyLoad {
                id: i.id().clone(),
                max_players: i.max_players(),
                seq: i.seq(),
            })
            .collect();
        let decision = self.capacity.on_network_players(count, &lobbies);
        self.apply_decision(decision);
    }

    pub fn match_status(&self, id: &str, state: MatchState) -> SchedulerResult<()> {
        let instance = self.instance(id)?;
        let kind = instance.kind();
        if !kind.is_minigame() {
            warn!(instance = %id, %kind, "match status from a non-minigame server ignored");
            return Ok(());
        }
        let previous = instance.with_lifecycle(|l| l.match_state.replace(state));
        let decision = self.capacity.on_match_state(kind, id, previous, state);
        self.apply_decision(decision);
        Ok(())
    }

    fn apply_decision(&self, decision: ScaleDecision) {
        match decision {
            ScaleDecision::Create(kind) => {
                if self.is_draining() {
                    debug!(%kind, "draining, automatic creation suppressed");
                    return;
                }
                // Rejections are logged by request_create.
                let _ = self.request_create(kind);
            }
            ScaleDecision::Stop(id) => {
                let _ = self.request_stop(&id, None);
            }
            ScaleDecision::NoChange => {}
        }
    }

    // ── Broadcasts ─────────────────────────────────────────────────

    fn broadcast_lobby_info(&self) {
        let lobbies = self
            .registry
            .running_of_kind(ServerKind::Lobby)
            .iter()
            .map(|i| LobbySummary {
                id: i.id().clone(),
                players: i.players(),
                max_players: i.max_players(),
            })
            .collect();
        self.transport
            .send(Recipient::Broadcast, OutboundEvent::LobbyInfo { lobbies });
    }

    fn broadcast_attack_count(&self) {
        let count = self.registry.running_of_kind(ServerKind::Attack).len();
        self.transport
            .send(Recipient::Broadcast, OutboundEvent::AttackServerCount { count });
    }

    // ── Bulk operations ────────────────────────────────────────────

    /// Stop every instance of `kind`. Instances still waiting in the start
    /// queue are dropped without launching. Returns how many were affected.
    pub fn shutdown_all_of_kind(&self, kind: ServerKind) -> usize {
        let of_kind: HashSet<InstanceId> = self
            .registry
            .of_kind(kind)
            .iter()
            .map(|i| i.id().clone())
            .collect();

        let purged = self
            .registry
            .start_queue()
            .purge_waiting(|id| of_kind.contains(id));
        for id in &purged {
            debug!(instance = %id, "dropped from start queue");
            self.drop_unlaunched(id);
        }

        let stopped = self
            .registry
            .of_kind(kind)
            .iter()
            .filter_map(|i| self.request_stop(i.id(), None).ok())
            .filter(|outcome| *outcome != StopOutcome::AlreadyStopping)
            .count();

        info!(%kind, dropped = purged.len(), stopped, "shutting down kind");
        purged.len() + stopped
    }

    /// Stop the whole fleet, proxies last. Automatic replacements stay off
    /// until `start_default_set` runs again.
    pub fn shutdown_all(&self) -> usize {
        self.draining.store(true, Ordering::Release);
        info!(instances = self.registry.len(), "shutting down fleet");
        self.config
            .kinds_by_priority()
            .into_iter()
            .rev()
            .map(|(kind, _)| self.shutdown_all_of_kind(kind))
            .sum()
    }

    /// Restart every instance of `kind`. Returns how many were enrolled.
    pub fn restart_all_of_kind(&self, kind: ServerKind) -> usize {
        self.registry
            .of_kind(kind)
            .iter()
            .filter_map(|i| self.request_restart(i.id()).ok())
            .filter(|outcome| *outcome != StopOutcome::AlreadyStopping)
            .count()
    }

    /// Bring each kind up to its startup count, highest priority first.
    pub fn start_default_set(&self) -> Vec<InstanceId> {
        self.draining.store(false, Ordering::Release);
        let mut created = Vec::new();

        for (kind, policy) in self.config.kinds_by_priority() {
            if self.registry.is_expired(kind) {
                debug!(%kind, "kind in expire mode, skipped in default set");
                continue;
            }
            let known = self.registry.count_of_kind(kind);
            for _ in known..policy.startup as usize {
                match self.request_create(kind) {
                    Ok(id) => created.push(id),
                    Err(_) => break,
                }
            }
        }

        info!(created = created.len(), "default set requested");
        created
    }

    // ── Expire mode ────────────────────────────────────────────────

    pub fn set_expire(&self, kind: ServerKind) -> bool {
        let changed = self.registry.set_expired(kind, true);
        if changed {
            info!(%kind, "expire mode on");
        }
        changed
    }

    pub fn clear_expire(&self, kind: ServerKind) -> bool {
        let changed = self.registry.set_expired(kind, false);
        if changed {
            info!(%kind, "expire mode off");
        }
        changed
    }

    // ── Introspection ──────────────────────────────────────────────

    pub fn snapshot(&self) -> FleetSnapshot {
        self.registry.snapshot()
    }

    /// Wait until the registry is empty or `timeout` passes. Returns
    /// whether the fleet drained.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let poll = async {
            while !self.registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        let drained = tokio::time::timeout(timeout, poll).await.is_ok();
        if !drained {
            warn!(remaining = self.registry.len(), "fleet did not drain in time");
        }
        self.heartbeat.stop_all();
        drained
    }

    fn probe(&self) -> Arc<dyn LivenessProbe> {
        Arc::new(CoordinatorProbe {
            coordinator: self.me.clone(),
        })
    }
}

fn proxy_add(instance: &Instance) -> OutboundEvent {
    OutboundEvent::ProxyAddInstance {
        instance: instance.id().clone(),
        name: instance.id().clone(),
        address: instance.address().to_string(),
        port: instance.port(),
    }
}

/// Bridges the heartbeat monitor back into the coordinator.
struct CoordinatorProbe {
    coordinator: Weak<Coordinator>,
}

#[async_trait]
impl LivenessProbe for CoordinatorProbe {
    async fn process_alive(&self, id: &InstanceId) -> bool {
        match self.coordinator.upgrade() {
            Some(c) => c.launcher.is_alive(id).await,
            None => true,
        }
    }

    async fn send_probe(&self, id: &InstanceId, final_attempt: bool) {
        if let Some(c) = self.coordinator.upgrade() {
            c.transport.send(
                Recipient::Instance(id.clone()),
                OutboundEvent::AliveRequest {
                    instance: id.clone(),
                    final_attempt,
                },
            );
        }
    }

    async fn unresponsive(&self, id: &InstanceId, reason: UnresponsiveReason) {
        if let Some(c) = self.coordinator.upgrade() {
            c.force_stop(id, reason);
        }
    }
}
