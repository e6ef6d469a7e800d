//! Heartbeat monitor: one background task per running instance.
//!
//! The `HeartbeatMonitor` spawns a ticking task for each instance that
//! enters `Running`, and cancels it the moment the instance leaves.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleet_core::HeartbeatConfig;
use fleetgrid_state::InstanceId;

use crate::tracker::{HeartbeatAction, HeartbeatTracker};

/// Why a monitor gave up on its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresponsiveReason {
    /// The server process or container no longer exists.
    ProcessGone,
    /// Both liveness probes went unanswered.
    ProbesExhausted,
}

/// The monitor's view of the outside world.
///
/// Implemented by the coordinator: it knows how to reach the server and
/// what to do with one that stopped answering.
#[async_trait]
pub trait LivenessProbe: Send + Sync + 'static {
    /// Whether the server's process or container still exists.
    async fn process_alive(&self, id: &InstanceId) -> bool;

    /// Ask the server to prove it is alive.
    async fn send_probe(&self, id: &InstanceId, final_attempt: bool);

    /// The server is gone or silent; take it out of service.
    async fn unresponsive(&self, id: &InstanceId, reason: UnresponsiveReason);
}

/// Timing parameters shared by every monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub period: Duration,
    pub warmup: Duration,
    pub threshold: u32,
}

impl From<&HeartbeatConfig> for MonitorSettings {
    fn from(config: &HeartbeatConfig) -> Self {
        Self {
            period: config.period(),
            warmup: config.warmup(),
            threshold: config.threshold,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&HeartbeatConfig::default())
    }
}

/// Per-instance monitor state.
struct MonitorSlot {
    /// Distinguishes this run from a later monitor for the same id.
    generation: u64,
    tracker: Arc<HeartbeatTracker>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Manages heartbeat monitors for all running instances.
pub struct HeartbeatMonitor {
    settings: MonitorSettings,
    monitors: Arc<DashMap<InstanceId, MonitorSlot>>,
    generations: AtomicU64,
}

impl HeartbeatMonitor {
    pub fn new(mut settings: MonitorSettings) -> Self {
        if settings.period.is_zero() {
            let fallback = MonitorSettings::default();
            warn!(period_ms = fallback.period.as_millis() as u64, "zero heartbeat period, using default");
            settings.period = fallback.period;
            settings.warmup = settings.warmup.max(fallback.period * 2);
        }
        Self {
            settings,
            monitors: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings
    }

    /// Start monitoring an instance, replacing any previous monitor for it.
    pub fn start(&self, id: &InstanceId, probe: Arc<dyn LivenessProbe>) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let tracker = Arc::new(HeartbeatTracker::new(self.settings.threshold));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_heartbeat_loop(
            id.clone(),
            generation,
            self.settings,
            Arc::clone(&tracker),
            probe,
            cancel.clone(),
            Arc::clone(&self.monitors),
        ));

        let slot = MonitorSlot {
            generation,
            tracker,
            cancel,
            handle,
        };
        if let Some(old) = self.monitors.insert(id.clone(), slot) {
            old.cancel.cancel();
            old.handle.abort();
        }

        debug!(instance = %id, period_secs = self.settings.period.as_secs(), "heartbeat monitor started");
    }

    /// Stop monitoring an instance. No-op if it has no monitor.
    pub fn stop(&self, id: &str) -> bool {
        match self.monitors.remove(id) {
            Some((_, slot)) => {
                slot.cancel.cancel();
                slot.handle.abort();
                debug!(instance = %id, "heartbeat monitor stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every monitor.
    pub fn stop_all(&self) {
        let ids: Vec<InstanceId> = self.monitors.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            self.stop(id);
        }
        info!(count = ids.len(), "all heartbeat monitors stopped");
    }

    /// The server sent something; reset its silent-tick counter.
    ///
    /// Returns false if the instance is not being monitored.
    pub fn record_response(&self, id: &str) -> bool {
        match self.monitors.get(id) {
            Some(slot) => {
                slot.tracker.reset();
                true
            }
            None => false,
        }
    }

    pub fn silent_ticks(&self, id: &str) -> Option<u32> {
        self.monitors.get(id).map(|slot| slot.tracker.silent_ticks())
    }

    pub fn is_monitoring(&self, id: &str) -> bool {
        self.monitors.contains_key(id)
    }

    pub fn active_monitors(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self.monitors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        for slot in self.monitors.iter() {
            slot.cancel.cancel();
            slot.handle.abort();
        }
    }
}

/// The heartbeat loop for a single instance.
async fn run_heartbeat_loop(
    id: InstanceId,
    generation: u64,
    settings: MonitorSettings,
    tracker: Arc<HeartbeatTracker>,
    probe: Arc<dyn LivenessProbe>,
    cancel: CancellationToken,
    monitors: Arc<DashMap<InstanceId, MonitorSlot>>,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(settings.warmup) => {}
    }

    let mut interval = tokio::time::interval(settings.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {
                if !probe.process_alive(&id).await {
                    warn!(instance = %id, "server process is gone");
                    break UnresponsiveReason::ProcessGone;
                }

                match tracker.tick() {
                    HeartbeatAction::Idle => {}
                    HeartbeatAction::Probe => {
                        debug!(instance = %id, silent_ticks = tracker.silent_ticks(), "sending liveness probe");
                        probe.send_probe(&id, false).await;
                    }
                    HeartbeatAction::FinalProbe => {
                        warn!(instance = %id, silent_ticks = tracker.silent_ticks(), "no response to liveness probe, sending final probe");
                        probe.send_probe(&id, true).await;
                    }
                    HeartbeatAction::Unresponsive => {
                        warn!(instance = %id, silent_ticks = tracker.silent_ticks(), "server unresponsive");
                        break UnresponsiveReason::ProbesExhausted;
                    }
                }
            }
        }
    };

    // Only escalate if this run still owns the slot; a concurrent stop means
    // the instance already left `Running` some other way.
    let owned = monitors
        .remove_if(&id, |_, slot| slot.generation == generation)
        .is_some();
    if owned {
        probe.unresponsive(&id, reason).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingProbe {
        dead: AtomicBool,
        probes: Mutex<Vec<(InstanceId, bool)>>,
        unresponsive: Mutex<Vec<(InstanceId, UnresponsiveReason)>>,
    }

    #[async_trait]
    impl LivenessProbe for RecordingProbe {
        async fn process_alive(&self, _id: &InstanceId) -> bool {
            !self.dead.load(Ordering::SeqCst)
        }

        async fn send_probe(&self, id: &InstanceId, final_attempt: bool) {
            self.probes.lock().push((id.clone(), final_attempt));
        }

        async fn unresponsive(&self, id: &InstanceId, reason: UnresponsiveReason) {
            self.unresponsive.lock().push((id.clone(), reason));
        }
    }

    fn settings() -> MonitorSettings {
        MonitorSettings {
            period: Duration::from_secs(10),
            warmup: Duration::from_secs(20),
            threshold: 3,
        }
    }

    fn id(s: &str) -> InstanceId {
        s.to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_escalates_to_unresponsive() {
        let monitor = HeartbeatMonitor::new(settings());
        let probe = Arc::new(RecordingProbe::default());
        monitor.start(&id("Lobby-01"), probe.clone());

        // Ticks land at 20s, 30s, 40s, 50s, 60s.
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(*probe.probes.lock(), vec![(id("Lobby-01"), false)]);
        assert!(probe.unresponsive.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(probe.probes.lock().len(), 2);
        assert!(probe.probes.lock()[1].1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            *probe.unresponsive.lock(),
            vec![(id("Lobby-01"), UnresponsiveReason::ProbesExhausted)]
        );
        assert!(!monitor.is_monitoring("Lobby-01"));
    }

    #[tokio::test(start_paused = true)]
    async fn response_resets_counter() {
        let monitor = HeartbeatMonitor::new(settings());
        let probe = Arc::new(RecordingProbe::default());
        monitor.start(&id("Lobby-01"), probe.clone());

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(monitor.silent_ticks("Lobby-01"), Some(2));
        assert!(monitor.record_response("Lobby-01"));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(probe.probes.lock().is_empty());
        assert_eq!(monitor.silent_ticks("Lobby-01"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_happens_during_warmup() {
        let monitor = HeartbeatMonitor::new(settings());
        let probe = Arc::new(RecordingProbe::default());
        probe.dead.store(true, Ordering::SeqCst);
        monitor.start(&id("Lobby-01"), probe.clone());

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(probe.unresponsive.lock().is_empty());
        assert_eq!(monitor.silent_ticks("Lobby-01"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_process_forces_stop_on_next_tick() {
        let monitor = HeartbeatMonitor::new(settings());
        let probe = Arc::new(RecordingProbe::default());
        monitor.start(&id("SW-01"), probe.clone());

        tokio::time::sleep(Duration::from_secs(25)).await;
        probe.dead.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(
            *probe.unresponsive.lock(),
            vec![(id("SW-01"), UnresponsiveReason::ProcessGone)]
        );
        assert!(probe.probes.lock().is_empty());
        assert!(!monitor.is_monitoring("SW-01"));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_monitor_never_escalates() {
        let monitor = HeartbeatMonitor::new(settings());
        let probe = Arc::new(RecordingProbe::default());
        monitor.start(&id("Lobby-01"), probe.clone());

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(monitor.stop("Lobby-01"));
        assert!(!monitor.stop("Lobby-01"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(probe.probes.lock().len(), 1);
        assert!(probe.unresponsive.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_still_detects_dead_process() {
        let monitor = HeartbeatMonitor::new(MonitorSettings {
            period: Duration::ZERO,
            warmup: Duration::ZERO,
            threshold: 3,
        });
        assert_eq!(monitor.settings().period, Duration::from_secs(10));

        let probe = Arc::new(RecordingProbe::default());
        probe.dead.store(true, Ordering::SeqCst);
        monitor.start(&id("Lobby-01"), probe.clone());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(
            *probe.unresponsive.lock(),
            vec![(id("Lobby-01"), UnresponsiveReason::ProcessGone)]
        );
        assert!(!monitor.is_monitoring("Lobby-01"));
    }

    #[tokio::test]
    async fn stop_all_clears_monitors() {
        let monitor = HeartbeatMonitor::new(settings());
        let probe = Arc::new(RecordingProbe::default());
        monitor.start(&id("Lobby-01"), probe.clone());
        monitor.start(&id("Lobby-02"), probe.clone());
        assert_eq!(monitor.active_monitors(), vec![id("Lobby-01"), id("Lobby-02")]);

        monitor.stop_all();
        assert!(monitor.active_monitors().is_empty());
        assert!(!monitor.record_response("Lobby-01"));
    }

    #[tokio::test]
    async fn restarting_a_monitor_replaces_it() {
        let monitor = HeartbeatMonitor::new(settings());
        let probe = Arc::new(RecordingProbe::default());
        monitor.start(&id("Lobby-01"), probe.clone());
        monitor.start(&id("Lobby-01"), probe.clone());
        assert_eq!(monitor.active_monitors().len(), 1);
        monitor.stop_all();
    }
}
