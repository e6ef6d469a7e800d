//! Recording fakes for the launcher and transport.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use fleet_core::FleetConfig;
use fleetgrid_scheduler::{
    Coordinator, LaunchSpec, Launcher, OutboundEvent, Reclaim, Recipient, Transport,
};
use fleetgrid_state::InstanceId;

#[derive(Default)]
pub struct FakeLauncher {
    pub launched: Mutex<Vec<LaunchSpec>>,
    pub terminated: Mutex<Vec<InstanceId>>,
    pub reclaimed: Mutex<Vec<(InstanceId, Reclaim)>>,
    /// Launches of these ids fail.
    pub failing: Mutex<HashSet<InstanceId>>,
    /// Processes of these ids are gone.
    pub dead: Mutex<HashSet<InstanceId>>,
}

impl FakeLauncher {
    pub fn launched_ids(&self) -> Vec<InstanceId> {
        self.launched.lock().iter().map(|s| s.id.clone()).collect()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> anyhow::Result<()> {
        self.launched.lock().push(spec.clone());
        if self.failing.lock().contains(&spec.id) {
            anyhow::bail!("container for {} refused to start", spec.id);
        }
        Ok(())
    }

    async fn is_alive(&self, id: &InstanceId) -> bool {
        !self.dead.lock().contains(id)
    }

    async fn terminate(&self, id: &InstanceId) -> anyhow::Result<()> {
        self.terminated.lock().push(id.clone());
        Ok(())
    }

    async fn reclaim(&self, id: &InstanceId, disposition: &Reclaim) -> anyhow::Result<()> {
        self.reclaimed.lock().push((id.clone(), disposition.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(Recipient, OutboundEvent)>>,
}

impl RecordingTransport {
    pub fn count(&self, pred: impl Fn(&OutboundEvent) -> bool) -> usize {
        self.sent.lock().iter().filter(|(_, e)| pred(e)).count()
    }

    pub fn disconnects_for(&self, id: &str) -> usize {
        self.count(|e| matches!(e, OutboundEvent::DisconnectGracefully { instance } if instance == id))
    }

    pub fn lobby_infos(&self) -> usize {
        self.count(|e| matches!(e, OutboundEvent::LobbyInfo { .. }))
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for RecordingTransport {
    fn send(&self, to: Recipient, event: OutboundEvent) {
        self.sent.lock().push((to, event));
    }
}

pub struct Fleet {
    pub coordinator: Arc<Coordinator>,
    pub launcher: Arc<FakeLauncher>,
    pub transport: Arc<RecordingTransport>,
}

pub fn fleet(config: FleetConfig) -> Fleet {
    let launcher = Arc::new(FakeLauncher::default());
    let transport = Arc::new(RecordingTransport::default());
    let coordinator = Coordinator::new(config, launcher.clone(), transport.clone());
    Fleet {
        coordinator,
        launcher,
        transport,
    }
}

pub fn test_config() -> FleetConfig {
    let mut config = FleetConfig::default();
    config.heartbeat.threshold = 3;
    config
}

/// Let spawned tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Move the (paused) clock forward and let everything due run.
pub async fn advance(by: Duration) {
    tokio::time::sleep(by).await;
    settle().await;
}
