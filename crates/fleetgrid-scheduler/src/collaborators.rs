//! Seams to the outside world: the process runtime and the wire transport.
//!
//! The coordinator never blocks on either. Launch, terminate, and reclaim
//! are awaited only inside spawned tasks; sends are fire-and-forget.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use fleet_core::ServerKind;
use fleetgrid_state::{Instance, InstanceId};

use crate::events::OutboundEvent;

/// Everything a launcher needs to bring up one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub id: InstanceId,
    pub kind: ServerKind,
    pub address: String,
    pub port: u16,
    pub ram_mb: u64,
    pub max_players: u32,
    /// Working directory survives removal (moved to backup).
    pub persistent: bool,
}

impl LaunchSpec {
    pub fn for_instance(instance: &Instance, persistent: bool) -> Self {
        Self {
            id: instance.id().clone(),
            kind: instance.kind(),
            address: instance.address().to_string(),
            port: instance.port(),
            ram_mb: instance.ram_mb(),
            max_players: instance.max_players(),
            persistent,
        }
    }
}

/// What to do with a removed server's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reclaim {
    /// Move it under the given backup directory.
    Backup(PathBuf),
    Delete,
}

/// Process or container runtime that hosts the servers.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Start the server. Returning `Ok` means the process is up, not that
    /// the server has registered.
    async fn launch(&self, spec: &LaunchSpec) -> anyhow::Result<()>;

    /// Whether the process or container still exists.
    async fn is_alive(&self, id: &InstanceId) -> bool;

    /// Kill the process or container.
    async fn terminate(&self, id: &InstanceId) -> anyhow::Result<()>;

    /// Release the server's working directory.
    async fn reclaim(&self, id: &InstanceId, disposition: &Reclaim) -> anyhow::Result<()>;
}

/// Who an outbound event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Instance(InstanceId),
    /// Every running proxy.
    Proxies,
    /// Every connected server.
    Broadcast,
}

/// Outbound half of the wire protocol.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, to: Recipient, event: OutboundEvent);
}

/// Transport that hands events to a channel for a writer task to deliver.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<(Recipient, OutboundEvent)>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(Recipient, OutboundEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, to: Recipient, event: OutboundEvent) {
        if self.tx.send((to, event)).is_err() {
            warn!("outbound channel closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_transport_delivers_in_order() {
        let (transport, mut rx) = ChannelTransport::new();
        transport.send(
            Recipient::Broadcast,
            OutboundEvent::AttackServerCount { count: 1 },
        );
        transport.send(
            Recipient::Instance("Lobby-01".into()),
            OutboundEvent::DisconnectGracefully {
                instance: "Lobby-01".into(),
            },
        );

        let (to, event) = rx.recv().await.unwrap();
        assert_eq!(to, Recipient::Broadcast);
        assert_eq!(event, OutboundEvent::AttackServerCount { count: 1 });
        let (to, _) = rx.recv().await.unwrap();
        assert_eq!(to, Recipient::Instance("Lobby-01".into()));
    }

    #[test]
    fn closed_channel_is_not_fatal() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);
        transport.send(Recipient::Proxies, OutboundEvent::AttackServerCount { count: 0 });
    }
}
