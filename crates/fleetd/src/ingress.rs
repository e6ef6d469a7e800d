//! Ingress: the JSON-lines TCP endpoint servers and proxies connect to.
//!
//! Each line on a connection is one `InboundEvent`. A connection takes on
//! the identity of the instance it registers as; outbound events addressed
//! to that instance are written back on it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fleet_core::ServerKind;
use fleetgrid_scheduler::{Coordinator, EventRouter, InboundEvent, OutboundEvent, Recipient};
use fleetgrid_state::InstanceId;

/// One registered connection.
struct Peer {
    conn: u64,
    tx: mpsc::UnboundedSender<String>,
}

/// Registered connections, keyed by instance.
pub struct Hub {
    router: EventRouter,
    peers: DashMap<InstanceId, Peer>,
    next_conn: AtomicU64,
}

impl Hub {
    pub fn new(coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            router: EventRouter::new(coordinator),
            peers: DashMap::new(),
            next_conn: AtomicU64::new(0),
        })
    }

    /// Registered instance ids, sorted.
    pub fn connected(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self.peers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Write an outbound event to every connection it is addressed to.
    pub fn deliver(&self, to: &Recipient, event: &OutboundEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound event");
                return;
            }
        };

        let targets: Vec<InstanceId> = match to {
            Recipient::Instance(id) => vec![id.clone()],
            Recipient::Proxies => self
                .router
                .coordinator()
                .registry()
                .running_of_kind(ServerKind::Proxy)
                .iter()
                .map(|i| i.id().clone())
                .collect(),
            Recipient::Broadcast => self.connected(),
        };

        for id in targets {
            match self.peers.get(&id) {
                Some(peer) => {
                    let _ = peer.tx.send(line.clone());
                }
                None => debug!(instance = %id, "no connection for outbound event"),
            }
        }
    }

    /// Handle one inbound line. Returns the reply line, if any.
    pub fn handle_line(
        &self,
        conn: u64,
        identity: &mut Option<InstanceId>,
        tx: &mpsc::UnboundedSender<String>,
        line: &str,
    ) -> Option<String> {
        let event: InboundEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(conn, error = %e, "malformed inbound line");
                return None;
            }
        };

        let registering = match &event {
            InboundEvent::ClientRegistered { instance } => Some(instance.clone()),
            _ => None,
        };

        // Bind before dispatching: registration itself queues events for
        // the new peer.
        let displaced = registering.as_ref().and_then(|id| {
            self.peers.insert(
                id.clone(),
                Peer {
                    conn,
                    tx: tx.clone(),
                },
            )
        });

        match self.router.dispatch(identity.as_ref(), event) {
            Ok(reply) => {
                if let Some(id) = registering {
                    *identity = Some(id);
                }
                reply.and_then(|r| serde_json::to_string(&r).ok())
            }
            Err(e) => {
                if let Some(id) = &registering {
                    match displaced {
                        Some(previous) => {
                            self.peers.insert(id.clone(), previous);
                        }
                        None => {
                            self.peers.remove_if(id, |_, peer| peer.conn == conn);
                        }
                    }
                }
                warn!(conn, origin = identity.as_deref(), error = %e, "inbound event rejected");
                None
            }
        }
    }

    fn disconnect(&self, conn: u64, identity: Option<&InstanceId>) {
        if let Some(id) = identity {
            // A newer connection may have taken over the identity.
            self.peers.remove_if(id, |_, peer| peer.conn == conn);
        }
    }
}

/// Forward events from the coordinator's transport channel to connections.
pub async fn pump(hub: Arc<Hub>, mut rx: mpsc::UnboundedReceiver<(Recipient, OutboundEvent)>) {
    while let Some((to, event)) = rx.recv().await {
        hub.deliver(&to, &event);
    }
}

/// Accept connections until the task is aborted.
pub async fn serve(listener: TcpListener, hub: Arc<Hub>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "ingress connection accepted");
                tokio::spawn(handle_connection(Arc::clone(&hub), stream));
            }
            Err(e) => warn!(error = %e, "ingress accept failed"),
        }
    }
}

async fn handle_connection(hub: Arc<Hub>, stream: TcpStream) {
    let conn = hub.next_conn.fetch_add(1, Ordering::Relaxed);
    let (read, mut write) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            if write.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut identity: Option<InstanceId> = None;
    let mut lines = BufReader::new(read).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(reply) = hub.handle_line(conn, &mut identity, &tx, &line) {
                    let _ = tx.send(reply);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(conn, error = %e, "ingress read failed");
                break;
            }
        }
    }

    hub.disconnect(conn, identity.as_ref());
    info!(conn, instance = identity.as_deref(), "ingress connection closed");
    drop(tx);
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use fleet_core::FleetConfig;
    use fleetgrid_scheduler::{LaunchSpec, Launcher, Reclaim, Transport};

    struct NullLauncher;

    #[async_trait]
    impl Launcher for NullLauncher {
        async fn launch(&self, _spec: &LaunchSpec) -> anyhow::Result<()> {
            Ok(())
        }
        async fn is_alive(&self, _id: &InstanceId) -> bool {
            true
        }
        async fn terminate(&self, _id: &InstanceId) -> anyhow::Result<()> {
            Ok(())
        }
        async fn reclaim(&self, _id: &InstanceId, _disposition: &Reclaim) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NullTransport;

    impl Transport for NullTransport {
        fn send(&self, _to: Recipient, _event: OutboundEvent) {}
    }

    fn hub() -> Arc<Hub> {
        Hub::new(Coordinator::new(
            FleetConfig::default(),
            Arc::new(NullLauncher),
            Arc::new(NullTransport),
        ))
    }

    #[tokio::test]
    async fn registration_binds_identity() {
        let hub = hub();
        let id = hub.router.coordinator().request_create(ServerKind::Lobby).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut identity = None;

        let reply = hub
            .handle_line(
                0,
                &mut identity,
                &tx,
                &format!(r#"{{"event":"client-registered","instance":"{id}"}}"#),
            )
            .unwrap();
        assert!(reply.contains(r#""event":"instance-info""#));
        assert_eq!(identity.as_deref(), Some("Lobby-01"));
        assert_eq!(hub.connected(), vec![id.clone()]);

        hub.deliver(
            &Recipient::Instance(id.clone()),
            &OutboundEvent::DisconnectGracefully { instance: id },
        );
        assert!(rx.recv().await.unwrap().contains("disconnect-gracefully"));
    }

    #[tokio::test]
    async fn bad_lines_are_dropped() {
        let hub = hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut identity = None;

        assert!(hub.handle_line(0, &mut identity, &tx, "not json").is_none());
        assert!(
            hub.handle_line(
                0,
                &mut identity,
                &tx,
                r#"{"event":"client-registered","instance":"Ghost-01"}"#
            )
            .is_none()
        );
        assert!(identity.is_none());
        assert!(hub.connected().is_empty());
    }

    #[tokio::test]
    async fn stale_connection_does_not_unbind_newer_one() {
        let hub = hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.peers.insert("Lobby-01".into(), Peer { conn: 2, tx });

        hub.disconnect(1, Some(&"Lobby-01".to_string()));
        assert_eq!(hub.connected(), vec!["Lobby-01".to_string()]);
        hub.disconnect(2, Some(&"Lobby-01".to_string()));
        assert!(hub.connected().is_empty());
    }
}
