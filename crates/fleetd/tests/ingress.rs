//! Ingress over a real TCP socket.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

use fleet_core::{FleetConfig, ServerKind};
use fleetd::ingress::{self, Hub};
use fleetgrid_scheduler::{ChannelTransport, Coordinator, LaunchSpec, Launcher, Reclaim};
use fleetgrid_state::{InstanceId, LifecycleState};

struct IdleLauncher;

#[async_trait]
impl Launcher for IdleLauncher {
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

/// Coordinator plus a live ingress on an ephemeral port.
async fn start_ingress() -> (Arc<Coordinator>, SocketAddr) {
    let (transport, outbound) = ChannelTransport::new();
    let coordinator = Coordinator::new(
        FleetConfig::default(),
        Arc::new(IdleLauncher),
        Arc::new(transport),
    );
    let hub = Hub::new(Arc::clone(&coordinator));
    tokio::spawn(ingress::pump(Arc::clone(&hub), outbound));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(ingress::serve(listener, hub));
    (coordinator, addr)
}

async fn connect_as(
    addr: SocketAddr,
    id: &InstanceId,
) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    write
        .write_all(format!("{{\"event\":\"client-registered\",\"instance\":\"{id}\"}}\n").as_bytes())
        .await
        .unwrap();
    let reply = next_event(&mut lines, "instance-info").await;
    assert_eq!(reply["instance"], id.as_str());
    (lines, write)
}

async fn next_event(lines: &mut Lines<BufReader<OwnedReadHalf>>, name: &str) -> serde_json::Value {
    loop {
        let line = lines.next_line().await.unwrap().unwrap();
        let event: serde_json::Value = serde_json::from_str(&line).unwrap();
        if event["event"] == name {
            return event;
        }
    }
}

async fn wait_until_empty(coordinator: &Coordinator) {
    for _ in 0..50 {
        if coordinator.registry().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(coordinator.registry().is_empty());
}

#[tokio::test]
async fn server_registers_and_is_asked_to_disconnect() {
    let (coordinator, addr) = start_ingress().await;
    let id = coordinator.request_create(ServerKind::Lobby).unwrap();

    let (mut lines, mut write) = connect_as(addr, &id).await;
    assert_eq!(
        coordinator.registry().get(&id).unwrap().state(),
        LifecycleState::Running
    );

    // The server asks to be stopped; with no proxies the next thing it
    // hears is the disconnect request.
    write
        .write_all(b"{\"event\":\"request-stop\"}\n")
        .await
        .unwrap();
    let event = next_event(&mut lines, "disconnect-gracefully").await;
    assert_eq!(event["instance"], id.as_str());

    write
        .write_all(
            format!("{{\"event\":\"client-disconnected-gracefully\",\"instance\":\"{id}\"}}\n")
                .as_bytes(),
        )
        .await
        .unwrap();
    wait_until_empty(&coordinator).await;
}

#[tokio::test]
async fn admin_stop_reaches_server_connection() {
    let (coordinator, addr) = start_ingress().await;
    let router = fleetgrid_api::build_router(Arc::clone(&coordinator));

    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/kinds/build/instances")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id: InstanceId = "Build-01".to_string();

    let (mut lines, mut write) = connect_as(addr, &id).await;

    let resp = router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/instances/Build-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    next_event(&mut lines, "disconnect-gracefully").await;
    write
        .write_all(b"{\"event\":\"client-disconnected-gracefully\",\"instance\":\"Build-01\"}\n")
        .await
        .unwrap();
    wait_until_empty(&coordinator).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registering_proxy_learns_running_servers() {
    let (coordinator, addr) = start_ingress().await;

    let lobby = coordinator.request_create(ServerKind::Lobby).unwrap();
    let (_lobby_lines, _lobby_write) = connect_as(addr, &lobby).await;

    let proxy = coordinator.request_create(ServerKind::Proxy).unwrap();
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    write
        .write_all(format!("{{\"event\":\"client-registered\",\"instance\":\"{proxy}\"}}\n").as_bytes())
        .await
        .unwrap();

    // The announcement may arrive before or after the registration reply.
    let mut replied = false;
    let mut announced = None;
    while !(replied && announced.is_some()) {
        let line = lines.next_line().await.unwrap().unwrap();
        let event: serde_json::Value = serde_json::from_str(&line).unwrap();
        match event["event"].as_str() {
            Some("instance-info") => replied = true,
            Some("proxy-add-instance") => announced = Some(event),
            _ => {}
        }
    }
    let announced = announced.unwrap();
    assert_eq!(announced["instance"], lobby.as_str());
    assert_eq!(announced["port"], 30000);
}
