//! Wire events exchanged with servers and proxies.
//!
//! Both directions are closed enums; the router matches them exhaustively.
//! On the wire each event is one JSON object tagged by `"event"`.

use serde::{Deserialize, Serialize};

use fleet_core::{MatchState, ServerKind};
use fleetgrid_state::InstanceId;

/// Events a server, proxy, or operator sends to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// The server booted and wants its identity.
    ClientRegistered { instance: InstanceId },
    /// The server is accepting players; proxies may route to it.
    ClientStarted { instance: InstanceId },
    /// Answer to `DisconnectGracefully`.
    ClientDisconnectedGracefully { instance: InstanceId },
    /// A proxy dropped the server from its routing table.
    ProxyRemovedInstanceAck { instance: InstanceId },
    /// Answer to `AliveRequest`.
    ClientAliveResponse { instance: InstanceId },
    InstancePlayerCount { instance: InstanceId, count: u32 },
    NetworkPlayerCount { count: u32 },
    MinigameStatus { instance: InstanceId, state: MatchState },
    RequestCreate { kind: ServerKind },
    /// Without an instance, the sender asks to stop itself.
    RequestStop {
        #[serde(default)]
        instance: Option<InstanceId>,
    },
    RequestRestart { instance: InstanceId },
}

impl InboundEvent {
    /// The instance the event is about, if it names one.
    pub fn subject(&self) -> Option<&InstanceId> {
        match self {
            InboundEvent::ClientRegistered { instance }
            | InboundEvent::ClientStarted { instance }
            | InboundEvent::ClientDisconnectedGracefully { instance }
            | InboundEvent::ProxyRemovedInstanceAck { instance }
            | InboundEvent::ClientAliveResponse { instance }
            | InboundEvent::InstancePlayerCount { instance, .. }
            | InboundEvent::MinigameStatus { instance, .. }
            | InboundEvent::RequestRestart { instance } => Some(instance),
            InboundEvent::RequestStop { instance } => instance.as_ref(),
            InboundEvent::NetworkPlayerCount { .. } | InboundEvent::RequestCreate { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::ClientRegistered { .. } => "client-registered",
            InboundEvent::ClientStarted { .. } => "client-started",
            InboundEvent::ClientDisconnectedGracefully { .. } => "client-disconnected-gracefully",
            InboundEvent::ProxyRemovedInstanceAck { .. } => "proxy-removed-instance-ack",
            InboundEvent::ClientAliveResponse { .. } => "client-alive-response",
            InboundEvent::InstancePlayerCount { .. } => "instance-player-count",
            InboundEvent::NetworkPlayerCount { .. } => "network-player-count",
            InboundEvent::MinigameStatus { .. } => "minigame-status",
            InboundEvent::RequestCreate { .. } => "request-create",
            InboundEvent::RequestStop { .. } => "request-stop",
            InboundEvent::RequestRestart { .. } => "request-restart",
        }
    }
}

/// Identity handed to a server when it registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub instance: InstanceId,
    pub kind: ServerKind,
    pub address: String,
    pub port: u16,
    pub max_players: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub id: InstanceId,
    pub players: u32,
    pub max_players: u32,
}

/// Events the coordinator sends out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum OutboundEvent {
    InstanceInfo(InstanceInfo),
    /// Ask the server to move its players off and disconnect.
    DisconnectGracefully { instance: InstanceId },
    /// Last in-band word before the process is killed.
    ShutdownCommand { instance: InstanceId },
    AliveRequest { instance: InstanceId, final_attempt: bool },
    /// Ask proxies to stop routing to the server.
    ProxyRemoveRequest { instance: InstanceId },
    ProxyAddInstance {
        instance: InstanceId,
        name: String,
        address: String,
        port: u16,
    },
    LobbyInfo { lobbies: Vec<LobbySummary> },
    AttackServerCount { count: usize },
}
