//! Event router: dispatches inbound wire events to coordinator operations.

use std::sync::Arc;

use tracing::{debug, warn};

use fleetgrid_state::InstanceId;

use crate::coordinator::Coordinator;
use crate::error::{SchedulerError, SchedulerResult};
use crate::events::{InboundEvent, OutboundEvent};

/// Routes events from one connection or operator into the coordinator.
#[derive(Clone)]
pub struct EventRouter {
    coordinator: Arc<Coordinator>,
}

impl EventRouter {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Handle one event.
    ///
    /// `origin` is the registered identity of the sending connection, if
    /// any. Returns the direct reply to the sender, if the event has one.
    pub fn dispatch(
        &self,
        origin: Option<&InstanceId>,
        event: InboundEvent,
    ) -> SchedulerResult<Option<OutboundEvent>> {
        let c = &self.coordinator;
        debug!(event = event.name(), origin = origin.map(String::as_str), "inbound event");

        // Anything a server says proves the sender is alive. Before it has
        // registered, a connection can only speak for itself by registering.
        let speaker = match (origin, &event) {
            (Some(origin), _) => Some(origin),
            (None, InboundEvent::ClientRegistered { instance }) => Some(instance),
            (None, _) => None,
        };
        if let Some(speaker) = speaker {
            c.record_activity(speaker);
        }

        match event {
            InboundEvent::ClientRegistered { instance } => {
                c.notify_started(&instance)?;
                let info = c.instance_info(&instance)?;
                Ok(Some(OutboundEvent::InstanceInfo(info)))
            }
            InboundEvent::ClientStarted { instance } => {
                c.announce_to_proxies(&instance)?;
                Ok(None)
            }
            InboundEvent::ClientDisconnectedGracefully { instance } => {
                c.acknowledge_disconnect(&instance);
                Ok(None)
            }
            InboundEvent::ProxyRemovedInstanceAck { instance } => {
                c.acknowledge_proxy_removal(&instance);
                Ok(None)
            }
            InboundEvent::ClientAliveResponse { .. } => Ok(None),
            InboundEvent::InstancePlayerCount { instance, count } => {
                c.update_players(&instance, count)?;
                Ok(None)
            }
            InboundEvent::NetworkPlayerCount { count } => {
                c.network_players(count);
                Ok(None)
            }
            InboundEvent::MinigameStatus { instance, state } => {
                c.match_status(&instance, state)?;
                Ok(None)
            }
            InboundEvent::RequestCreate { kind } => {
                c.request_create(kind)?;
                Ok(None)
            }
            InboundEvent::RequestStop { instance } => {
                let Some(target) = instance.or_else(|| origin.cloned()) else {
                    warn!("stop request from unregistered sender without instance");
                    return Err(SchedulerError::MissingIdentity);
                };
                c.request_stop(&target, None)?;
                Ok(None)
            }
            InboundEvent::RequestRestart { instance } => {
                c.request_restart(&instance)?;
                Ok(None)
            }
        }
    }
}
