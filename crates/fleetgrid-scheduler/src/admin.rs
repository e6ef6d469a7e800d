//! Administrative commands, independent of how they arrive.

use serde::{Deserialize, Serialize};
use tracing::info;

use fleet_core::ServerKind;
use fleetgrid_state::{FleetSnapshot, InstanceId};

use crate::coordinator::{Coordinator, StopOutcome};
use crate::error::SchedulerResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum AdminCommand {
    CreateByKind { kind: ServerKind },
    StopInstance { instance: InstanceId },
    StopAllOfKind { kind: ServerKind },
    StopAll,
    RestartInstance { instance: InstanceId },
    RestartAllOfKind { kind: ServerKind },
    StartDefaultSet,
    SetExpire { kind: ServerKind },
    ClearExpire { kind: ServerKind },
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "kebab-case")]
pub enum AdminReply {
    Created { instances: Vec<InstanceId> },
    Stop { instance: InstanceId, outcome: String },
    /// Number of instances a bulk command touched.
    Affected { count: usize },
    /// Whether an expire toggle changed anything.
    Expire { kind: ServerKind, changed: bool },
    Fleet(FleetSnapshot),
}

fn outcome_label(outcome: StopOutcome) -> &'static str {
    match outcome {
        StopOutcome::Enrolled => "enrolled",
        StopOutcome::DeferredUntilStarted => "deferred",
        StopOutcome::AlreadyStopping => "already_stopping",
    }
}

impl Coordinator {
    /// Run one administrative command.
    pub fn execute(&self, command: AdminCommand) -> SchedulerResult<AdminReply> {
        info!(?command, "admin command");
        let reply = match command {
            AdminCommand::CreateByKind { kind } => AdminReply::Created {
                instances: vec![self.request_create(kind)?],
            },
            AdminCommand::StopInstance { instance } => {
                let outcome = self.request_stop(&instance, None)?;
                AdminReply::Stop {
                    instance,
                    outcome: outcome_label(outcome).to_string(),
                }
            }
            AdminCommand::StopAllOfKind { kind } => AdminReply::Affected {
                count: self.shutdown_all_of_kind(kind),
            },
            AdminCommand::StopAll => AdminReply::Affected {
                count: self.shutdown_all(),
            },
            AdminCommand::RestartInstance { instance } => {
                let outcome = self.request_restart(&instance)?;
                AdminReply::Stop {
                    instance,
                    outcome: outcome_label(outcome).to_string(),
                }
            }
            AdminCommand::RestartAllOfKind { kind } => AdminReply::Affected {
                count: self.restart_all_of_kind(kind),
            },
            AdminCommand::StartDefaultSet => AdminReply::Created {
                instances: self.start_default_set(),
            },
            AdminCommand::SetExpire { kind } => AdminReply::Expire {
                kind,
                changed: self.set_expire(kind),
            },
            AdminCommand::ClearExpire { kind } => AdminReply::Expire {
                kind,
                changed: self.clear_expire(kind),
            },
            AdminCommand::List => AdminReply::Fleet(self.snapshot()),
        };
        Ok(reply)
    }
}
