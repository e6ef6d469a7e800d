//! Coordinator error types.

use thiserror::Error;

use fleet_core::ServerKind;
use fleetgrid_state::StateError;

/// Reasons a lifecycle request is rejected.
///
/// A rejection never changes fleet state; the caller logs and moves on.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown instance: {0}")]
    UnknownInstance(String),

    #[error("unknown server kind: {0}")]
    UnknownKind(String),

    #[error("{0} is in expire mode, creation rejected")]
    KindExpired(ServerKind),

    #[error("{kind} already has {max} instances")]
    KindAtCapacity { kind: ServerKind, max: u32 },

    #[error("RAM budget exceeded: requested {requested} MB, {available} MB available")]
    RamBudgetExceeded { requested: u64, available: u64 },

    #[error("stop request carries no instance and the sender never registered")]
    MissingIdentity,

    #[error("registry error: {0}")]
    State(StateError),

    #[error("launch failed: {0}")]
    Launch(#[from] anyhow::Error),
}

impl From<StateError> for SchedulerError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::RamBudgetExceeded {
                requested,
                available,
            } => SchedulerError::RamBudgetExceeded {
                requested,
                available,
            },
            StateError::UnknownInstance(id) => SchedulerError::UnknownInstance(id),
            other => SchedulerError::State(other),
        }
    }
}

impl From<fleet_core::UnknownKind> for SchedulerError {
    fn from(err: fleet_core::UnknownKind) -> Self {
        SchedulerError::UnknownKind(err.0)
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
