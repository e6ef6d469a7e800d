//! Error types for the instance registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while mutating the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("unknown instance: {0}")]
    UnknownInstance(String),

    #[error("RAM budget exceeded: requested {requested} MB, {available} MB available")]
    RamBudgetExceeded { requested: u64, available: u64 },

    #[error("no free port above {0}")]
    NoFreePort(u16),
}
