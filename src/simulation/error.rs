//! Engine error type.
//!
//! Every command failure is reported synchronously and leaves the engine
//! untouched. Tick-level out-of-range values are clamped, never surfaced here.

use thiserror::Error;

/// What kind of entity a lookup failed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Signal,
    Vehicle,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntityKind::Signal => "signal",
            EntityKind::Vehicle => "vehicle",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("invalid signal state: {0:?} (expected red, yellow or green)")]
    InvalidState(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    pub fn signal_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: EntityKind::Signal,
            id: id.into(),
        }
    }

    pub fn vehicle_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: EntityKind::Vehicle,
            id: id.into(),
        }
    }
}

/// Shorthand result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
