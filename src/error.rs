//! Error types for docwarden.

use thiserror::Error;

use crate::session::SessionState;

/// Main error type for session manager operations.
#[derive(Error, Debug)]
pub enum DocWardenError {
    /// No slot could be freed because every active session is exempt.
    #[error("capacity exhausted: {active}/{max} sessions active and none can be evicted")]
    CapacityExhausted { active: usize, max: usize },

    /// Every launch strategy failed for the resource.
    #[error("failed to launch {key} after {attempts} attempt(s)")]
    LaunchFailed { key: String, attempts: usize },

    /// The resource to open does not exist on disk.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// No active session for the given resource key.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// No group with the given id.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// A group with the given id already exists.
    #[error("group already exists: {0}")]
    GroupExists(String),

    /// None of the requested members were active.
    #[error("group {0} has no active members")]
    EmptyGroup(String),

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: SessionState,
        to: SessionState,
    },

    /// Priority outside the supported range.
    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    /// Unrecognised session context name.
    #[error("invalid session context: {0}")]
    InvalidContext(String),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for docwarden operations.
pub type Result<T> = std::result::Result<T, DocWardenError>;
