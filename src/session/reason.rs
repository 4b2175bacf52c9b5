//! Why a session was closed.

use std::fmt;

use serde::{Serialize, Serializer};

use super::SessionContext;

/// Reason recorded when a session leaves the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Explicit close by a caller.
    Manual,
    /// The underlying process was found dead by a sweep.
    ProcessDied,
    /// Idle longer than the TTL of its context.
    Expired(SessionContext),
    /// Evicted for a higher-priority open.
    PriorityPreemption,
    /// Evicted as the oldest non-exempt session.
    AutoCloseOldest,
    /// Replaced by a newer interactive session.
    SequentialInteractive,
    /// Closed as part of a group close.
    Group(Box<CloseReason>),
    /// Manager shutdown.
    Shutdown,
    /// Caller-supplied reason.
    Other(String),
}

impl CloseReason {
    /// Whether the close was triggered automatically rather than by a caller.
    pub fn is_automatic(&self) -> bool {
        matches!(
            self,
            CloseReason::ProcessDied
                | CloseReason::Expired(_)
                | CloseReason::PriorityPreemption
                | CloseReason::AutoCloseOldest
                | CloseReason::SequentialInteractive
        )
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Manual => f.write_str("manual_close"),
            CloseReason::ProcessDied => f.write_str("process_died"),
            CloseReason::Expired(context) => write!(f, "expired_{context}"),
            CloseReason::PriorityPreemption => f.write_str("priority_preemption"),
            CloseReason::AutoCloseOldest => f.write_str("auto_close_oldest"),
            CloseReason::SequentialInteractive => f.write_str("sequential_interactive"),
            CloseReason::Group(inner) => write!(f, "{inner}_group"),
            CloseReason::Shutdown => f.write_str("shutdown"),
            CloseReason::Other(reason) => f.write_str(reason),
        }
    }
}

impl Serialize for CloseReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
