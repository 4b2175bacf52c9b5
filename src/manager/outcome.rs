//! Results of session manager operations.

use serde::Serialize;

use crate::group::GroupId;
use crate::process::Termination;
use crate::session::{CloseReason, ResourceKey};

/// A session that left the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosedSession {
    pub key: ResourceKey,
    pub pid: u32,
    pub reason: CloseReason,
    /// What happened to the process. Bookkeeping is released either way.
    pub termination: Termination,
    /// Group the session belonged to.
    pub group_id: Option<GroupId>,
    /// Whether its group was deleted because it became empty.
    pub dissolved_group: bool,
}

impl ClosedSession {
    /// The process could not be confirmed dead and may have leaked.
    pub fn leak_suspected(&self) -> bool {
        !self.termination.is_confirmed()
    }
}

/// Result of an open request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new process was launched and recorded.
    Opened {
        key: ResourceKey,
        pid: u32,
        /// Sessions closed to make room: replaced interactive sessions and
        /// evictions.
        displaced: Vec<ClosedSession>,
    },
    /// The resource already had an active session; it was reused.
    AlreadyOpen { key: ResourceKey },
}

impl OpenOutcome {
    pub fn key(&self) -> &ResourceKey {
        match self {
            OpenOutcome::Opened { key, .. } | OpenOutcome::AlreadyOpen { key } => key,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, OpenOutcome::Opened { .. })
    }

    pub fn displaced(&self) -> &[ClosedSession] {
        match self {
            OpenOutcome::Opened { displaced, .. } => displaced,
            OpenOutcome::AlreadyOpen { .. } => &[],
        }
    }
}

/// Result of a close request. Closing is idempotent, so both variants are
/// success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed(ClosedSession),
    AlreadyClosed,
}

impl CloseOutcome {
    pub fn leak_suspected(&self) -> bool {
        matches!(self, CloseOutcome::Closed(closed) if closed.leak_suspected())
    }
}

/// Result of closing a whole group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupClosed {
    pub id: GroupId,
    /// Members whose bookkeeping was released.
    pub closed: usize,
    /// Members the group had when the close started.
    pub total: usize,
    pub sessions: Vec<ClosedSession>,
}

impl GroupClosed {
    /// Members whose process could not be confirmed dead.
    pub fn leaked(&self) -> usize {
        self.sessions.iter().filter(|s| s.leak_suspected()).count()
    }

    /// Every member closed and confirmed dead.
    pub fn is_complete(&self) -> bool {
        self.closed == self.total && self.leaked() == 0
    }
}
