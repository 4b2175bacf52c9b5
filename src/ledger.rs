//! Session store, group registry and history as one unit.
//!
//! Every removal path (explicit close, eviction, expiry, reap) goes through
//! [`Ledger::release`] or [`Ledger::forget`], so group membership and history
//! stay consistent no matter why a session ends.

use tracing::{info, warn};

use crate::group::{GroupCreated, GroupId, GroupRegistry};
use crate::history::SessionHistory;
use crate::manager::ClosedSession;
use crate::process::{ProcessController, Termination};
use crate::session::{CloseReason, ResourceKey, Session, SessionState, SessionStore};
use crate::Result;

#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pub store: SessionStore,
    pub groups: GroupRegistry,
    pub history: SessionHistory,
}

impl Ledger {
    pub fn new(history_limit: usize) -> Self {
        Self {
            store: SessionStore::new(),
            groups: GroupRegistry::new(),
            history: SessionHistory::new(history_limit),
        }
    }

    /// Record a freshly launched session as active.
    pub fn admit(&mut self, mut session: Session) -> Result<()> {
        session.state.transition_to(SessionState::Active)?;
        self.history.record_start(&session);
        info!(
            resource = %session.key,
            pid = session.pid(),
            kind = %session.kind,
            priority = session.priority.level(),
            context = %session.context,
            exempt = session.exempt,
            "Session opened"
        );
        self.store.put(session);
        Ok(())
    }

    /// Terminate the session's process, then remove its bookkeeping.
    ///
    /// Bookkeeping is removed even when termination is incomplete; the
    /// returned record carries the warning.
    pub fn release(
        &mut self,
        controller: &dyn ProcessController,
        key: &ResourceKey,
        reason: CloseReason,
    ) -> Option<ClosedSession> {
        let session = self.store.get_mut(key)?;
        advance(session, SessionState::Closing);

        let termination = controller.terminate(&mut session.handle);
        if let Termination::Incomplete { reason: why } = &termination {
            warn!(
                resource = %key,
                pid = session.pid(),
                error = %why,
                "Termination incomplete, releasing session anyway; process may leak"
            );
        }
        self.forget(key, reason, termination)
    }

    /// Remove a session's bookkeeping without signalling its process.
    pub fn forget(
        &mut self,
        key: &ResourceKey,
        reason: CloseReason,
        termination: Termination,
    ) -> Option<ClosedSession> {
        let mut session = self.store.delete(key)?;
        if session.state.is_active() {
            advance(&mut session, SessionState::Closing);
        }
        advance(&mut session, SessionState::Closed);

        let dissolved_group = match &session.group_id {
            Some(id) => self.groups.detach(&mut self.store, key, id),
            None => false,
        };
        self.history.record_end(&session, &reason);

        info!(
            resource = %key,
            pid = session.pid(),
            reason = %reason,
            termination = %termination,
            "Session closed"
        );

        Some(ClosedSession {
            key: session.key,
            pid: session.handle.pid(),
            reason,
            termination,
            group_id: session.group_id,
            dissolved_group,
        })
    }

    pub fn create_group(
        &mut self,
        id: GroupId,
        keys: &[ResourceKey],
        purpose: impl Into<String>,
    ) -> Result<GroupCreated> {
        self.groups.create(&mut self.store, id, keys, purpose)
    }

    pub fn join_group(&mut self, id: &GroupId, key: &ResourceKey) -> Result<()> {
        self.groups.join(&mut self.store, id, key)
    }

    /// Peers of a session: its `related` set plus current group members.
    pub fn related(&self, key: &ResourceKey) -> Vec<ResourceKey> {
        let Some(session) = self.store.get(key) else {
            return Vec::new();
        };
        let mut related = session.related.clone();
        if let Some(group) = session.group_id.as_ref().and_then(|id| self.groups.get(id)) {
            related.extend(group.members.iter().cloned());
        }
        related.remove(key);
        related.into_iter().collect()
    }
}

/// Move a session along its lifecycle during removal. A rejected transition
/// is logged and fails debug builds; removal continues either way.
fn advance(session: &mut Session, target: SessionState) {
    let result = session.state.transition_to(target);
    if let Err(e) = &result {
        warn!(resource = %session.key, error = %e, "Unexpected state transition during removal");
    }
    debug_assert!(result.is_ok(), "{} -> {target:?} rejected", session.key);
}
