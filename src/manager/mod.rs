//! Session manager façade.
//!
//! [`SessionManager`] owns the session store, the group registry and the
//! history behind a single mutex, so every operation sees and leaves a
//! consistent state. Launches and terminations block while the lock is held;
//! both are bounded by the launcher's grace periods.
//!
//! # Open order
//!
//! 1. Sweep dead and expired sessions.
//! 2. Reuse the session if the resource is already open.
//! 3. For interactive requests, close other non-exempt interactive sessions
//!    outside the requested group.
//! 4. Evict until there is room (see [`crate::admission`]).
//! 5. Launch, then record the session as active.

mod outcome;
mod request;
mod status;
mod workflows;

pub use outcome::{ClosedSession, CloseOutcome, GroupClosed, OpenOutcome};
pub use request::OpenRequest;
pub use status::{GroupSnapshot, SessionSnapshot, Status};
pub use workflows::{WorkflowReport, MAX_COMPARISON_DOCS};

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::admission;
use crate::error::DocWardenError;
use crate::group::{GroupCreated, GroupId};
use crate::history::{SessionEvent, DEFAULT_HISTORY_LIMIT};
use crate::ledger::Ledger;
use crate::process::{NativeProcessController, ProcessController};
use crate::reaper::{self, SweepReport, TtlPolicy};
use crate::session::{CloseReason, ResourceKey, Session};
use crate::Result;

/// Tunables of a [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Upper bound on simultaneously active sessions.
    pub max_concurrent_docs: usize,
    pub ttl: TtlPolicy,
    /// Number of history events kept.
    pub history_limit: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_docs: 4,
            ttl: TtlPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Capacity-bounded manager of document sessions.
pub struct SessionManager<P: ProcessController = NativeProcessController> {
    controller: P,
    config: ManagerConfig,
    ledger: Mutex<Ledger>,
}

impl SessionManager<NativeProcessController> {
    /// Manager launching the real office application with default settings.
    pub fn native(config: ManagerConfig) -> Self {
        Self::new(NativeProcessController::default(), config)
    }
}

impl<P: ProcessController> SessionManager<P> {
    pub fn new(controller: P, config: ManagerConfig) -> Self {
        let ledger = Ledger::new(config.history_limit);
        Self {
            controller,
            config,
            ledger: Mutex::new(ledger),
        }
    }

    pub fn controller(&self) -> &P {
        &self.controller
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.ledger.lock().map_err(|_| DocWardenError::LockPoisoned)
    }

    /// Open a session for the requested resource.
    pub fn open(&self, request: OpenRequest) -> Result<OpenOutcome> {
        let now = Instant::now();
        let mut guard = self.lock()?;
        let ledger = &mut *guard;

        reaper::sweep(ledger, &self.controller, &self.config.ttl, now);

        if let Some(session) = ledger.store.get_mut(&request.key) {
            session.touch();
            debug!(resource = %request.key, pid = session.pid(), "Session already open, reusing");
            return Ok(OpenOutcome::AlreadyOpen { key: request.key });
        }

        let mut displaced = Vec::new();
        if request.kind.is_interactive() {
            displaced.extend(self.close_previous_interactive(ledger, &request));
        }
        displaced.extend(admission::ensure_capacity(
            ledger,
            &self.controller,
            &self.config.ttl,
            self.config.max_concurrent_docs,
            request.priority,
            now,
        )?);

        let handle = self.controller.launch(&request.key).map_err(|e| {
            warn!(resource = %request.key, error = %e, "Launch failed, no session recorded");
            e
        })?;
        let pid = handle.pid();

        let mut session = Session::new(
            request.key.clone(),
            handle,
            request.kind,
            request.priority,
            request.context,
        );
        session.exempt = request.is_exempt();
        session.keep_alive_reason = request.keep_alive_reason.clone();
        session.group_id = request.group_id.clone();
        ledger.admit(session)?;

        if let Some(id) = request.group_id.as_ref().filter(|id| ledger.groups.contains(id)) {
            ledger.join_group(id, &request.key)?;
        }

        Ok(OpenOutcome::Opened {
            key: request.key,
            pid,
            displaced,
        })
    }

    /// Close interactive sessions that would compete with `request`.
    fn close_previous_interactive(&self, ledger: &mut Ledger, request: &OpenRequest) -> Vec<ClosedSession> {
        let mut previous: Vec<ResourceKey> = ledger
            .store
            .list()
            .filter(|s| s.kind.is_interactive() && !s.exempt && s.key != request.key)
            .filter(|s| request.group_id.is_none() || s.group_id != request.group_id)
            .map(|s| s.key.clone())
            .collect();
        previous.sort();

        previous
            .into_iter()
            .filter_map(|key| {
                info!(resource = %key, replaced_by = %request.key, "Closing previous interactive session");
                ledger.release(&self.controller, &key, CloseReason::SequentialInteractive)
            })
            .collect()
    }

    /// Close the session for `key`. Closing an unknown key succeeds.
    pub fn close(&self, key: &ResourceKey, reason: CloseReason) -> Result<CloseOutcome> {
        let mut ledger = self.lock()?;
        match ledger.release(&self.controller, key, reason) {
            Some(closed) => Ok(CloseOutcome::Closed(closed)),
            None => {
                debug!(resource = %key, "Close requested for inactive session");
                Ok(CloseOutcome::AlreadyClosed)
            }
        }
    }

    /// Close every member of a group, then delete the group.
    pub fn close_group(&self, id: &GroupId, reason: CloseReason) -> Result<GroupClosed> {
        let mut guard = self.lock()?;
        let ledger = &mut *guard;

        let members: Vec<ResourceKey> = ledger
            .groups
            .get(id)
            .ok_or_else(|| DocWardenError::UnknownGroup(id.to_string()))?
            .members
            .iter()
            .cloned()
            .collect();
        let total = members.len();

        let reason = CloseReason::Group(Box::new(reason));
        let sessions: Vec<ClosedSession> = members
            .iter()
            .filter_map(|key| ledger.release(&self.controller, key, reason.clone()))
            .collect();
        ledger.groups.remove(id);

        let closed = GroupClosed {
            id: id.clone(),
            closed: sessions.len(),
            total,
            sessions,
        };
        if closed.leaked() > 0 {
            warn!(group = %id, leaked = closed.leaked(), "Group closed with unconfirmed terminations");
        }
        info!(group = %id, closed = closed.closed, total, "Group closed");
        Ok(closed)
    }

    /// Group already-open sessions under `id`.
    pub fn create_group(
        &self,
        id: impl Into<GroupId>,
        keys: &[ResourceKey],
        purpose: impl Into<String>,
    ) -> Result<GroupCreated> {
        self.lock()?.create_group(id.into(), keys, purpose)
    }

    /// Sweep, then snapshot every session and group.
    pub fn status(&self) -> Result<Status> {
        let now = Instant::now();
        let mut guard = self.lock()?;
        let ledger = &mut *guard;
        reaper::sweep(ledger, &self.controller, &self.config.ttl, now);

        let mut sessions: Vec<SessionSnapshot> = ledger
            .store
            .list()
            .map(|s| SessionSnapshot::capture(s, now))
            .collect();
        sessions.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.key.cmp(&b.key)));

        Ok(Status {
            active_count: sessions.len(),
            max_concurrent: self.config.max_concurrent_docs,
            sessions,
            groups: ledger.groups.list().into_iter().map(GroupSnapshot::capture).collect(),
        })
    }

    /// Set or clear the exemption flag. Clearing it drops the keep-alive reason.
    pub fn set_exempt(&self, key: &ResourceKey, exempt: bool, reason: Option<String>) -> Result<()> {
        let mut ledger = self.lock()?;
        let session = ledger
            .store
            .get_mut(key)
            .ok_or_else(|| DocWardenError::SessionNotFound(key.to_string()))?;

        session.exempt = exempt;
        session.keep_alive_reason = if exempt { reason } else { None };
        info!(
            resource = %key,
            exempt,
            reason = session.keep_alive_reason.as_deref().unwrap_or(""),
            "Exemption updated"
        );
        Ok(())
    }

    /// Refresh a session's activity time. Returns `false` for an unknown key.
    pub fn touch(&self, key: &ResourceKey) -> Result<bool> {
        let mut ledger = self.lock()?;
        Ok(match ledger.store.get_mut(key) {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        })
    }

    pub fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Instant::now())
    }

    /// Sweep as if the current time were `now`.
    pub fn sweep_at(&self, now: Instant) -> Result<SweepReport> {
        let mut ledger = self.lock()?;
        Ok(reaper::sweep(&mut ledger, &self.controller, &self.config.ttl, now))
    }

    /// Close every session, exempt or not.
    pub fn close_all(&self, reason: CloseReason) -> Result<Vec<ClosedSession>> {
        let mut ledger = self.lock()?;
        Ok(release_all(&mut ledger, &self.controller, reason))
    }

    /// Peers of a session through its group.
    pub fn related_sessions(&self, key: &ResourceKey) -> Result<Vec<ResourceKey>> {
        Ok(self.lock()?.related(key))
    }

    /// Recorded start and end events, oldest first.
    pub fn history(&self) -> Result<Vec<SessionEvent>> {
        Ok(self.lock()?.history.events())
    }

    /// Number of sessions currently recorded, without sweeping.
    pub fn active_count(&self) -> Result<usize> {
        Ok(self.lock()?.store.len())
    }
}

fn release_all(ledger: &mut Ledger, controller: &dyn ProcessController, reason: CloseReason) -> Vec<ClosedSession> {
    let keys = ledger.store.keys();
    if !keys.is_empty() {
        info!(count = keys.len(), reason = %reason, "Closing all sessions");
    }
    keys.iter()
        .filter_map(|key| ledger.release(controller, key, reason.clone()))
        .collect()
}

/// Dropping the manager closes every session it still holds, even after a
/// panic poisoned the lock.
impl<P: ProcessController> Drop for SessionManager<P> {
    fn drop(&mut self) {
        let ledger = self.ledger.get_mut().unwrap_or_else(PoisonError::into_inner);
        let leaked = release_all(ledger, &self.controller, CloseReason::Shutdown)
            .iter()
            .filter(|closed| closed.leak_suspected())
            .count();
        if leaked > 0 {
            warn!(leaked, "Manager dropped with unconfirmed terminations");
        }
    }
}
