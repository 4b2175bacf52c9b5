//! Session records and their storage.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant, SystemTime};

use super::{Priority, ResourceKey, SessionContext, SessionKind, SessionState};
use crate::group::GroupId;
use crate::process::ProcessHandle;

/// A live handle to one document opened in the external application.
#[derive(Debug)]
pub struct Session {
    /// Identity of the session.
    pub key: ResourceKey,
    /// Underlying process, owned exclusively by this session.
    pub handle: ProcessHandle,
    /// Interactive window or background work.
    pub kind: SessionKind,
    /// Lifecycle state.
    pub state: SessionState,
    /// Priority class (1 = highest).
    pub priority: Priority,
    /// Context deciding TTL and eviction eligibility.
    pub context: SessionContext,
    /// Group this session belongs to, if any.
    pub group_id: Option<GroupId>,
    /// Peers of this session within its group.
    pub related: BTreeSet<ResourceKey>,
    /// Never closed by TTL expiry, eviction or interactive replacement.
    pub exempt: bool,
    /// Why the session is being kept alive.
    pub keep_alive_reason: Option<String>,
    /// Monotonic time the session was opened.
    pub opened_at: Instant,
    /// Wall-clock time the session was opened.
    pub opened_wall: SystemTime,
    /// Time of last activity.
    pub last_activity: Instant,
}

impl Session {
    /// Create a session in the `Opening` state for a freshly launched process.
    ///
    /// Human-validation and collaborative sessions start out exempt.
    pub fn new(
        key: ResourceKey,
        handle: ProcessHandle,
        kind: SessionKind,
        priority: Priority,
        context: SessionContext,
    ) -> Self {
        let now = Instant::now();
        Self {
            key,
            handle,
            kind,
            state: SessionState::Opening,
            priority,
            context,
            group_id: None,
            related: BTreeSet::new(),
            exempt: context.exempt_by_default(),
            keep_alive_reason: None,
            opened_at: now,
            opened_wall: SystemTime::now(),
            last_activity: now,
        }
    }

    /// Process id of the underlying process.
    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    /// Update the last activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Idle time as observed at `now`.
    pub fn idle_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Time since the session was opened.
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

/// Map of resource key to session.
///
/// Not synchronized: the session manager serializes all access.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<ResourceKey, Session>,
}

impl SessionStore {
    /// Create a new empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &ResourceKey) -> Option<&mut Session> {
        self.sessions.get_mut(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// Insert a session, returning any session previously stored under its key.
    pub fn put(&mut self, session: Session) -> Option<Session> {
        self.sessions.insert(session.key.clone(), session)
    }

    /// Remove a session from the store.
    pub fn delete(&mut self, key: &ResourceKey) -> Option<Session> {
        self.sessions.remove(key)
    }

    /// Iterate over all sessions in arbitrary order.
    pub fn list(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn list_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<_> = self.sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get the number of sessions in the store.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(path: &str, pid: u32, context: SessionContext) -> Session {
        Session::new(
            ResourceKey::from(path),
            ProcessHandle::detached(pid),
            SessionKind::Interactive,
            Priority::default(),
            context,
        )
    }

    #[test]
    fn test_new_session_defaults() {
        let s = session("/nonexistent/a.odt", 10, SessionContext::HumanValidation);
        assert_eq!(s.state, SessionState::Opening);
        assert!(s.exempt);
        assert!(s.group_id.is_none());
        assert!(s.related.is_empty());
        assert_eq!(s.pid(), 10);

        let s = session("/nonexistent/b.odt", 11, SessionContext::Automated);
        assert!(!s.exempt);
    }

    #[test]
    fn test_put_get_delete() {
        let mut store = SessionStore::new();
        let key = ResourceKey::from("/nonexistent/a.odt");
        assert!(store
            .put(session("/nonexistent/a.odt", 10, SessionContext::Automated))
            .is_none());

        assert!(store.contains(&key));
        assert_eq!(store.get(&key).unwrap().pid(), 10);
        assert_eq!(store.len(), 1);

        let removed = store.delete(&key).unwrap();
        assert_eq!(removed.key, key);
        assert!(store.is_empty());
        assert!(store.delete(&key).is_none());
    }

    #[test]
    fn test_put_replaces_same_key() {
        let mut store = SessionStore::new();
        store.put(session("/nonexistent/a.odt", 10, SessionContext::Automated));
        let previous = store.put(session("/nonexistent/a.odt", 20, SessionContext::Automated));

        assert_eq!(previous.unwrap().pid(), 10);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_keys_sorted() {
        let mut store = SessionStore::new();
        store.put(session("/nonexistent/c.odt", 1, SessionContext::Automated));
        store.put(session("/nonexistent/a.odt", 2, SessionContext::Automated));
        store.put(session("/nonexistent/b.odt", 3, SessionContext::Automated));

        let names: Vec<_> = store
            .keys()
            .iter()
            .map(|k| k.file_name().to_string())
            .collect();
        assert_eq!(names, vec!["a.odt", "b.odt", "c.odt"]);
    }

    #[test]
    fn test_idle_at() {
        let mut s = session("/nonexistent/a.odt", 10, SessionContext::Automated);
        let later = s.last_activity + Duration::from_secs(90);
        assert_eq!(s.idle_at(later), Duration::from_secs(90));

        s.touch();
        assert!(s.idle_at(s.last_activity) == Duration::ZERO);
        // A time before last activity never underflows.
        assert_eq!(s.idle_at(s.opened_at), Duration::ZERO);
    }
}
