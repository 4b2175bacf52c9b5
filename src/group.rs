//! Named groups of related sessions.
//!
//! A group is a batch of documents opened together, such as a side-by-side
//! template comparison. The registry keeps three things consistent with the
//! session store:
//!
//! - every member of a group is an active session whose `group_id` points
//!   back at the group,
//! - `related` sets are symmetric within a group,
//! - a group that loses its last member is deleted.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DocWardenError;
use crate::session::{ResourceKey, SessionStore};
use crate::Result;

/// Identifier of a session group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for GroupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A named set of sessions.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    /// Free-text description, e.g. `template_comparison_pricing`.
    pub purpose: String,
    pub members: BTreeSet<ResourceKey>,
    pub created_at: SystemTime,
}

/// Result of a successful group creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCreated {
    pub id: GroupId,
    /// Sessions that joined the group.
    pub members: Vec<ResourceKey>,
    /// Requested keys with no active session.
    pub skipped: Vec<ResourceKey>,
}

impl GroupCreated {
    /// Whether some requested keys were not active.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Registry of all groups.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: HashMap<GroupId, Group>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn contains(&self, id: &GroupId) -> bool {
        self.groups.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups sorted by id.
    pub fn list(&self) -> Vec<&Group> {
        let mut groups: Vec<_> = self.groups.values().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        groups
    }

    /// Create a group from already-open sessions.
    ///
    /// Keys without an active session are skipped; the call fails only if
    /// none remain. A member that belonged to another group is moved out of
    /// it first.
    pub fn create(
        &mut self,
        store: &mut SessionStore,
        id: GroupId,
        keys: &[ResourceKey],
        purpose: impl Into<String>,
    ) -> Result<GroupCreated> {
        if self.groups.contains_key(&id) {
            warn!(group = %id, "Group already exists");
            return Err(DocWardenError::GroupExists(id.to_string()));
        }

        let mut members = BTreeSet::new();
        let mut skipped = Vec::new();
        for key in keys {
            if store.contains(key) {
                members.insert(key.clone());
            } else {
                warn!(group = %id, resource = %key, "Session not found for group");
                skipped.push(key.clone());
            }
        }

        if members.is_empty() {
            return Err(DocWardenError::EmptyGroup(id.to_string()));
        }

        for key in &members {
            let previous = store.get(key).and_then(|s| s.group_id.clone());
            if let Some(previous) = previous.filter(|previous| *previous != id) {
                self.detach(store, key, &previous);
            }
        }

        for key in &members {
            if let Some(session) = store.get_mut(key) {
                session.group_id = Some(id.clone());
                session.related = members.iter().filter(|k| *k != key).cloned().collect();
            }
        }

        let purpose = purpose.into();
        info!(group = %id, members = members.len(), purpose = %purpose, "Group created");

        let created = GroupCreated {
            id: id.clone(),
            members: members.iter().cloned().collect(),
            skipped,
        };
        self.groups.insert(
            id.clone(),
            Group {
                id,
                purpose,
                members,
                created_at: SystemTime::now(),
            },
        );
        Ok(created)
    }

    /// Add an active session to an existing group.
    pub fn join(&mut self, store: &mut SessionStore, id: &GroupId, key: &ResourceKey) -> Result<()> {
        let group = self
            .groups
            .get_mut(id)
            .ok_or_else(|| DocWardenError::UnknownGroup(id.to_string()))?;
        if !store.contains(key) {
            return Err(DocWardenError::SessionNotFound(key.to_string()));
        }

        for member in group.members.iter().filter(|m| *m != key) {
            if let Some(peer) = store.get_mut(member) {
                peer.related.insert(key.clone());
            }
        }
        let peers: BTreeSet<_> = group.members.iter().filter(|m| *m != key).cloned().collect();
        if let Some(session) = store.get_mut(key) {
            session.group_id = Some(id.clone());
            session.related = peers;
        }
        group.members.insert(key.clone());
        debug!(group = %id, resource = %key, "Session joined group");
        Ok(())
    }

    /// Remove `key` from group `id`, cleaning up peers' `related` sets.
    ///
    /// Works whether or not the session is still in the store. Deletes the
    /// group and returns `true` when it becomes empty.
    pub fn detach(&mut self, store: &mut SessionStore, key: &ResourceKey, id: &GroupId) -> bool {
        let Some(group) = self.groups.get_mut(id) else {
            return false;
        };
        group.members.remove(key);

        for member in &group.members {
            if let Some(peer) = store.get_mut(member) {
                peer.related.remove(key);
            }
        }
        if let Some(session) = store.get_mut(key) {
            session.related.clear();
            session.group_id = None;
        }

        if group.members.is_empty() {
            info!(group = %id, "Removing empty group");
            self.groups.remove(id);
            return true;
        }
        false
    }

    /// Delete a group record without touching its members.
    pub fn remove(&mut self, id: &GroupId) -> Option<Group> {
        self.groups.remove(id)
    }
}
