//! Read-only snapshot of the manager.

use std::fmt;
use std::time::{Instant, SystemTime};

use serde::Serialize;

use crate::group::{Group, GroupId};
use crate::session::{Priority, ResourceKey, Session, SessionContext, SessionKind, SessionState};

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub key: ResourceKey,
    pub pid: u32,
    pub kind: SessionKind,
    pub state: SessionState,
    pub priority: Priority,
    pub context: SessionContext,
    pub group_id: Option<GroupId>,
    pub related: Vec<ResourceKey>,
    pub exempt: bool,
    pub keep_alive_reason: Option<String>,
    pub idle_secs: u64,
    pub age_secs: u64,
}

impl SessionSnapshot {
    pub(crate) fn capture(session: &Session, now: Instant) -> Self {
        Self {
            key: session.key.clone(),
            pid: session.pid(),
            kind: session.kind,
            state: session.state,
            priority: session.priority,
            context: session.context,
            group_id: session.group_id.clone(),
            related: session.related.iter().cloned().collect(),
            exempt: session.exempt,
            keep_alive_reason: session.keep_alive_reason.clone(),
            idle_secs: session.idle_at(now).as_secs(),
            age_secs: now.saturating_duration_since(session.opened_at).as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSnapshot {
    pub id: GroupId,
    pub purpose: String,
    pub members: Vec<ResourceKey>,
    pub age_secs: u64,
}

impl GroupSnapshot {
    pub(crate) fn capture(group: &Group) -> Self {
        let age_secs = SystemTime::now()
            .duration_since(group.created_at)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id: group.id.clone(),
            purpose: group.purpose.clone(),
            members: group.members.iter().cloned().collect(),
            age_secs,
        }
    }
}

/// Snapshot returned by [`SessionManager::status`](super::SessionManager::status).
///
/// Sessions are ordered by priority, then key; groups by id.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub active_count: usize,
    pub max_concurrent: usize,
    pub sessions: Vec<SessionSnapshot>,
    pub groups: Vec<GroupSnapshot>,
}

impl Status {
    /// Active session count per priority level, for levels with sessions.
    pub fn by_priority(&self) -> Vec<(Priority, usize)> {
        let mut counts: Vec<(Priority, usize)> = Vec::new();
        for s in &self.sessions {
            match counts.last_mut() {
                Some((p, n)) if *p == s.priority => *n += 1,
                _ => counts.push((s.priority, 1)),
            }
        }
        counts
    }

    pub fn session(&self, key: &ResourceKey) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|s| &s.key == key)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Active sessions: {}/{}", self.active_count, self.max_concurrent)?;

        let mut current = None;
        for s in &self.sessions {
            if current != Some(s.priority) {
                writeln!(f, "  {}", s.priority)?;
                current = Some(s.priority);
            }
            write!(
                f,
                "    {} (pid {}, {}, {}, idle {}s)",
                s.key.file_name(),
                s.pid,
                s.kind,
                s.context,
                s.idle_secs
            )?;
            if s.exempt {
                write!(f, " [exempt")?;
                if let Some(reason) = &s.keep_alive_reason {
                    write!(f, ": {reason}")?;
                }
                write!(f, "]")?;
            }
            if let Some(id) = &s.group_id {
                write!(f, " [group {id}]")?;
            }
            writeln!(f)?;
        }

        if !self.groups.is_empty() {
            writeln!(f, "Groups: {}", self.groups.len())?;
            for g in &self.groups {
                writeln!(f, "  {} ({}): {} member(s)", g.id, g.purpose, g.members.len())?;
            }
        }
        Ok(())
    }
}
