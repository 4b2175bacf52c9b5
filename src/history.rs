//! Bounded log of session start and end events.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::group::GroupId;
use crate::session::{CloseReason, Priority, ResourceKey, Session, SessionContext, SessionKind};

/// Default number of events kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Start,
    End,
}

/// One entry in the session history.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub action: SessionAction,
    pub key: ResourceKey,
    pub kind: SessionKind,
    pub pid: u32,
    pub priority: Priority,
    pub context: SessionContext,
    pub group_id: Option<GroupId>,
    pub keep_alive_reason: Option<String>,
    /// Set on `End` events only.
    pub reason: Option<CloseReason>,
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
    /// Set on `End` events only.
    pub duration_secs: Option<f64>,
}

impl SessionEvent {
    fn from_session(action: SessionAction, session: &Session) -> Self {
        Self {
            action,
            key: session.key.clone(),
            kind: session.kind,
            pid: session.pid(),
            priority: session.priority,
            context: session.context,
            group_id: session.group_id.clone(),
            keep_alive_reason: session.keep_alive_reason.clone(),
            reason: None,
            timestamp_ms: unix_millis(SystemTime::now()),
            duration_secs: None,
        }
    }
}

/// Ring buffer of session events; the oldest entries are dropped first.
#[derive(Debug)]
pub struct SessionHistory {
    events: VecDeque<SessionEvent>,
    limit: usize,
}

impl SessionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit,
        }
    }

    pub fn record_start(&mut self, session: &Session) {
        self.push(SessionEvent::from_session(SessionAction::Start, session));
    }

    pub fn record_end(&mut self, session: &Session, reason: &CloseReason) {
        let mut event = SessionEvent::from_session(SessionAction::End, session);
        event.reason = Some(reason.clone());
        event.duration_secs = Some(session.age().as_secs_f64());
        self.push(event);
    }

    fn push(&mut self, event: SessionEvent) {
        if self.limit == 0 {
            return;
        }
        while self.events.len() >= self.limit {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Events, oldest first.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessHandle;

    fn session(path: &str) -> Session {
        Session::new(
            ResourceKey::from(path),
            ProcessHandle::detached(7),
            SessionKind::Background,
            Priority::BatchProcessing,
            SessionContext::Automated,
        )
    }

    #[test]
    fn test_start_and_end_events() {
        let mut history = SessionHistory::default();
        let s = session("/nonexistent/a.odt");
        history.record_start(&s);
        history.record_end(&s, &CloseReason::Manual);

        let events = history.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, SessionAction::Start);
        assert!(events[0].reason.is_none());
        assert_eq!(events[1].action, SessionAction::End);
        assert_eq!(events[1].reason, Some(CloseReason::Manual));
        assert!(events[1].duration_secs.is_some());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = SessionHistory::new(3);
        for i in 0..5 {
            history.record_start(&session(&format!("/nonexistent/{i}.odt")));
        }
        let names: Vec<_> = history
            .events()
            .iter()
            .map(|e| e.key.file_name().to_string())
            .collect();
        assert_eq!(names, vec!["2.odt", "3.odt", "4.odt"]);
    }

    #[test]
    fn test_zero_limit_records_nothing() {
        let mut history = SessionHistory::new(0);
        history.record_start(&session("/nonexistent/a.odt"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let mut history = SessionHistory::default();
        let s = session("/nonexistent/a.odt");
        history.record_end(&s, &CloseReason::PriorityPreemption);

        let json = serde_json::to_value(&history.events()[0]).unwrap();
        assert_eq!(json["action"], "end");
        assert_eq!(json["reason"], "priority_preemption");
        assert_eq!(json["context"], "automated");
    }
}
