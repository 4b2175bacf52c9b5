//! Open request builder.

use std::path::Path;

use crate::group::GroupId;
use crate::session::{Priority, ResourceKey, SessionContext, SessionKind};

/// Parameters for [`SessionManager::open`](super::SessionManager::open).
///
/// Defaults to an interactive, human-validation session at
/// [`Priority::ComparativeAnalysis`].
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub key: ResourceKey,
    pub kind: SessionKind,
    pub priority: Priority,
    pub context: SessionContext,
    pub group_id: Option<GroupId>,
    /// Overrides the context's default exemption.
    pub exempt: Option<bool>,
    pub keep_alive_reason: Option<String>,
}

impl OpenRequest {
    pub fn new(resource: impl AsRef<Path>) -> Self {
        Self::for_key(ResourceKey::new(resource))
    }

    pub fn for_key(key: ResourceKey) -> Self {
        Self {
            key,
            kind: SessionKind::Interactive,
            priority: Priority::default(),
            context: SessionContext::HumanValidation,
            group_id: None,
            exempt: None,
            keep_alive_reason: None,
        }
    }

    pub fn kind(mut self, kind: SessionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Background conversion work: background kind and context, lowest priority.
    pub fn background(mut self) -> Self {
        self.kind = SessionKind::Background;
        self.context = SessionContext::Background;
        self.priority = Priority::BackgroundTasks;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }

    pub fn group(mut self, id: impl Into<GroupId>) -> Self {
        self.group_id = Some(id.into());
        self
    }

    pub fn exempt(mut self, exempt: bool) -> Self {
        self.exempt = Some(exempt);
        self
    }

    pub fn keep_alive_reason(mut self, reason: impl Into<String>) -> Self {
        self.keep_alive_reason = Some(reason.into());
        self
    }

    /// Effective exemption: the override, else the context default.
    pub fn is_exempt(&self) -> bool {
        self.exempt.unwrap_or_else(|| self.context.exempt_by_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = OpenRequest::new("/nonexistent/a.odt");
        assert_eq!(req.kind, SessionKind::Interactive);
        assert_eq!(req.priority, Priority::ComparativeAnalysis);
        assert_eq!(req.context, SessionContext::HumanValidation);
        assert!(req.is_exempt());
        assert!(req.group_id.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let req = OpenRequest::new("/nonexistent/a.odt")
            .priority(Priority::BatchProcessing)
            .context(SessionContext::Collaborative)
            .group("client_acme")
            .exempt(false)
            .keep_alive_reason("client call");

        assert_eq!(req.priority, Priority::BatchProcessing);
        assert_eq!(req.group_id, Some(GroupId::from("client_acme")));
        assert!(!req.is_exempt());
        assert_eq!(req.keep_alive_reason.as_deref(), Some("client call"));
    }

    #[test]
    fn test_background_preset() {
        let req = OpenRequest::new("/nonexistent/a.odt").background();
        assert_eq!(req.kind, SessionKind::Background);
        assert_eq!(req.context, SessionContext::Background);
        assert_eq!(req.priority, Priority::BackgroundTasks);
        assert!(!req.is_exempt());
    }
}
