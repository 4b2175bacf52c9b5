//! Multi-document workflows built on `open` and `create_group`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{info, warn};

use super::{OpenOutcome, OpenRequest, SessionManager};
use crate::error::DocWardenError;
use crate::group::{GroupCreated, GroupId};
use crate::process::ProcessController;
use crate::session::{Priority, ResourceKey, SessionContext, SessionKind};
use crate::Result;

/// Most documents opened side by side for one comparison.
pub const MAX_COMPARISON_DOCS: usize = 4;

/// What a workflow opened and how it was grouped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowReport {
    /// Group formed from the opened documents, if any.
    pub group: Option<GroupCreated>,
    /// Keys of sessions now open for the workflow, newly or already.
    pub opened: Vec<ResourceKey>,
    /// Documents that could not be opened, with the error message.
    pub failed: Vec<(ResourceKey, String)>,
    /// Documents dropped because the workflow has a size limit.
    pub skipped: Vec<ResourceKey>,
}

impl WorkflowReport {
    pub fn group_id(&self) -> Option<&GroupId> {
        self.group.as_ref().map(|g| &g.id)
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lower-case `name` with runs of non-alphanumerics folded to `_`.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

impl<P: ProcessController> SessionManager<P> {
    /// Open up to [`MAX_COMPARISON_DOCS`] templates at critical priority and
    /// group them once at least two are open.
    pub fn open_for_comparison<S: AsRef<Path>>(&self, paths: &[S], purpose: &str) -> Result<WorkflowReport> {
        let mut report = WorkflowReport::default();
        if paths.len() > MAX_COMPARISON_DOCS {
            warn!(
                requested = paths.len(),
                limit = MAX_COMPARISON_DOCS,
                "Too many documents for comparison, truncating"
            );
            report.skipped = paths[MAX_COMPARISON_DOCS..].iter().map(ResourceKey::new).collect();
        }

        let id = self.fresh_group_id(&format!("comparison_{}", unix_secs()))?;
        let reason = format!("template_comparison_{purpose}");
        for path in paths.iter().take(MAX_COMPARISON_DOCS) {
            let request = OpenRequest::new(path)
                .kind(SessionKind::Interactive)
                .priority(Priority::CriticalValidation)
                .context(SessionContext::HumanValidation)
                .group(id.clone())
                .keep_alive_reason(reason.clone());
            self.run(request, &mut report)?;
        }

        if report.opened.len() >= 2 {
            report.group = Some(self.create_group(id, &report.opened, reason)?);
        } else {
            warn!(opened = report.opened.len(), "Not enough documents opened for a comparison");
            self.untag(&id, &report.opened)?;
        }
        Ok(report)
    }

    /// Open a client's documents as collaborative work and group whatever
    /// opened.
    pub fn open_client_portfolio<S: AsRef<Path>>(&self, paths: &[S], client: &str) -> Result<WorkflowReport> {
        let mut report = WorkflowReport::default();
        let id = self.fresh_group_id(&format!("client_{}_{}", slug(client), unix_secs()))?;
        let reason = format!("client_portfolio_{client}");

        info!(client, documents = paths.len(), "Opening client portfolio");
        for path in paths {
            let request = OpenRequest::new(path)
                .kind(SessionKind::Interactive)
                .priority(Priority::ActiveClientWork)
                .context(SessionContext::Collaborative)
                .group(id.clone())
                .keep_alive_reason(reason.clone());
            self.run(request, &mut report)?;
        }

        if !report.opened.is_empty() {
            report.group = Some(self.create_group(id, &report.opened, reason)?);
        }
        Ok(report)
    }

    fn run(&self, request: OpenRequest, report: &mut WorkflowReport) -> Result<()> {
        let key = request.key.clone();
        match self.open(request) {
            Ok(OpenOutcome::Opened { key, .. } | OpenOutcome::AlreadyOpen { key }) => {
                report.opened.push(key);
            }
            Err(DocWardenError::LockPoisoned) => return Err(DocWardenError::LockPoisoned),
            Err(e) => {
                warn!(resource = %key, error = %e, "Workflow document failed to open");
                report.failed.push((key, e.to_string()));
            }
        }
        Ok(())
    }

    /// `base`, or `base_2`, `base_3`... if taken.
    fn fresh_group_id(&self, base: &str) -> Result<GroupId> {
        let ledger = self.lock()?;
        let mut id = GroupId::new(base);
        let mut n = 2;
        while ledger.groups.contains(&id) {
            id = GroupId::new(format!("{base}_{n}"));
            n += 1;
        }
        Ok(id)
    }

    /// Clear a group tag that never became a registered group.
    fn untag(&self, id: &GroupId, keys: &[ResourceKey]) -> Result<()> {
        let mut ledger = self.lock()?;
        if ledger.groups.contains(id) {
            return Ok(());
        }
        for key in keys {
            if let Some(session) = ledger.store.get_mut(key) {
                if session.group_id.as_ref() == Some(id) {
                    session.group_id = None;
                }
            }
        }
        Ok(())
    }
}
