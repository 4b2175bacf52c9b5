//! Sweeps dead and idle sessions.
//!
//! # Sweep order
//!
//! 1. Remove sessions whose process has died (no signal is sent).
//! 2. Close non-exempt sessions idle longer than their context's TTL.
//!
//! A sweep is idempotent. It runs before every open and status query, and
//! [`spawn_periodic`] runs it on a fixed interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ledger::Ledger;
use crate::manager::{ClosedSession, SessionManager};
use crate::process::{ProcessController, Termination};
use crate::session::{CloseReason, ResourceKey, SessionContext};

/// Idle time-to-live per context. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub human_validation: Option<Duration>,
    pub collaborative: Option<Duration>,
    pub automated: Option<Duration>,
    pub background: Option<Duration>,
}

impl TtlPolicy {
    pub fn ttl(&self, context: SessionContext) -> Option<Duration> {
        match context {
            SessionContext::HumanValidation => self.human_validation,
            SessionContext::Collaborative => self.collaborative,
            SessionContext::Automated => self.automated,
            SessionContext::Background => self.background,
        }
    }

    /// Override the TTL of one context.
    pub fn with_ttl(mut self, context: SessionContext, ttl: Option<Duration>) -> Self {
        match context {
            SessionContext::HumanValidation => self.human_validation = ttl,
            SessionContext::Collaborative => self.collaborative = ttl,
            SessionContext::Automated => self.automated = ttl,
            SessionContext::Background => self.background = ttl,
        }
        self
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            human_validation: None,
            collaborative: None,
            automated: Some(Duration::from_secs(10 * 60)),
            background: Some(Duration::from_secs(5 * 60)),
        }
    }
}

/// Summary of a single sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Sessions whose process had died.
    pub died: Vec<ClosedSession>,
    /// Sessions closed for exceeding their TTL.
    pub expired: Vec<ClosedSession>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.died.len() + self.expired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Run one sweep at time `now`.
pub(crate) fn sweep(
    ledger: &mut Ledger,
    controller: &dyn ProcessController,
    ttl: &TtlPolicy,
    now: Instant,
) -> SweepReport {
    let mut report = SweepReport::default();

    let mut dead = Vec::new();
    for session in ledger.store.list_mut() {
        if !controller.is_alive(&mut session.handle) {
            dead.push(session.key.clone());
        }
    }
    dead.sort();
    for key in dead {
        info!(resource = %key, "Session process died");
        if let Some(closed) = ledger.forget(&key, CloseReason::ProcessDied, Termination::AlreadyExited) {
            report.died.push(closed);
        }
    }

    let mut expired: Vec<(ResourceKey, SessionContext, Duration)> = ledger
        .store
        .list()
        .filter(|s| !s.exempt)
        .filter_map(|s| {
            let limit = ttl.ttl(s.context)?;
            (s.idle_at(now) > limit).then(|| (s.key.clone(), s.context, limit))
        })
        .collect();
    expired.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, context, limit) in expired {
        warn!(
            resource = %key,
            context = %context,
            ttl_secs = limit.as_secs(),
            "Session expired"
        );
        if let Some(closed) = ledger.release(controller, &key, CloseReason::Expired(context)) {
            report.expired.push(closed);
        }
    }

    if !report.is_empty() {
        debug!(
            died = report.died.len(),
            expired = report.expired.len(),
            remaining = ledger.store.len(),
            "Sweep finished"
        );
    }
    report
}

/// Sweep `manager` every `every` on the blocking pool until the task is
/// aborted. A zero interval returns a task that finishes immediately.
pub fn spawn_periodic<P>(manager: Arc<SessionManager<P>>, every: Duration) -> JoinHandle<()>
where
    P: ProcessController + 'static,
{
    if every.is_zero() {
        warn!("Periodic sweep interval is zero; not starting");
        return tokio::spawn(async {});
    }

    tokio::spawn(async move {
        info!(interval_ms = every.as_millis() as u64, "Periodic sweep started");
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let manager = Arc::clone(&manager);
            match tokio::task::spawn_blocking(move || manager.sweep()).await {
                Ok(Ok(report)) if !report.is_empty() => {
                    info!(
                        died = report.died.len(),
                        expired = report.expired.len(),
                        "Periodic sweep reclaimed sessions"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Periodic sweep failed; stopping");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Periodic sweep task panicked; stopping");
                    break;
                }
            }
        }
    })
}
