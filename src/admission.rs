//! Admission control: frees capacity before a new session is launched.
//!
//! Victims are picked by a fixed list of [`EvictionStrategy`] functions tried
//! in order. The first strategy to name a victim wins:
//!
//! 1. [`lower_priority_victim`]: the worst-priority evictable session that
//!    ranks below the requested priority.
//! 2. [`oldest_victim`]: the oldest non-exempt session of any kind.
//!
//! Ties go to the oldest `opened_at`, then the smaller resource key. Exempt
//! sessions are never victims.

use std::time::Instant;

use tracing::{debug, warn};

use crate::error::DocWardenError;
use crate::ledger::Ledger;
use crate::manager::ClosedSession;
use crate::process::ProcessController;
use crate::reaper::{self, TtlPolicy};
use crate::session::{CloseReason, Priority, ResourceKey, Session, SessionStore};
use crate::Result;

/// A session chosen to make room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub key: ResourceKey,
    pub reason: CloseReason,
}

/// Picks a victim from the store for a request at the given priority.
pub type EvictionStrategy = fn(&SessionStore, Priority) -> Option<Eviction>;

/// Strategies in the order they are tried.
pub const EVICTION_STRATEGIES: [EvictionStrategy; 2] = [lower_priority_victim, oldest_victim];

/// Older first, then smaller key.
fn older(a: &Session, b: &Session) -> std::cmp::Ordering {
    a.opened_at.cmp(&b.opened_at).then_with(|| a.key.cmp(&b.key))
}

/// Worst-priority automated or background session ranking below `requested`.
pub fn lower_priority_victim(store: &SessionStore, requested: Priority) -> Option<Eviction> {
    store
        .list()
        .filter(|s| !s.exempt && s.context.is_evictable())
        .filter(|s| s.priority.is_lower_than(requested))
        .min_by(|a, b| b.priority.cmp(&a.priority).then_with(|| older(a, b)))
        .map(|s| Eviction {
            key: s.key.clone(),
            reason: CloseReason::PriorityPreemption,
        })
}

/// Oldest non-exempt session, whatever its priority or context.
pub fn oldest_victim(store: &SessionStore, _requested: Priority) -> Option<Eviction> {
    store
        .list()
        .filter(|s| !s.exempt)
        .min_by(|a, b| older(a, b))
        .map(|s| Eviction {
            key: s.key.clone(),
            reason: CloseReason::AutoCloseOldest,
        })
}

/// First victim named by [`EVICTION_STRATEGIES`].
pub fn select_victim(store: &SessionStore, requested: Priority) -> Option<Eviction> {
    EVICTION_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(store, requested))
}

/// Sweep, then evict until fewer than `max` sessions remain.
///
/// Fails with [`DocWardenError::CapacityExhausted`] when every remaining
/// session is exempt. Sessions already evicted stay closed.
pub(crate) fn ensure_capacity(
    ledger: &mut Ledger,
    controller: &dyn ProcessController,
    ttl: &TtlPolicy,
    max: usize,
    requested: Priority,
    now: Instant,
) -> Result<Vec<ClosedSession>> {
    reaper::sweep(ledger, controller, ttl, now);

    let mut evicted = Vec::new();
    while ledger.store.len() >= max {
        let Some(victim) = select_victim(&ledger.store, requested) else {
            warn!(
                active = ledger.store.len(),
                max,
                priority = requested.level(),
                "Capacity exhausted, every active session is exempt"
            );
            return Err(DocWardenError::CapacityExhausted {
                active: ledger.store.len(),
                max,
            });
        };

        if let Some(session) = ledger.store.get(&victim.key) {
            warn!(
                resource = %victim.key,
                victim_priority = session.priority.level(),
                requested_priority = requested.level(),
                reason = %victim.reason,
                "Evicting session"
            );
        }
        match ledger.release(controller, &victim.key, victim.reason) {
            Some(closed) => evicted.push(closed),
            // Unreachable while the lock is held; stop rather than spin.
            None => break,
        }
    }

    if !evicted.is_empty() {
        debug!(evicted = evicted.len(), active = ledger.store.len(), max, "Capacity freed");
    }
    Ok(evicted)
}
