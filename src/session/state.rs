//! Session lifecycle state machine.

use serde::Serialize;

/// Lifecycle state of a document session.
///
/// `Opening` only exists while a launch is in flight; a failed launch goes
/// straight to `Closed` and nothing is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Process is being launched.
    #[default]
    Opening,
    /// Process confirmed alive and tracked.
    Active,
    /// A close trigger fired; termination is in progress.
    Closing,
    /// Bookkeeping removed.
    Closed,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Opening -> Active
    /// - Opening -> Closed (launch failure)
    /// - Active -> Closing
    /// - Closing -> Closed
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Opening, Active) | (Opening, Closed) | (Active, Closing) | (Closing, Closed)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::DocWardenError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// Check if the session counts against capacity.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}
