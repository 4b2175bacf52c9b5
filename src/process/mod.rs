//! Process control for the external office application.
//!
//! This is the only layer that knows about OS processes. The rest of the
//! crate treats [`ProcessHandle`] as opaque and talks to a
//! [`ProcessController`].

#[cfg(test)]
pub(crate) mod mock;
mod native;
mod strategy;

pub use native::{LaunchConfig, NativeProcessController};
pub use strategy::LaunchStrategy;

use std::fmt;
use std::process::Child;
use std::sync::Arc;

use serde::Serialize;

use crate::session::ResourceKey;
use crate::Result;

/// Starts, probes and stops the processes behind sessions.
pub trait ProcessController: Send + Sync {
    /// Launch the application for a resource.
    ///
    /// Returns a handle only once the process is confirmed to be still
    /// running shortly after start.
    fn launch(&self, key: &ResourceKey) -> Result<ProcessHandle>;

    /// Check whether the process is still running.
    fn is_alive(&self, handle: &mut ProcessHandle) -> bool;

    /// Stop the process: graceful signal, grace period, then forced kill.
    ///
    /// Never fails; an unconfirmed kill is reported as
    /// [`Termination::Incomplete`].
    fn terminate(&self, handle: &mut ProcessHandle) -> Termination;
}

impl<C: ProcessController + ?Sized> ProcessController for Arc<C> {
    fn launch(&self, key: &ResourceKey) -> Result<ProcessHandle> {
        (**self).launch(key)
    }

    fn is_alive(&self, handle: &mut ProcessHandle) -> bool {
        (**self).is_alive(handle)
    }

    fn terminate(&self, handle: &mut ProcessHandle) -> Termination {
        (**self).terminate(handle)
    }
}

/// Owned reference to a running process.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    child: Option<Child>,
    strategy: Option<String>,
}

impl ProcessHandle {
    /// Wrap a child spawned by this process.
    pub fn from_child(child: Child, strategy: impl Into<String>) -> Self {
        Self {
            pid: child.id(),
            child: Some(child),
            strategy: Some(strategy.into()),
        }
    }

    /// Reference a process by pid only.
    pub fn detached(pid: u32) -> Self {
        Self {
            pid,
            child: None,
            strategy: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// The launch strategy that started this process, if known.
    pub fn strategy(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    pub(crate) fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }
}

/// Outcome of a terminate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Termination {
    /// The process was already gone.
    AlreadyExited,
    /// Exited within the grace period after the graceful signal.
    Graceful,
    /// Needed the forced kill.
    Forced,
    /// Could not be confirmed dead. The process may have leaked.
    Incomplete { reason: String },
}

impl Termination {
    /// Whether the process is known to be gone.
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, Termination::Incomplete { .. })
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::AlreadyExited => f.write_str("already exited"),
            Termination::Graceful => f.write_str("terminated gracefully"),
            Termination::Forced => f.write_str("killed"),
            Termination::Incomplete { reason } => write!(f, "termination incomplete: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_handle() {
        let mut handle = ProcessHandle::detached(4242);
        assert_eq!(handle.pid(), 4242);
        assert!(handle.strategy().is_none());
        assert!(handle.child_mut().is_none());
    }

    #[test]
    fn test_termination_confirmed() {
        assert!(Termination::AlreadyExited.is_confirmed());
        assert!(Termination::Graceful.is_confirmed());
        assert!(Termination::Forced.is_confirmed());
        assert!(!Termination::Incomplete {
            reason: "still running".into()
        }
        .is_confirmed());
    }

    #[test]
    fn test_termination_serialization() {
        let json = serde_json::to_value(Termination::Incomplete {
            reason: "EPERM".into(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "incomplete");
        assert_eq!(json["reason"], "EPERM");
    }
}
