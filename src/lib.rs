//! # docwarden
//!
//! Capacity-bounded session manager for documents opened in an external
//! office application.
//!
//! Every open document is a session backed by one OS process. The manager
//! keeps the number of sessions under a limit, evicting lower-priority or
//! older work when needed, closes idle sessions after a per-context TTL, and
//! never touches sessions marked exempt except on explicit request.
//!
//! ## Features
//!
//! - **Admission control**: priority-first eviction with an oldest-first fallback
//! - **TTL sweeps**: dead and idle sessions are reclaimed before every open
//! - **Groups**: related documents opened and closed as a unit
//! - **Best-effort termination**: graceful stop, forced kill, and an explicit
//!   warning when neither can be confirmed
//!
//! ## Quick Start
//!
//! ```no_run
//! use docwarden::{CloseReason, ManagerConfig, OpenRequest, Priority, SessionManager};
//!
//! fn main() -> docwarden::Result<()> {
//!     docwarden::logging::try_init().ok();
//!
//!     let manager = SessionManager::native(ManagerConfig::default());
//!
//!     let outcome = manager.open(
//!         OpenRequest::new("/tmp/quote.odt").priority(Priority::CriticalValidation),
//!     )?;
//!     println!("{}", manager.status()?);
//!
//!     manager.close(outcome.key(), CloseReason::Manual)?;
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod cli;
pub mod config;
pub mod error;
pub mod group;
pub mod history;
mod ledger;
pub mod logging;
pub mod manager;
pub mod process;
pub mod reaper;
pub mod session;

// Re-export commonly used types
pub use error::{DocWardenError, Result};
pub use group::{GroupCreated, GroupId};
pub use history::{SessionAction, SessionEvent};
pub use manager::{
    CloseOutcome, ClosedSession, GroupClosed, ManagerConfig, OpenOutcome, OpenRequest,
    SessionManager, Status, WorkflowReport,
};
pub use process::{
    LaunchConfig, LaunchStrategy, NativeProcessController, ProcessController, ProcessHandle,
    Termination,
};
pub use reaper::{SweepReport, TtlPolicy};
pub use session::{CloseReason, Priority, ResourceKey, SessionContext, SessionKind, SessionState};
