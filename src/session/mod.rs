//! Session data model.
//!
//! This module provides the session record, its identity and classification,
//! the lifecycle state machine and the plain storage map.

mod context;
mod key;
mod reason;
mod state;
mod store;

pub use context::{Priority, SessionContext, SessionKind};
pub use key::ResourceKey;
pub use reason::CloseReason;
pub use state::SessionState;
pub use store::{Session, SessionStore};
