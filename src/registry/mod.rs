//! Multi-instance registry.
//!
//! # Data Flow
//! ```text
//! history.push / history.replace
//!     → wrapped mutation hook (original hook first, then notify)
//!     → dispatcher task (also listens for popstate)
//!     → coalesce burst, read current location
//!     → every instance whose base path scopes the location
//!     → ProcessingGuard acquired? spawn process_current
//!       busy? drop (or mark pending, per OverlapPolicy)
//! ```
//!
//! # Design Decisions
//! - One `Registry` per history, created explicitly and passed to
//!   instances; no global state
//! - The history hook is wrapped once on first registration and the
//!   original is put back on last unregistration or drop
//! - Parent/child links follow base-path nesting and drive cascading
//!   unregistration; every instance in scope still resolves the location
//! - At most one transition per instance is in flight

pub mod coordinator;
pub mod history;

pub use coordinator::{Registry, WeakRegistry};
pub use history::{History, HistoryError, MemoryHistory, Mutation, MutationHook, DEFAULT_ORIGIN};

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by registry bookkeeping.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("router instance {0} is not registered")]
    NotRegistered(Uuid),

    #[error("router instance {0} is already registered")]
    AlreadyRegistered(Uuid),
}
