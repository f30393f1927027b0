//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Construction (route table build or config load):
//!     path string / regex / status code
//!     → path.rs (classify once: Literal, Pattern, Regex, Numeric, Default)
//!     → route.rs (Route: spec + hooks + children + query expectation)
//!     → table.rs (ordered RouteTable)
//!
//! Resolution:
//!     scoped candidate path + Query
//!     → matcher.rs (per route: match, params, remaining)
//!     → table.rs (exact before prefix, children, 404 fallback)
//!     → ResolvedRoute
//! ```
//!
//! # Design Decisions
//! - Path kinds are a closed union decided at construction time
//! - No match is never an error: it resolves to the 404 target
//! - First declared route wins among equally strong matches
//! - Tables are shared behind `Arc` and compared by identity

pub mod hooks;
pub mod matcher;
pub mod path;
pub mod route;
pub mod table;

pub use hooks::{BoxError, Hook, HookError, HookOutcome, HookResult, HookSet, IntoHookResult};
pub use matcher::{in_scope, MatchKind, RouteMatch};
pub use path::{PathSpec, PatternError};
pub use route::Route;
pub use table::{ResolvedRoute, RouteTable, NOT_FOUND, SERVER_ERROR};
