//! Router instances.
//!
//! # Data Flow
//! ```text
//! navigate(url) / process_current()
//!     → location::UrlParser (ParsedUrl)
//!     → scope check against the base path
//!     → RouteTable::resolve (path or hash, per RoutingMode)
//!     → navigating = true
//!     → pipeline.rs pre-hooks (cancel / replace / fail)
//!     → current = resolved route, active flags swapped
//!     → pipeline.rs post-hooks
//!     → navigating = false, last_outcome published
//! ```
//!
//! # Design Decisions
//! - State lives in `watch`-backed observables, not in a UI framework
//! - A cancelled or failed pre-hook phase leaves `current` untouched
//!   (unless a `500` route is configured)
//! - `navigating` is reset by a guard, so it clears on every exit path
//! - Route tables are swapped atomically and compared by `Arc` identity

pub mod instance;
mod pipeline;
pub mod store;

pub use instance::{
    InstanceSettings, NavigationOutcome, OverlapPolicy, RouterInstance, RouterInstanceBuilder,
    RoutingMode,
};
pub use store::Observable;
