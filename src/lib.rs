//! Scoped client-side URL routing.
//!
//! Resolves a location (path, querystring, hash) to a route, extracts
//! typed parameters, and runs a pre/post hook pipeline around each
//! transition. Any number of router instances, each scoped to a base
//! path, share one history through a [`Registry`].
//!
//! # Architecture Overview
//!
//! ```text
//!   history.push / replace / back
//!        │
//!        ▼
//!   ┌──────────┐  scoped   ┌────────────────┐   ┌──────────┐
//!   │ registry │──────────▶│ RouterInstance │──▶│ location │  URL → ParsedUrl
//!   └──────────┘  fan-out  └───────┬────────┘   └──────────┘  (query, marshal)
//!                                  │
//!                                  ▼
//!                          ┌──────────────┐
//!                          │   routing    │  RouteTable → ResolvedRoute
//!                          └──────┬───────┘
//!                                 ▼
//!                      pre-hooks → current → post-hooks
//! ```

// Value parsing
pub mod location;
pub mod marshal;
pub mod query;

// Matching and navigation
pub mod registry;
pub mod router;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod observability;

pub use config::RouterConfig;
pub use error::{Result, RouterError};
pub use location::ParsedUrl;
pub use query::Query;
pub use registry::{History, MemoryHistory, Registry};
pub use router::{NavigationOutcome, RouterInstance};
pub use routing::{Hook, ResolvedRoute, Route, RouteTable};
