//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → RouterConfig (validated, immutable)
//!     → compile.rs (RouteTable / RouterInstance per [[routers]])
//!
//! On file change (parent directory watched, events filtered by name):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → compile.rs builds new tables
//!     → ConfigUpdate { config, tables } sent to the consumer
//!     → RouterInstance::set_routes (atomic swap, re-resolve)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A reload that fails validation keeps the running tables

pub mod compile;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use compile::{build_instance, compile_routes};
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    InstanceConfig, ObservabilityConfig, QueryConfig, QueryPatternConfig, RouteConfig,
    RouterConfig, ScalarConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::{reload, ConfigUpdate, ConfigWatcher, ReloadError};
