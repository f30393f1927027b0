//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! router / registry / query parsing produce:
//!     → tracing events (instance, path, status fields)
//!     → metrics.rs (counters, gauge, histogram)
//!
//! Binary start-up:
//!     ObservabilityConfig → logging.rs (EnvFilter + fmt layer)
//! ```
//!
//! # Design Decisions
//! - Verbose resolution detail at debug/trace, so the configured level
//!   gates it without code changes
//! - Metric updates are facade calls, free when no recorder is installed

pub mod logging;
pub mod metrics;
