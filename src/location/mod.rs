//! URL parsing subsystem.
//!
//! # Data Flow
//! ```text
//! raw URL (absolute, or relative to the current location)
//!     → parser.rs (url::Url parse or join)
//!     → protocol / host / port / normalized path
//!     → query  → Query::parse
//!     → hash   → its own path + Query
//!     → ParsedUrl
//! ```
//!
//! # Design Decisions
//! - The hash is parsed as a second location so hash routing and path
//!   routing can coexist on one page
//! - Paths always start with `/` and default to `/`
//! - Default ports are reported as absent

pub mod parser;

pub use parser::{normalize_path, HashSegment, InvalidUrlError, ParsedUrl, UrlParser};
