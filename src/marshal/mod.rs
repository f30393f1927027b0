//! Value classification and coercion.
//!
//! # Data Flow
//! ```text
//! raw querystring value ("42", "true", "abc")
//!     → value.rs (marshal: int → float → boolean → string)
//!     → Marshalled { identity, value }
//!
//! typed input (config scalars, regexes, hooks)
//!     → identity.rs (identify: classify, pass through unchanged)
//! ```
//!
//! # Design Decisions
//! - Coercion order is fixed: integer, float, boolean, then plain string
//! - Numbers compare numerically across Int/Float so coercion round-trips
//! - Captured values from paths and queries share one closed `Params` type

pub mod identity;
pub mod params;
pub mod value;

pub use identity::{identify, Identify, Identity};
pub use params::Params;
pub use value::{marshal, Marshalled, Number, Value};

use thiserror::Error;

/// Errors raised while turning raw input into typed values.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// Percent-encoded input that does not decode to UTF-8.
    #[error("cannot decode '{raw}': {source}")]
    InvalidEncoding {
        raw: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// A `[]` append past the largest representable array index.
    #[error("array index overflow in '{key}'")]
    IndexOverflow { key: String },
}
