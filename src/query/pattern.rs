//! Expected query shapes and per-key matching.
//!
//! # Responsibilities
//! - Describe what a querystring key must look like (value, regex, set)
//! - Compare a raw actual value against one pattern
//!
//! # Design Decisions
//! - Scalar patterns coerce the actual value to the pattern's type first
//! - Regex patterns run against the raw, uncoerced string
//! - All-or-nothing: one failing key fails the whole expectation

use regex::Regex;
use std::collections::BTreeMap;

use crate::marshal::{marshal, Identify, Identity, Marshalled, Params, Value};

/// Pattern for a single query key.
#[derive(Debug, Clone)]
pub enum QueryPattern {
    /// Strict equality after coercing the actual value to this type.
    Exact(Value),
    /// Regex executed against the raw value.
    Regex(Regex),
    /// The actual value must equal one of these.
    OneOf(Vec<Value>),
}

impl Identify for QueryPattern {
    fn identity(&self) -> Identity {
        match self {
            QueryPattern::Exact(v) => v.identity(),
            QueryPattern::Regex(_) => Identity::Regexp,
            QueryPattern::OneOf(_) => Identity::Array,
        }
    }
}

impl From<Regex> for QueryPattern {
    fn from(re: Regex) -> Self {
        QueryPattern::Regex(re)
    }
}

impl From<Value> for QueryPattern {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => QueryPattern::OneOf(items),
            other => QueryPattern::Exact(other),
        }
    }
}

impl From<&str> for QueryPattern {
    fn from(s: &str) -> Self {
        QueryPattern::Exact(Value::from(s))
    }
}

impl From<i64> for QueryPattern {
    fn from(i: i64) -> Self {
        QueryPattern::Exact(Value::from(i))
    }
}

impl From<bool> for QueryPattern {
    fn from(b: bool) -> Self {
        QueryPattern::Exact(Value::Bool(b))
    }
}

impl QueryPattern {
    /// Test one actual entry. `raw` is absent for reconstructed arrays
    /// and objects.
    pub(crate) fn test(&self, raw: Option<&str>, actual: &Marshalled) -> Option<Params> {
        match self {
            QueryPattern::Exact(expected) => {
                exact_match(expected, raw, actual).then(|| Params::Scalar(expected.clone()))
            }
            QueryPattern::OneOf(candidates) => candidates
                .iter()
                .find(|c| exact_match(c, raw, actual))
                .map(|c| Params::Scalar(c.clone())),
            QueryPattern::Regex(re) => {
                let raw = raw?;
                let caps = re.captures(raw)?;
                Some(collapse_captures(re, &caps))
            }
        }
    }
}

fn exact_match(expected: &Value, raw: Option<&str>, actual: &Marshalled) -> bool {
    match (expected, raw) {
        (Value::String(s), Some(raw)) => raw == s,
        (Value::Number(n), Some(raw)) => matches!(marshal(raw).value, Value::Number(m) if m == *n),
        (Value::Bool(b), Some(raw)) => {
            (raw.eq_ignore_ascii_case("true") && *b) || (raw.eq_ignore_ascii_case("false") && !*b)
        }
        _ => actual.value == *expected,
    }
}

// One unnamed capture is a scalar, several are positional, named groups
// form a record. A regex without groups yields the whole match.
fn collapse_captures(re: &Regex, caps: &regex::Captures<'_>) -> Params {
    let params = Params::from_captures(re, caps);
    match params {
        Params::Positional(mut values) if values.len() == 1 => {
            Params::Scalar(values.remove(0))
        }
        Params::None => caps
            .get(0)
            .map(|m| Params::Scalar(marshal(m.as_str()).value))
            .unwrap_or_default(),
        other => other,
    }
}

/// Expected shape for a whole querystring.
#[derive(Debug, Clone, Default)]
pub struct QueryExpectation {
    patterns: BTreeMap<String, QueryPattern>,
}

impl QueryExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an expected key.
    pub fn expect(mut self, key: impl Into<String>, pattern: impl Into<QueryPattern>) -> Self {
        self.patterns.insert(key.into(), pattern.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryPattern)> {
        self.patterns.iter()
    }
}

impl FromIterator<(String, QueryPattern)> for QueryExpectation {
    fn from_iter<I: IntoIterator<Item = (String, QueryPattern)>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}
