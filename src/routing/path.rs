//! Route path specifiers.
//!
//! # Design Decisions
//! - The specifier kind is decided once, when the route is built
//! - Strings containing regex metacharacters or whitespace compile to
//!   patterns; everything else is a literal
//! - Pattern length and compiled size are capped

use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::location::normalize_path;

/// Maximum accepted length of a route pattern in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum compiled regex size in bytes.
const MAX_REGEX_SIZE: usize = 1 << 20;

const METACHARACTERS: &[char] = &[
    '[', ']', '{', '}', '(', ')', '*', '+', '?', '.', ',', '\\', '^', '$', '|', '#',
];

/// Errors raised while compiling a route path.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("route pattern is {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("invalid route pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// How a route's path is matched.
#[derive(Debug, Clone)]
pub enum PathSpec {
    /// No path: matches only the empty path or `/`.
    Default,
    /// Exact path, or first-segment prefix.
    Literal(String),
    /// Raw pattern run against the slash-joined segments.
    Pattern(Regex),
    /// Regex run against the full candidate path.
    Regex(Regex),
    /// Status-style numeric path.
    Numeric(i64),
}

impl PathSpec {
    /// Classify a string path.
    pub fn parse(path: &str) -> Result<Self, PatternError> {
        if path.chars().any(|c| METACHARACTERS.contains(&c) || c.is_whitespace()) {
            return compile_regex(path).map(PathSpec::Pattern);
        }
        Ok(Self::literal(path))
    }

    /// Compile a string as a full-path regex.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        compile_regex(pattern).map(PathSpec::Regex)
    }

    /// A literal path, normalized to a leading `/` and no trailing `/`.
    pub fn literal(path: &str) -> Self {
        PathSpec::Literal(normalize_candidate(path))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, PathSpec::Default)
    }
}

impl From<Regex> for PathSpec {
    fn from(re: Regex) -> Self {
        PathSpec::Regex(re)
    }
}

impl From<i64> for PathSpec {
    fn from(code: i64) -> Self {
        PathSpec::Numeric(code)
    }
}

impl PartialEq for PathSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PathSpec::Default, PathSpec::Default) => true,
            (PathSpec::Literal(a), PathSpec::Literal(b)) => a == b,
            (PathSpec::Pattern(a), PathSpec::Pattern(b)) => a.as_str() == b.as_str(),
            (PathSpec::Regex(a), PathSpec::Regex(b)) => a.as_str() == b.as_str(),
            (PathSpec::Numeric(a), PathSpec::Numeric(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSpec::Default => Ok(()),
            PathSpec::Literal(s) => f.write_str(s),
            PathSpec::Pattern(re) => f.write_str(re.as_str()),
            PathSpec::Regex(re) => write!(f, "/{}/", re.as_str()),
            PathSpec::Numeric(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for PathSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathSpec::Default => serializer.serialize_none(),
            PathSpec::Numeric(n) => serializer.serialize_i64(*n),
            other => serializer.collect_str(other),
        }
    }
}

/// Compile `pattern` with the length and size caps applied.
pub(crate) fn compile_regex(pattern: &str) -> Result<Regex, PatternError> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(PatternError::TooLong {
            len: pattern.len(),
            max: MAX_PATTERN_LENGTH,
        });
    }
    RegexBuilder::new(pattern)
        .size_limit(MAX_REGEX_SIZE)
        .build()
        .map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source,
        })
}

/// Leading `/`, no trailing `/` (except the root itself).
pub fn normalize_candidate(path: &str) -> String {
    let normalized = normalize_path(path);
    if normalized.len() > 1 && normalized.ends_with('/') {
        let trimmed = normalized.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(PathSpec::parse("about").unwrap(), PathSpec::Literal("/about".into()));
        assert_eq!(PathSpec::parse("/users/").unwrap(), PathSpec::Literal("/users".into()));
        assert!(matches!(PathSpec::parse(r"user/(\d+)").unwrap(), PathSpec::Pattern(_)));
        assert!(matches!(PathSpec::parse("a b").unwrap(), PathSpec::Pattern(_)));
        assert!(matches!(PathSpec::parse("file.txt").unwrap(), PathSpec::Pattern(_)));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            PathSpec::parse("user/(unclosed"),
            Err(PatternError::Invalid { .. })
        ));
        let long = "a+".repeat(600);
        assert!(matches!(PathSpec::parse(&long), Err(PatternError::TooLong { .. })));
    }

    #[test]
    fn test_normalize_candidate() {
        assert_eq!(normalize_candidate(""), "/");
        assert_eq!(normalize_candidate("//"), "/");
        assert_eq!(normalize_candidate("a/b/"), "/a/b");
    }

    #[test]
    fn test_display() {
        assert_eq!(PathSpec::regex("^/x$").unwrap().to_string(), "/^/x$/");
        assert_eq!(PathSpec::Numeric(404).to_string(), "404");
        assert_eq!(PathSpec::Default.to_string(), "");
    }
}
