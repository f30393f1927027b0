//! Route matching logic.
//!
//! # Responsibilities
//! - Scope a candidate path to a base path
//! - Test one path specifier against the scoped candidate
//! - Extract parameters and the unmatched remainder
//!
//! # Design Decisions
//! - Exact matches (literal, pattern, regex, numeric, default) outrank
//!   first-segment prefix matches
//! - Regex and pattern routes are terminal: no remainder
//! - Scope boundaries are exact: `/nestedX` is not under `/nested`

use serde::Serialize;

use crate::marshal::Params;
use crate::routing::path::{normalize_candidate, PathSpec};

/// Strength of a match, used for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Prefix,
}

/// The outcome of testing one route against one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMatch {
    /// The specifier that matched.
    pub spec: PathSpec,
    /// The scoped, normalized candidate path.
    pub path: String,
    pub params: Params,
    /// Unmatched suffix for nested routers.
    pub remaining: Option<String>,
    #[serde(skip)]
    pub kind: MatchKind,
}

/// Strip `base` from `path`, if `path` lies under it.
pub fn strip_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return Some(path);
    }
    if path == base {
        return Some("/");
    }
    path.strip_prefix(base).filter(|rest| rest.starts_with('/'))
}

/// True if `path` equals `base` or lies below it on a segment boundary.
pub fn in_scope(path: &str, base: &str) -> bool {
    strip_base(path, base).is_some()
}

/// Non-empty path segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Test `spec` against `candidate`, optionally scoped under `base`.
pub fn test(spec: &PathSpec, candidate: &str, base: Option<&str>) -> Option<RouteMatch> {
    let scoped = match base {
        Some(base) => strip_base(candidate, base)?,
        None => candidate,
    };
    let path = normalize_candidate(scoped);

    let exact = |params: Params, remaining: Option<String>| RouteMatch {
        spec: spec.clone(),
        path: path.clone(),
        params,
        remaining,
        kind: MatchKind::Exact,
    };

    match spec {
        PathSpec::Default => (path == "/").then(|| exact(Params::None, None)),

        PathSpec::Regex(re) => {
            let caps = re.captures(&path)?;
            Some(exact(Params::from_captures(re, &caps), None))
        }

        PathSpec::Pattern(re) => {
            let joined = segments(&path).join("/");
            let caps = re.captures(&joined)?;
            Some(exact(Params::from_captures(re, &caps), None))
        }

        PathSpec::Numeric(code) => {
            let n = path.trim_matches('/').parse::<i64>().ok()?;
            (n == *code).then(|| exact(Params::None, None))
        }

        PathSpec::Literal(literal) => {
            let segs = segments(&path);
            if path == *literal {
                return Some(exact(Params::None, rest_after_first(&segs)));
            }

            let first = segs.first()?;
            if literal.strip_prefix('/') != Some(*first) {
                return None;
            }
            Some(RouteMatch {
                spec: spec.clone(),
                path: path.clone(),
                params: Params::None,
                remaining: rest_after_first(&segs),
                kind: MatchKind::Prefix,
            })
        }
    }
}

fn rest_after_first(segs: &[&str]) -> Option<String> {
    if segs.len() <= 1 {
        None
    } else {
        Some(format!("/{}", segs[1..].join("/")))
    }
}
