//! Route tables and resolution.
//!
//! # Data Flow
//! ```text
//! candidate path + Query
//!     → every route: matcher::test, then query expectation
//!     → first exact match, else first prefix match
//!     → remaining path → children (recursive)
//!     → none: 404 route from the table, or a bare placeholder
//! ```

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::marshal::Params;
use crate::query::Query;
use crate::routing::matcher::{MatchKind, RouteMatch};
use crate::routing::path::{normalize_candidate, PathSpec};
use crate::routing::route::Route;

pub const NOT_FOUND: u16 = 404;
pub const SERVER_ERROR: u16 = 500;

/// An ordered set of routes. Declaration order breaks ties.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, route: Route) {
        self.routes.push(Arc::new(route));
    }

    /// Builder form of [`push`](Self::push).
    pub fn route(mut self, route: Route) -> Self {
        self.push(route);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    /// Look up a route by name, searching children depth-first.
    pub fn named(&self, name: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find_map(|route| {
            if route.name() == Some(name) {
                Some(route)
            } else {
                route.children().named(name)
            }
        })
    }

    /// The configured route for a status code, if any.
    pub fn status_route(&self, code: u16) -> Option<&Arc<Route>> {
        self.routes
            .iter()
            .find(|route| matches!(route.spec(), PathSpec::Numeric(n) if *n == i64::from(code)))
    }

    /// Find the best match for `candidate`, or `None`.
    pub fn find(&self, candidate: &str, query: &Query, base: Option<&str>) -> Option<ResolvedRoute> {
        let mut prefix: Option<ResolvedRoute> = None;

        for route in &self.routes {
            let Some(found) = route.test(candidate, base) else {
                continue;
            };
            let Some(query_params) = route.test_query(query) else {
                tracing::trace!(route = %route.spec(), "Path matched but query did not");
                continue;
            };

            let kind = found.kind;
            let resolved = ResolvedRoute::from_match(route.clone(), found, query_params, query);
            match kind {
                MatchKind::Exact => return Some(resolved),
                MatchKind::Prefix if prefix.is_none() => prefix = Some(resolved),
                MatchKind::Prefix => {}
            }
        }

        prefix
    }

    /// Resolve `candidate`, falling back to the not-found target.
    pub fn resolve(&self, candidate: &str, query: &Query, base: Option<&str>) -> ResolvedRoute {
        match self.find(candidate, query, base) {
            Some(resolved) => resolved,
            None => {
                let scoped = match base {
                    Some(base) => crate::routing::matcher::strip_base(candidate, base)
                        .unwrap_or(candidate),
                    None => candidate,
                };
                self.not_found(scoped)
            }
        }
    }

    /// The 404 target for `path`: the configured `404` route, else a
    /// bare placeholder.
    pub fn not_found(&self, path: &str) -> ResolvedRoute {
        let route = self
            .status_route(NOT_FOUND)
            .cloned()
            .unwrap_or_else(|| Arc::new(Route::placeholder(path, NOT_FOUND)));
        ResolvedRoute::new(route, normalize_candidate(path)).with_status(NOT_FOUND)
    }

    /// The configured `500` target for `path`, if the table has one.
    pub fn error_route(&self, path: &str) -> Option<ResolvedRoute> {
        self.status_route(SERVER_ERROR).map(|route| {
            ResolvedRoute::new(route.clone(), normalize_candidate(path)).with_status(SERVER_ERROR)
        })
    }
}

impl FromIterator<Route> for RouteTable {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

/// A route resolved against a concrete location.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub route: Arc<Route>,
    /// Scoped, normalized path that was resolved.
    pub path: String,
    pub params: Params,
    pub remaining: Option<String>,
    /// Captures from the route's query expectation.
    pub query: BTreeMap<String, Params>,
    pub status: u16,
    /// Resolution of `remaining` against the route's children.
    pub child: Option<Box<ResolvedRoute>>,
}

impl ResolvedRoute {
    /// Resolve straight to `route`, without matching.
    pub fn new(route: Arc<Route>, path: impl Into<String>) -> Self {
        let status = route.status().unwrap_or(200);
        Self {
            route,
            path: path.into(),
            params: Params::None,
            remaining: None,
            query: BTreeMap::new(),
            status,
            child: None,
        }
    }

    fn from_match(
        route: Arc<Route>,
        found: RouteMatch,
        query_params: BTreeMap<String, Params>,
        query: &Query,
    ) -> Self {
        let child = match &found.remaining {
            Some(rest) if !route.children().is_empty() => {
                route.children().find(rest, query, None).map(Box::new)
            }
            _ => None,
        };
        let status = route.status().unwrap_or(200);
        Self {
            route,
            path: found.path,
            params: found.params,
            remaining: found.remaining,
            query: query_params,
            status,
            child,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.route.name()
    }

    pub fn component(&self) -> Option<&str> {
        self.route.component()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == NOT_FOUND
    }

    /// The deepest resolved child, or `self`.
    pub fn leaf(&self) -> &ResolvedRoute {
        let mut node = self;
        while let Some(child) = &node.child {
            node = child;
        }
        node
    }

    /// Same route object with the same captures, all the way down.
    pub fn is_same_target(&self, other: &ResolvedRoute) -> bool {
        Arc::ptr_eq(&self.route, &other.route)
            && self.path == other.path
            && self.params == other.params
            && self.query == other.query
            && match (&self.child, &other.child) {
                (Some(a), Some(b)) => a.is_same_target(b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl Serialize for ResolvedRoute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResolvedRoute", 9)?;
        state.serialize_field("name", &self.route.name())?;
        state.serialize_field("route", self.route.spec())?;
        state.serialize_field("component", &self.route.component())?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("params", &self.params)?;
        state.serialize_field("remaining", &self.remaining)?;
        state.serialize_field("query", &self.query)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("child", &self.child)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Value;
    use crate::query::QueryExpectation;
    use regex::Regex;

    fn table() -> RouteTable {
        RouteTable::new()
            .route(Route::default_route().with_name("home"))
            .route(Route::path("/about").unwrap().with_name("about"))
            .route(
                Route::path("/users")
                    .unwrap()
                    .with_name("users")
                    .with_children(
                        RouteTable::new()
                            .route(Route::regex(r"^/(?<id>\d+)$").unwrap().with_name("user")),
                    ),
            )
            .route(Route::path("/about/team").unwrap().with_name("team"))
    }

    #[test]
    fn test_default_route() {
        let t = table();
        assert_eq!(t.resolve("/", &Query::default(), None).name(), Some("home"));
        assert_eq!(t.resolve("", &Query::default(), None).name(), Some("home"));
    }

    #[test]
    fn test_exact_beats_prefix() {
        let t = table();
        let r = t.resolve("/about/team", &Query::default(), None);
        assert_eq!(r.name(), Some("team"));

        let r = t.resolve("/about/history", &Query::default(), None);
        assert_eq!(r.name(), Some("about"));
        assert_eq!(r.remaining.as_deref(), Some("/history"));
    }

    #[test]
    fn test_children_resolved_from_remaining() {
        let r = table().resolve("/users/42", &Query::default(), None);
        assert_eq!(r.name(), Some("users"));
        let child = r.child.as_deref().unwrap();
        assert_eq!(child.name(), Some("user"));
        assert_eq!(child.params.get("id"), Some(&Value::from(42_i64)));
        assert_eq!(r.leaf().name(), Some("user"));
    }

    #[test]
    fn test_not_found_placeholder() {
        let r = table().resolve("/missing", &Query::default(), None);
        assert_eq!(r.status, NOT_FOUND);
        assert_eq!(r.path, "/missing");
        assert!(r.component().is_none());
    }

    #[test]
    fn test_configured_status_routes() {
        let t = table()
            .route(Route::code(404).with_component("NotFound"))
            .route(Route::code(500).with_component("Oops"));
        let r = t.resolve("/missing", &Query::default(), None);
        assert_eq!(r.component(), Some("NotFound"));
        assert!(r.is_not_found());
        assert_eq!(t.error_route("/x").unwrap().component(), Some("Oops"));
        assert!(table().error_route("/x").is_none());
    }

    #[test]
    fn test_query_expectation_filters_route() {
        let t = RouteTable::new()
            .route(
                Route::path("/search")
                    .unwrap()
                    .with_name("digits")
                    .with_query(QueryExpectation::new().expect("q", Regex::new(r"^(\d+)$").unwrap())),
            )
            .route(Route::path("/search").unwrap().with_name("any"));

        let r = t.resolve("/search", &Query::parse("q=12"), None);
        assert_eq!(r.name(), Some("digits"));
        assert_eq!(r.query.get("q"), Some(&Params::Scalar(Value::from(12_i64))));

        let r = t.resolve("/search", &Query::parse("q=abc"), None);
        assert_eq!(r.name(), Some("any"));
    }

    #[test]
    fn test_scoped_resolution() {
        let t = table();
        let r = t.resolve("/nested/about", &Query::default(), Some("/nested"));
        assert_eq!(r.name(), Some("about"));
        let r = t.resolve("/nested", &Query::default(), Some("/nested"));
        assert_eq!(r.name(), Some("home"));
    }

    #[test]
    fn test_same_target() {
        let t = table();
        let a = t.resolve("/users/1", &Query::default(), None);
        let b = t.resolve("/users/1", &Query::default(), None);
        let c = t.resolve("/users/2", &Query::default(), None);
        assert!(a.is_same_target(&b));
        assert!(!a.is_same_target(&c));
    }

    #[test]
    fn test_serialize_resolved() {
        let r = table().resolve("/users/7", &Query::default(), None);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["name"], "users");
        assert_eq!(json["route"], "/users");
        assert_eq!(json["status"], 200);
        assert_eq!(json["child"]["params"]["id"], 7);
    }
}
