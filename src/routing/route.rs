//! The declarative route entity.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::marshal::Params;
use crate::query::{Query, QueryExpectation};
use crate::routing::hooks::HookSet;
use crate::routing::matcher::{self, RouteMatch};
use crate::routing::path::{PathSpec, PatternError};
use crate::routing::table::RouteTable;

/// A path specifier plus everything that should happen when it matches.
///
/// Routes are immutable once placed in a [`RouteTable`], except for the
/// `active` flag, which is owned by the router instance that resolved it.
#[derive(Debug)]
pub struct Route {
    name: Option<String>,
    spec: PathSpec,
    component: Option<String>,
    pre: HookSet,
    post: HookSet,
    children: RouteTable,
    status: Option<u16>,
    query: Option<QueryExpectation>,
    active: AtomicBool,
}

impl Route {
    pub fn new(spec: PathSpec) -> Self {
        let status = match &spec {
            PathSpec::Numeric(code) => u16::try_from(*code)
                .ok()
                .filter(|c| (100..600).contains(c)),
            _ => None,
        };
        Self {
            name: None,
            spec,
            component: None,
            pre: HookSet::default(),
            post: HookSet::default(),
            children: RouteTable::default(),
            status,
            query: None,
            active: AtomicBool::new(false),
        }
    }

    /// A route from a string path; metacharacters make it a pattern.
    pub fn path(path: &str) -> Result<Self, PatternError> {
        PathSpec::parse(path).map(Self::new)
    }

    /// A route matching the full path against `pattern`.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        PathSpec::regex(pattern).map(Self::new)
    }

    /// A status route (`404`, `500`, ...).
    pub fn code(code: i64) -> Self {
        Self::new(PathSpec::Numeric(code))
    }

    /// The route with no path, matched for `/`.
    pub fn default_route() -> Self {
        Self::new(PathSpec::Default)
    }

    /// A bare stand-in for a path nothing matched.
    pub fn placeholder(path: &str, status: u16) -> Self {
        Self::new(PathSpec::literal(path)).with_status(status)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_pre(mut self, hooks: impl Into<HookSet>) -> Self {
        self.pre = hooks.into();
        self
    }

    pub fn with_post(mut self, hooks: impl Into<HookSet>) -> Self {
        self.post = hooks.into();
        self
    }

    pub fn with_children(mut self, children: RouteTable) -> Self {
        self.children = children;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Require the querystring to match as well as the path.
    pub fn with_query(mut self, expectation: QueryExpectation) -> Self {
        self.query = Some(expectation).filter(|q| !q.is_empty());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn spec(&self) -> &PathSpec {
        &self.spec
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn pre_hooks(&self) -> &HookSet {
        &self.pre
    }

    pub fn post_hooks(&self) -> &HookSet {
        &self.post
    }

    pub fn children(&self) -> &RouteTable {
        &self.children
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn query_expectation(&self) -> Option<&QueryExpectation> {
        self.query.as_ref()
    }

    /// Test the path only.
    pub fn test(&self, candidate: &str, base: Option<&str>) -> Option<RouteMatch> {
        matcher::test(&self.spec, candidate, base)
    }

    /// Test the route's query expectation, if it carries one.
    pub(crate) fn test_query(&self, query: &Query) -> Option<BTreeMap<String, Params>> {
        match &self.query {
            Some(expected) => query.test(expected),
            None => Some(Default::default()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Value;
    use regex::Regex;

    #[test]
    fn test_code_route_carries_status() {
        assert_eq!(Route::code(404).status(), Some(404));
        assert_eq!(Route::code(7).status(), None);
        assert_eq!(Route::path("/a").unwrap().status(), None);
    }

    #[test]
    fn test_named_regex_route() {
        let route = Route::regex(r"^/parameter-extraction/(?<child>.*)$").unwrap();
        let m = route.test("/parameter-extraction/foo", None).unwrap();
        assert_eq!(m.params.get("child"), Some(&Value::from("foo")));
        assert!(route.test("/other", None).is_none());
    }

    #[test]
    fn test_optional_group_keeps_positions() {
        let route = Route::regex(r"^/(a)?/?(b)$").unwrap();
        let m = route.test("/b", None).unwrap();
        assert_eq!(m.params.at(0), Some(&Value::Null));
        assert_eq!(m.params.at(1), Some(&Value::from("b")));

        let m = route.test("/a/b", None).unwrap();
        assert_eq!(m.params.at(0), Some(&Value::from("a")));
    }

    #[test]
    fn test_query_expectation() {
        let route = Route::path("/search")
            .unwrap()
            .with_query(QueryExpectation::new().expect("q", Regex::new(r"^(\w+)$").unwrap()));
        let ok = route.test_query(&Query::parse("q=rust")).unwrap();
        assert_eq!(ok.get("q").and_then(|p| p.at(0)), Some(&Value::from("rust")));
        assert!(route.test_query(&Query::parse("q=a b")).is_none());
        assert!(route.test_query(&Query::parse("other=1")).is_none());

        let plain = Route::path("/search").unwrap();
        assert!(plain.test_query(&Query::default()).unwrap().is_empty());
    }

    #[test]
    fn test_active_flag() {
        let route = Route::default_route();
        assert!(!route.is_active());
        route.set_active(true);
        assert!(route.is_active());
    }
}
