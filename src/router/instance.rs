//! A mounted router instance.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use uuid::Uuid;

use crate::location::{InvalidUrlError, ParsedUrl, UrlParser};
use crate::observability::metrics;
use crate::query::Query;
use crate::registry::{History, HistoryError, Registry, RegistryError, WeakRegistry};
use crate::router::pipeline::{self, PreOutcome};
use crate::router::store::Observable;
use crate::routing::{in_scope, HookError, HookSet, ResolvedRoute, RouteTable, SERVER_ERROR};
use crate::routing::path::normalize_candidate;

/// Which part of the location an instance routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    #[default]
    Path,
    Hash,
}

/// What happens to a history event that arrives mid-transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Ignore it; the next event re-resolves.
    #[default]
    Drop,
    /// Remember it and re-resolve once the transition settles.
    Latest,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceSettings {
    pub mode: RoutingMode,
    /// Re-run hooks and republish when navigating to the active target.
    ///
    /// When unset, a renavigation to the active target is a no-op: neither
    /// pre-hooks nor post-hooks run, so a guard hook is not re-consulted.
    pub rerender_same_route: bool,
    pub overlap: OverlapPolicy,
    /// Fail the whole URL on an undecodable query parameter.
    pub strict_query: bool,
}

/// How a navigation ended.
#[derive(Debug, Clone)]
pub enum NavigationOutcome {
    Completed { status: u16 },
    /// A pre-hook vetoed the transition; `current` is unchanged.
    Cancelled,
    /// A hook failed. Pre-hook failures leave `current` unchanged unless
    /// a `500` route is configured; post-hook failures happen after the
    /// new route was published.
    Failed { status: u16, error: Arc<HookError> },
}

impl NavigationOutcome {
    pub fn status(&self) -> Option<u16> {
        match self {
            NavigationOutcome::Completed { status } | NavigationOutcome::Failed { status, .. } => {
                Some(*status)
            }
            NavigationOutcome::Cancelled => None,
        }
    }

    /// Short outcome name, as used in metrics labels.
    pub fn label(&self) -> &'static str {
        match self {
            NavigationOutcome::Completed { status } if *status == crate::routing::NOT_FOUND => {
                "not_found"
            }
            NavigationOutcome::Completed { .. } => "completed",
            NavigationOutcome::Cancelled => "cancelled",
            NavigationOutcome::Failed { .. } => "failed",
        }
    }
}

/// Resets `navigating` however the transition ends.
struct NavigatingGuard<'a>(&'a Observable<bool>);

impl<'a> NavigatingGuard<'a> {
    fn start(flag: &'a Observable<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for NavigatingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// One router: a base path, a route table and the resolved state.
#[derive(Debug)]
pub struct RouterInstance {
    id: Uuid,
    base_path: String,
    routes: ArcSwap<RouteTable>,
    pre: HookSet,
    post: HookSet,
    settings: InstanceSettings,
    parser: UrlParser,
    history: Arc<dyn History>,
    current: Observable<Option<ResolvedRoute>>,
    navigating: Observable<bool>,
    last_outcome: Observable<Option<NavigationOutcome>>,
    registration: Mutex<Option<WeakRegistry>>,
}

impl RouterInstance {
    pub fn builder(history: Arc<dyn History>) -> RouterInstanceBuilder {
        RouterInstanceBuilder::new(history)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn settings(&self) -> &InstanceSettings {
        &self.settings
    }

    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    pub fn history(&self) -> &Arc<dyn History> {
        &self.history
    }

    /// The active route, if any navigation has completed.
    pub fn current(&self) -> &Observable<Option<ResolvedRoute>> {
        &self.current
    }

    pub fn navigating(&self) -> &Observable<bool> {
        &self.navigating
    }

    pub fn last_outcome(&self) -> &Observable<Option<NavigationOutcome>> {
        &self.last_outcome
    }

    /// True if this instance should handle `url`.
    pub fn accepts(&self, url: &ParsedUrl) -> bool {
        in_scope(self.candidate(url).0, &self.base_path)
    }

    /// Resolve `url` without running hooks or touching state.
    pub fn get(&self, url: &str) -> Result<ResolvedRoute, InvalidUrlError> {
        let parsed = self.parser.parse(url, &self.history.location())?;
        let (path, query) = self.candidate(&parsed);
        Ok(self
            .routes
            .load()
            .resolve(path, query, Some(self.base_path.as_str())))
    }

    /// Navigate to `url`, resolved against the current location.
    pub async fn navigate(&self, url: &str) -> Result<NavigationOutcome, InvalidUrlError> {
        let parsed = self.parser.parse(url, &self.history.location())?;
        Ok(self.navigate_to(&parsed).await)
    }

    /// Resolve the history's current location, if it is in scope.
    pub async fn process_current(&self) -> Option<NavigationOutcome> {
        let parsed = match self.parser.split(&self.history.location()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(instance = %self.id, error = %e, "Cannot parse current location");
                return None;
            }
        };
        if !self.accepts(&parsed) {
            tracing::trace!(instance = %self.id, path = %parsed.path, "Location out of scope");
            return None;
        }
        Some(self.navigate_to(&parsed).await)
    }

    /// Run the full transition for an already-parsed location.
    pub async fn navigate_to(&self, url: &ParsedUrl) -> NavigationOutcome {
        let start_time = Instant::now();
        let table = self.routes.load_full();
        let (path, query) = self.candidate(url);
        let resolved = table.resolve(path, query, Some(self.base_path.as_str()));

        tracing::debug!(
            instance = %self.id,
            path = %resolved.path,
            route = %resolved.route.spec(),
            status = resolved.status,
            "Resolved location"
        );

        let outcome = self.transition(&table, resolved).await;
        metrics::record_navigation(outcome.label(), start_time);
        self.last_outcome.set(Some(outcome.clone()));
        outcome
    }

    async fn transition(&self, table: &RouteTable, resolved: ResolvedRoute) -> NavigationOutcome {
        let previous = self.current.get();
        if let Some(prev) = &previous {
            if !self.settings.rerender_same_route && prev.is_same_target(&resolved) {
                tracing::debug!(instance = %self.id, path = %resolved.path, "Already on route");
                return NavigationOutcome::Completed {
                    status: prev.status,
                };
            }
        }

        let _navigating = NavigatingGuard::start(&self.navigating);
        let path = resolved.path.clone();

        let route = match pipeline::run_pre(&self.pre, resolved).await {
            PreOutcome::Proceed(route) => route,
            PreOutcome::Cancelled => {
                tracing::info!(instance = %self.id, path = %path, "Navigation cancelled by pre-hook");
                return NavigationOutcome::Cancelled;
            }
            PreOutcome::Failed(e) => {
                tracing::error!(instance = %self.id, path = %path, error = %e, "Pre-hook failed");
                if let Some(error_route) = table.error_route(&path) {
                    self.publish(previous.as_ref(), error_route);
                }
                return NavigationOutcome::Failed {
                    status: SERVER_ERROR,
                    error: Arc::new(e),
                };
            }
        };

        let status = route.status;
        self.publish(previous.as_ref(), route.clone());

        let mut errors = pipeline::run_post(&self.post, &route).await;
        if errors.is_empty() {
            tracing::debug!(instance = %self.id, path = %route.path, status, "Navigation completed");
            NavigationOutcome::Completed { status }
        } else {
            NavigationOutcome::Failed {
                status: SERVER_ERROR,
                error: Arc::new(errors.remove(0)),
            }
        }
    }

    fn publish(&self, previous: Option<&ResolvedRoute>, next: ResolvedRoute) {
        if let Some(prev) = previous {
            set_active(prev, false);
            if prev.is_same_target(&next) {
                // Force subscribers that compare values to see a change.
                self.current.set(None);
            }
        }
        set_active(&next, true);
        self.current.set(Some(next));
    }

    /// Swap the route table. Returns false if `table` is the one already
    /// installed. A new table re-resolves the current location.
    pub async fn set_routes(&self, table: Arc<RouteTable>) -> bool {
        if Arc::ptr_eq(&self.routes.load(), &table) {
            return false;
        }
        self.routes.store(table);
        tracing::info!(instance = %self.id, "Route table replaced");

        match self.registry() {
            Some(registry) => registry.notify_instance(self.id),
            None => {
                self.process_current().await;
            }
        }
        true
    }

    /// Push `url` onto the history.
    pub fn push(&self, url: &str) -> Result<(), HistoryError> {
        self.history.push(&self.scoped_url(url))
    }

    /// Replace the current history entry with `url`.
    pub fn replace(&self, url: &str) -> Result<(), HistoryError> {
        self.history.replace(&self.scoped_url(url))
    }

    /// Register with `registry` and resolve the current location.
    pub fn mount(self: &Arc<Self>, registry: &Registry) -> Result<(), RegistryError> {
        registry.register(self.clone())
    }

    /// Unregister and clear this instance's active flags.
    pub fn destroy(&self) {
        if let Some(registry) = self.registry() {
            if let Err(e) = registry.unregister(self.id) {
                tracing::debug!(instance = %self.id, error = %e, "Instance already unregistered");
            }
        }
        self.set_registration(None);
        if let Some(current) = self.current.get() {
            set_active(&current, false);
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.registry().is_some()
    }

    pub(crate) fn set_registration(&self, registry: Option<WeakRegistry>) {
        *self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = registry;
    }

    fn registry(&self) -> Option<Registry> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(WeakRegistry::upgrade)
    }

    fn candidate<'a>(&self, url: &'a ParsedUrl) -> (&'a str, &'a Query) {
        match self.settings.mode {
            RoutingMode::Path => (&url.path, &url.query),
            RoutingMode::Hash => (&url.hash.path, &url.hash.query),
        }
    }

    // Relative paths are taken as relative to the base path.
    fn scoped_url(&self, url: &str) -> String {
        let is_relative = !url.contains("://") && !url.starts_with('/') && !url.starts_with('#');
        match self.settings.mode {
            RoutingMode::Hash if !url.contains("://") && !url.starts_with('#') => {
                format!("#{}", normalize_candidate(url))
            }
            _ if is_relative && self.base_path != "/" => {
                format!("{}/{}", self.base_path, url)
            }
            _ => url.to_string(),
        }
    }
}

fn set_active(route: &ResolvedRoute, active: bool) {
    let mut node = Some(route);
    while let Some(current) = node {
        current.route.set_active(active);
        node = current.child.as_deref();
    }
}

/// Builder for [`RouterInstance`].
pub struct RouterInstanceBuilder {
    history: Arc<dyn History>,
    base_path: String,
    routes: Arc<RouteTable>,
    pre: HookSet,
    post: HookSet,
    settings: InstanceSettings,
}

impl RouterInstanceBuilder {
    fn new(history: Arc<dyn History>) -> Self {
        Self {
            history,
            base_path: "/".to_string(),
            routes: Arc::new(RouteTable::default()),
            pre: HookSet::default(),
            post: HookSet::default(),
            settings: InstanceSettings::default(),
        }
    }

    pub fn base_path(mut self, base_path: &str) -> Self {
        self.base_path = normalize_candidate(base_path);
        self
    }

    pub fn routes(mut self, routes: impl Into<Arc<RouteTable>>) -> Self {
        self.routes = routes.into();
        self
    }

    /// Router-level hooks run before every route's own pre-hooks.
    pub fn pre(mut self, hooks: impl Into<HookSet>) -> Self {
        self.pre = hooks.into();
        self
    }

    /// Router-level hooks run after every route's own post-hooks.
    pub fn post(mut self, hooks: impl Into<HookSet>) -> Self {
        self.post = hooks.into();
        self
    }

    pub fn settings(mut self, settings: InstanceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn mode(mut self, mode: RoutingMode) -> Self {
        self.settings.mode = mode;
        self
    }

    pub fn rerender_same_route(mut self, rerender: bool) -> Self {
        self.settings.rerender_same_route = rerender;
        self
    }

    pub fn overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.settings.overlap = overlap;
        self
    }

    pub fn build(self) -> Arc<RouterInstance> {
        let id = Uuid::new_v4();
        tracing::debug!(instance = %id, base_path = %self.base_path, routes = self.routes.len(), "Router instance created");
        Arc::new(RouterInstance {
            id,
            base_path: self.base_path,
            routes: ArcSwap::new(self.routes),
            pre: self.pre,
            post: self.post,
            parser: UrlParser::new(self.settings.strict_query),
            settings: self.settings,
            history: self.history,
            current: Observable::new(None),
            navigating: Observable::new(false),
            last_outcome: Observable::new(None),
            registration: Mutex::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemoryHistory, DEFAULT_ORIGIN};
    use crate::routing::{Hook, Route};

    fn history() -> Arc<dyn History> {
        Arc::new(MemoryHistory::new(DEFAULT_ORIGIN).unwrap())
    }

    fn table() -> RouteTable {
        RouteTable::new()
            .route(Route::default_route().with_name("home"))
            .route(Route::path("/about").unwrap().with_name("about"))
    }

    #[tokio::test]
    async fn test_navigate_publishes_and_activates() {
        let router = RouterInstance::builder(history()).routes(table()).build();
        let outcome = router.navigate("/about").await.unwrap();
        assert!(matches!(outcome, NavigationOutcome::Completed { status: 200 }));

        let about = router.current().get().unwrap();
        assert_eq!(about.name(), Some("about"));
        assert!(about.route.is_active());
        assert!(!router.navigating().get());

        router.navigate("/").await.unwrap();
        assert!(!about.route.is_active());
        assert!(router.current().get().unwrap().route.is_active());
    }

    #[tokio::test]
    async fn test_get_is_pure() {
        let router = RouterInstance::builder(history()).routes(table()).build();
        let resolved = router.get("/about").unwrap();
        assert_eq!(resolved.name(), Some("about"));
        assert!(router.current().get().is_none());
        assert!(!resolved.route.is_active());
        assert!(matches!(router.get(""), Err(InvalidUrlError::Empty)));
    }

    #[tokio::test]
    async fn test_same_route_skipped_unless_rerender() {
        let router = RouterInstance::builder(history()).routes(table()).build();
        router.navigate("/about").await.unwrap();
        let mut rx = router.current().subscribe();
        rx.borrow_and_update();
        router.navigate("/about").await.unwrap();
        assert!(!rx.has_changed().unwrap());

        let router = RouterInstance::builder(history())
            .routes(table())
            .rerender_same_route(true)
            .build();
        router.navigate("/about").await.unwrap();
        let mut rx = router.current().subscribe();
        rx.borrow_and_update();
        router.navigate("/about").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(router.current().get().unwrap().name(), Some("about"));
    }

    #[tokio::test]
    async fn test_same_route_hooks_run_only_with_rerender() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        for (rerender, expected) in [(false, 1), (true, 2)] {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = calls.clone();
            let router = RouterInstance::builder(history())
                .routes(table())
                .pre(Hook::sync(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }))
                .rerender_same_route(rerender)
                .build();

            router.navigate("/about").await.unwrap();
            router.navigate("/about").await.unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), expected);
        }
    }

    #[tokio::test]
    async fn test_pre_hook_failure_uses_error_route() {
        let routes = table()
            .route(Route::path("/broken").unwrap().with_pre(Hook::sync(|_| Err::<(), _>("nope"))))
            .route(Route::code(500).with_component("Oops"));
        let router = RouterInstance::builder(history()).routes(routes).build();

        let outcome = router.navigate("/broken").await.unwrap();
        assert!(matches!(outcome, NavigationOutcome::Failed { status: 500, .. }));
        assert_eq!(router.current().get().unwrap().component(), Some("Oops"));
        assert!(!router.navigating().get());
    }

    #[tokio::test]
    async fn test_hash_mode() {
        let router = RouterInstance::builder(history())
            .routes(table())
            .mode(RoutingMode::Hash)
            .build();
        let resolved = router.get("/ignored#/about").unwrap();
        assert_eq!(resolved.name(), Some("about"));
    }

    #[tokio::test]
    async fn test_set_routes_identity() {
        let routes = Arc::new(table());
        let router = RouterInstance::builder(history()).routes(routes.clone()).build();
        assert!(!router.set_routes(routes).await);

        router.history().push("/about").unwrap();
        let replacement = Arc::new(RouteTable::new().route(Route::path("/about").unwrap().with_name("new-about")));
        assert!(router.set_routes(replacement).await);
        assert_eq!(router.current().get().unwrap().name(), Some("new-about"));
    }

    #[test]
    fn test_scoped_url() {
        let router = RouterInstance::builder(history()).base_path("/nested/").build();
        assert_eq!(router.base_path(), "/nested");
        assert_eq!(router.scoped_url("child"), "/nested/child");
        assert_eq!(router.scoped_url("/abs"), "/abs");

        let hash = RouterInstance::builder(history()).mode(RoutingMode::Hash).build();
        assert_eq!(hash.scoped_url("about"), "#/about");
    }
}
