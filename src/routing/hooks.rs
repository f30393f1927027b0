//! Navigation hooks.
//!
//! # Responsibilities
//! - Wrap sync and async closures behind one callable `Hook`
//! - Normalize hook return values into `HookOutcome`
//! - Turn hook errors and panics into `HookError`
//!
//! # Design Decisions
//! - A hook receives an owned copy of the in-flight route
//! - `false` cancels, `()`/`true` continues, a route replaces
//! - Panics are caught at the hook boundary, never unwound into the router

use futures_util::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

use crate::marshal::{Identify, Identity};
use crate::routing::table::ResolvedRoute;

/// Boxed error type hooks may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised inside a hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook failed: {0}")]
    Failed(#[source] BoxError),

    #[error("hook panicked: {0}")]
    Panicked(String),
}

/// What a hook decided.
#[derive(Debug, Clone)]
pub enum HookOutcome {
    Continue,
    Cancel,
    Replace(ResolvedRoute),
}

pub type HookResult = Result<HookOutcome, HookError>;

/// Conversion from the values hooks are allowed to return.
pub trait IntoHookResult {
    fn into_hook_result(self) -> HookResult;
}

impl IntoHookResult for HookOutcome {
    fn into_hook_result(self) -> HookResult {
        Ok(self)
    }
}

impl IntoHookResult for () {
    fn into_hook_result(self) -> HookResult {
        Ok(HookOutcome::Continue)
    }
}

impl IntoHookResult for bool {
    fn into_hook_result(self) -> HookResult {
        Ok(if self {
            HookOutcome::Continue
        } else {
            HookOutcome::Cancel
        })
    }
}

impl IntoHookResult for ResolvedRoute {
    fn into_hook_result(self) -> HookResult {
        Ok(HookOutcome::Replace(self))
    }
}

/// `None` continues, `Some` converts the inner value.
impl<T: IntoHookResult> IntoHookResult for Option<T> {
    fn into_hook_result(self) -> HookResult {
        match self {
            Some(value) => value.into_hook_result(),
            None => Ok(HookOutcome::Continue),
        }
    }
}

impl<T, E> IntoHookResult for Result<T, E>
where
    T: IntoHookResult,
    E: Into<BoxError>,
{
    fn into_hook_result(self) -> HookResult {
        match self {
            Ok(value) => value.into_hook_result(),
            Err(e) => Err(HookError::Failed(e.into())),
        }
    }
}

type HookFn = dyn Fn(ResolvedRoute) -> BoxFuture<'static, HookResult> + Send + Sync;

/// A pre- or post-navigation hook.
#[derive(Clone)]
pub struct Hook {
    f: Arc<HookFn>,
}

impl Hook {
    /// Wrap an async hook.
    pub fn new<F, Fut, O>(f: F) -> Self
    where
        F: Fn(ResolvedRoute) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: IntoHookResult,
    {
        Self {
            f: Arc::new(move |route| {
                let fut = f(route);
                async move { fut.await.into_hook_result() }.boxed()
            }),
        }
    }

    /// Wrap a synchronous hook.
    pub fn sync<F, O>(f: F) -> Self
    where
        F: Fn(&ResolvedRoute) -> O + Send + Sync + 'static,
        O: IntoHookResult,
    {
        let f = Arc::new(f);
        Self {
            f: Arc::new(move |route| {
                let f = f.clone();
                async move { f(&route).into_hook_result() }.boxed()
            }),
        }
    }

    /// Run the hook to completion, converting panics into errors.
    pub async fn call(&self, route: ResolvedRoute) -> HookResult {
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.f)(route))) {
            Ok(fut) => fut,
            Err(panic) => return Err(HookError::Panicked(panic_message(panic))),
        };
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(HookError::Panicked(panic_message(panic))),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

impl Identify for Hook {
    fn identity(&self) -> Identity {
        Identity::Function
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// An ordered list of hooks.
#[derive(Debug, Clone, Default)]
pub struct HookSet(Vec<Hook>);

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Hook) {
        self.0.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hook> {
        self.0.iter()
    }
}

impl From<Hook> for HookSet {
    fn from(hook: Hook) -> Self {
        Self(vec![hook])
    }
}

impl From<Vec<Hook>> for HookSet {
    fn from(hooks: Vec<Hook>) -> Self {
        Self(hooks)
    }
}

impl<'a> IntoIterator for &'a HookSet {
    type Item = &'a Hook;
    type IntoIter = std::slice::Iter<'a, Hook>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
