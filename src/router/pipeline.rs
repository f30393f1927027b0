//! The pre/post hook pipeline.
//!
//! # Design Decisions
//! - Pre-hooks: global first, then the resolved chain parent to child
//! - Post-hooks: the chain child to parent, then global
//! - Every hook is awaited before the next one starts
//! - A replacement from a pre-hook becomes the in-flight route for all
//!   later hooks; route-level hooks are taken from the route in flight
//!   once the global hooks are done

use crate::routing::{HookError, HookOutcome, HookSet, ResolvedRoute};

/// Result of the pre-hook phase.
#[derive(Debug)]
pub(crate) enum PreOutcome {
    Proceed(ResolvedRoute),
    Cancelled,
    Failed(HookError),
}

/// Route-level hook sets along the resolved chain, parent first.
fn chain_hooks(route: &ResolvedRoute, pick: fn(&ResolvedRoute) -> &HookSet) -> Vec<HookSet> {
    let mut sets = Vec::new();
    let mut node = Some(route);
    while let Some(current) = node {
        let hooks = pick(current);
        if !hooks.is_empty() {
            sets.push(hooks.clone());
        }
        node = current.child.as_deref();
    }
    sets
}

async fn run_set(hooks: &HookSet, in_flight: &mut ResolvedRoute) -> Option<PreOutcome> {
    for hook in hooks {
        match hook.call(in_flight.clone()).await {
            Ok(HookOutcome::Continue) => {}
            Ok(HookOutcome::Replace(route)) => {
                tracing::debug!(from = %in_flight.path, to = %route.path, "Pre-hook replaced route");
                *in_flight = route;
            }
            Ok(HookOutcome::Cancel) => return Some(PreOutcome::Cancelled),
            Err(e) => return Some(PreOutcome::Failed(e)),
        }
    }
    None
}

pub(crate) async fn run_pre(global: &HookSet, route: ResolvedRoute) -> PreOutcome {
    let mut in_flight = route;

    if let Some(stop) = run_set(global, &mut in_flight).await {
        return stop;
    }
    for hooks in chain_hooks(&in_flight, |r| r.route.pre_hooks()) {
        if let Some(stop) = run_set(&hooks, &mut in_flight).await {
            return stop;
        }
    }

    PreOutcome::Proceed(in_flight)
}

/// Run post-hooks, collecting failures. Post-hooks cannot cancel or
/// replace; such outcomes are ignored.
pub(crate) async fn run_post(global: &HookSet, route: &ResolvedRoute) -> Vec<HookError> {
    let mut sets = chain_hooks(route, |r| r.route.post_hooks());
    sets.reverse();
    sets.push(global.clone());

    let mut errors = Vec::new();
    for hooks in &sets {
        for hook in hooks {
            match hook.call(route.clone()).await {
                Ok(HookOutcome::Continue) => {}
                Ok(_) => {
                    tracing::debug!(path = %route.path, "Ignoring post-hook cancel/replace");
                }
                Err(e) => {
                    tracing::error!(path = %route.path, error = %e, "Post-hook failed");
                    errors.push(e);
                }
            }
        }
    }
    errors
}
