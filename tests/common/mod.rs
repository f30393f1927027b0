//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use scoped_router::registry::DEFAULT_ORIGIN;
use scoped_router::routing::Hook;
use scoped_router::{History, MemoryHistory, Registry, RouterInstance};

/// A fresh in-memory history at the default origin.
pub fn memory_history() -> Arc<dyn History> {
    Arc::new(MemoryHistory::new(DEFAULT_ORIGIN).unwrap())
}

/// Paths seen by a recording hook, in call order.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn paths(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// A hook that records the in-flight path, then sleeps for `delay`.
    pub fn hook(&self, delay: Duration) -> Hook {
        let seen = self.0.clone();
        Hook::new(move |route| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(route.path.clone());
                tokio::time::sleep(delay).await;
            }
        })
    }
}

/// Wait until `rx` holds a value matching `pred`, or give up after a second.
pub async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, pred: F) -> bool
where
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(pred))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

/// Give the dispatcher a moment, then wait until `instance` is idle.
pub async fn settle(registry: &Registry, instance: &RouterInstance) {
    tokio::time::sleep(Duration::from_millis(30)).await;
    let idle = async {
        while registry.is_processing(instance.id()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), idle)
        .await
        .expect("instance did not settle");
}

/// Path of the instance's current route, if any.
pub fn current_path(instance: &RouterInstance) -> Option<String> {
    instance.current().get().map(|r| r.path)
}
