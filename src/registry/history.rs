//! History abstraction.
//!
//! # Responsibilities
//! - Hold the current location and the back/forward stack
//! - Expose a single swappable mutation hook for push/replace
//! - Broadcast popstate on back/forward
//!
//! # Design Decisions
//! - The hook runs after the mutation, outside any lock
//! - `set_mutation_hook` returns the previous hook so a wrapper can be
//!   removed by putting the exact original back

use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;
use url::Url;

/// Origin used when none is configured.
pub const DEFAULT_ORIGIN: &str = "http://localhost/";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid history URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Which entry point mutated the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Push,
    Replace,
}

/// Callback run after every push or replace.
pub struct MutationHook(Box<dyn Fn(Mutation, &Url) + Send + Sync>);

impl MutationHook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Mutation, &Url) + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }

    pub fn call(&self, mutation: Mutation, url: &Url) {
        (self.0)(mutation, url)
    }
}

impl fmt::Debug for MutationHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MutationHook")
    }
}

/// A browser-like session history.
pub trait History: Send + Sync + fmt::Debug {
    /// The current location.
    fn location(&self) -> Url;

    /// Add an entry and make it current. Relative URLs resolve against
    /// the current location.
    fn push(&self, url: &str) -> Result<(), HistoryError>;

    /// Overwrite the current entry.
    fn replace(&self, url: &str) -> Result<(), HistoryError>;

    /// Step back. Returns false at the start of the stack.
    fn back(&self) -> bool;

    /// Step forward. Returns false at the end of the stack.
    fn forward(&self) -> bool;

    /// Receive a unit message on every back/forward step.
    fn subscribe_popstate(&self) -> broadcast::Receiver<()>;

    fn mutation_hook(&self) -> Option<Arc<MutationHook>>;

    /// Install `hook`, returning the one it replaced.
    fn set_mutation_hook(&self, hook: Option<Arc<MutationHook>>) -> Option<Arc<MutationHook>>;
}

#[derive(Debug)]
struct Stack {
    entries: Vec<Url>,
    cursor: usize,
}

/// In-memory [`History`].
#[derive(Debug)]
pub struct MemoryHistory {
    stack: Mutex<Stack>,
    hook: ArcSwapOption<MutationHook>,
    popstate: broadcast::Sender<()>,
}

impl MemoryHistory {
    pub fn new(initial: &str) -> Result<Self, HistoryError> {
        let url = Url::parse(initial).map_err(|source| HistoryError::InvalidUrl {
            url: initial.to_string(),
            source,
        })?;
        let (popstate, _) = broadcast::channel(16);
        Ok(Self {
            stack: Mutex::new(Stack {
                entries: vec![url],
                cursor: 0,
            }),
            hook: ArcSwapOption::empty(),
            popstate,
        })
    }

    /// Number of entries on the stack.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Stack> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, raw: &str) -> Result<Url, HistoryError> {
        let joined = if raw.contains("://") {
            Url::parse(raw)
        } else {
            self.location().join(raw)
        };
        joined.map_err(|source| HistoryError::InvalidUrl {
            url: raw.to_string(),
            source,
        })
    }

    fn mutate(&self, mutation: Mutation, raw: &str) -> Result<(), HistoryError> {
        let url = self.resolve(raw)?;
        {
            let mut stack = self.lock();
            match mutation {
                Mutation::Push => {
                    let keep = stack.cursor + 1;
                    stack.entries.truncate(keep);
                    stack.entries.push(url.clone());
                    stack.cursor = keep;
                }
                Mutation::Replace => {
                    let cursor = stack.cursor;
                    stack.entries[cursor] = url.clone();
                }
            }
        }

        tracing::trace!(?mutation, url = %url, "History mutated");
        if let Some(hook) = self.hook.load_full() {
            hook.call(mutation, &url);
        }
        Ok(())
    }

    fn step(&self, forward: bool) -> bool {
        {
            let mut stack = self.lock();
            if forward {
                if stack.cursor + 1 >= stack.entries.len() {
                    return false;
                }
                stack.cursor += 1;
            } else {
                if stack.cursor == 0 {
                    return false;
                }
                stack.cursor -= 1;
            }
        }
        let _ = self.popstate.send(());
        true
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Url {
        let stack = self.lock();
        stack.entries[stack.cursor].clone()
    }

    fn push(&self, url: &str) -> Result<(), HistoryError> {
        self.mutate(Mutation::Push, url)
    }

    fn replace(&self, url: &str) -> Result<(), HistoryError> {
        self.mutate(Mutation::Replace, url)
    }

    fn back(&self) -> bool {
        self.step(false)
    }

    fn forward(&self) -> bool {
        self.step(true)
    }

    fn subscribe_popstate(&self) -> broadcast::Receiver<()> {
        self.popstate.subscribe()
    }

    fn mutation_hook(&self) -> Option<Arc<MutationHook>> {
        self.hook.load_full()
    }

    fn set_mutation_hook(&self, hook: Option<Arc<MutationHook>>) -> Option<Arc<MutationHook>> {
        self.hook.swap(hook)
    }
}
