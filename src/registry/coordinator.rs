//! The multi-instance coordinator.

use dashmap::{DashMap, DashSet};
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::location::UrlParser;
use crate::observability::metrics;
use crate::registry::history::{History, Mutation, MutationHook};
use crate::registry::RegistryError;
use crate::router::{OverlapPolicy, RouterInstance};
use crate::routing::in_scope;

#[derive(Debug)]
struct Entry {
    instance: Arc<RouterInstance>,
    parent: Option<Uuid>,
    children: BTreeSet<Uuid>,
}

/// The patch installed on the history while any instance is registered.
#[derive(Debug)]
struct Attachment {
    original: Option<Arc<MutationHook>>,
    shutdown: broadcast::Sender<()>,
    dispatcher: JoinHandle<()>,
}

#[derive(Debug)]
struct RegistryInner {
    history: Arc<dyn History>,
    instances: DashMap<Uuid, Entry>,
    processing: DashSet<Uuid>,
    pending: DashSet<Uuid>,
    attachment: Mutex<Option<Attachment>>,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let attachment = self
            .attachment
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(attachment) = attachment {
            self.history.set_mutation_hook(attachment.original);
            let _ = attachment.shutdown.send(());
        }
    }
}

/// Marks an instance as mid-transition for as long as it lives.
struct ProcessingGuard {
    inner: Arc<RegistryInner>,
    id: Uuid,
}

impl ProcessingGuard {
    fn acquire(inner: &Arc<RegistryInner>, id: Uuid) -> Option<Self> {
        inner.processing.insert(id).then(|| Self {
            inner: inner.clone(),
            id,
        })
    }
}

impl ProcessingGuard {
    /// Clear the flag, then claim a re-run queued while it was held.
    ///
    /// The flag is cleared before `pending` is read: a `schedule` racing
    /// with release either acquires the flag itself or leaves `pending`
    /// set for whoever holds it.
    fn release(self) -> Option<Self> {
        let inner = self.inner.clone();
        let id = self.id;
        drop(self);

        if !inner.pending.contains(&id) {
            return None;
        }
        let guard = Self::acquire(&inner, id)?;
        inner.pending.remove(&id);
        Some(guard)
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.inner.processing.remove(&self.id);
    }
}

/// Tracks live router instances and fans history events out to them.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

/// Non-owning handle held by registered instances.
#[derive(Debug, Clone)]
pub struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<Registry> {
        self.0.upgrade().map(|inner| Registry { inner })
    }
}

impl Registry {
    pub fn new(history: Arc<dyn History>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                history,
                instances: DashMap::new(),
                processing: DashSet::new(),
                pending: DashSet::new(),
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn history(&self) -> Arc<dyn History> {
        self.inner.history.clone()
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.inner))
    }

    pub fn len(&self) -> usize {
        self.inner.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.instances.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.instances.contains_key(&id)
    }

    pub fn instance(&self, id: Uuid) -> Option<Arc<RouterInstance>> {
        self.inner.instances.get(&id).map(|e| e.instance.clone())
    }

    pub fn instances(&self) -> Vec<Arc<RouterInstance>> {
        self.inner
            .instances
            .iter()
            .map(|e| e.instance.clone())
            .collect()
    }

    pub fn parent(&self, id: Uuid) -> Option<Uuid> {
        self.inner.instances.get(&id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: Uuid) -> Vec<Uuid> {
        self.inner
            .instances
            .get(&id)
            .map(|e| e.children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// True while the history mutation hook is wrapped.
    pub fn is_attached(&self) -> bool {
        self.lock_attachment().is_some()
    }

    pub fn is_processing(&self, id: Uuid) -> bool {
        self.inner.processing.contains(&id)
    }

    /// Register `instance`, attach to the history on first use, and
    /// schedule resolution of the current location for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&self, instance: Arc<RouterInstance>) -> Result<(), RegistryError> {
        let id = instance.id();
        if self.inner.instances.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }

        let base = instance.base_path().to_string();
        let others: Vec<(Uuid, String, Option<Uuid>)> = self
            .inner
            .instances
            .iter()
            .map(|e| (*e.key(), e.instance.base_path().to_string(), e.parent))
            .collect();
        let base_of = |id: Uuid| {
            others
                .iter()
                .find(|(other, _, _)| *other == id)
                .map(|(_, base, _)| base.len())
                .unwrap_or(0)
        };

        // Closest enclosing scope is the parent.
        let parent = others
            .iter()
            .filter(|(_, other, _)| *other != base && in_scope(&base, other))
            .max_by_key(|(_, other, _)| other.len())
            .map(|(other_id, _, _)| *other_id);

        // Enclosed instances whose current parent is further away move under us.
        let adopted: Vec<(Uuid, Option<Uuid>)> = others
            .iter()
            .filter(|(_, other, _)| *other != base && in_scope(other, &base))
            .filter(|(_, _, their_parent)| their_parent.map_or(true, |p| base_of(p) < base.len()))
            .map(|(child, _, their_parent)| (*child, *their_parent))
            .collect();

        for (child, old_parent) in &adopted {
            if let Some(old) = old_parent {
                if let Some(mut entry) = self.inner.instances.get_mut(old) {
                    entry.children.remove(child);
                }
            }
            if let Some(mut entry) = self.inner.instances.get_mut(child) {
                entry.parent = Some(id);
            }
        }
        if let Some(parent) = parent {
            if let Some(mut entry) = self.inner.instances.get_mut(&parent) {
                entry.children.insert(id);
            }
        }

        instance.set_registration(Some(self.downgrade()));
        self.inner.instances.insert(
            id,
            Entry {
                instance: instance.clone(),
                parent,
                children: adopted.into_iter().map(|(child, _)| child).collect(),
            },
        );
        metrics::record_instances(self.inner.instances.len());
        tracing::info!(instance = %id, base_path = %base, parent = ?parent, "Router instance registered");

        self.attach();
        self.schedule(instance);
        Ok(())
    }

    /// Unregister `id` and, recursively, its children. The last
    /// unregistration restores the original history hook.
    pub fn unregister(&self, id: Uuid) -> Result<(), RegistryError> {
        let (_, entry) = self
            .inner
            .instances
            .remove(&id)
            .ok_or(RegistryError::NotRegistered(id))?;

        for child in &entry.children {
            if let Err(e) = self.unregister(*child) {
                tracing::debug!(instance = %child, error = %e, "Child already unregistered");
            }
        }
        if let Some(parent) = entry.parent {
            if let Some(mut parent) = self.inner.instances.get_mut(&parent) {
                parent.children.remove(&id);
            }
        }

        entry.instance.set_registration(None);
        self.inner.pending.remove(&id);
        metrics::record_instances(self.inner.instances.len());
        tracing::info!(instance = %id, "Router instance unregistered");

        if self.inner.instances.is_empty() {
            self.detach();
        }
        Ok(())
    }

    /// Dispatch the current location to every instance in scope.
    pub fn notify(&self) {
        let location = self.inner.history.location();
        let parsed = match UrlParser::default().split(&location) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(location = %location, error = %e, "Ignoring unparsable location");
                return;
            }
        };

        for instance in self.instances() {
            if instance.accepts(&parsed) {
                self.schedule(instance);
            }
        }
    }

    /// Re-resolve the current location for one instance.
    pub fn notify_instance(&self, id: Uuid) {
        if let Some(instance) = self.instance(id) {
            self.schedule(instance);
        }
    }

    fn schedule(&self, instance: Arc<RouterInstance>) {
        let id = instance.id();
        let Some(guard) = ProcessingGuard::acquire(&self.inner, id) else {
            match instance.settings().overlap {
                OverlapPolicy::Drop => {
                    tracing::warn!(instance = %id, "Instance busy, notification dropped");
                    metrics::record_notification_dropped();
                }
                OverlapPolicy::Latest => {
                    tracing::debug!(instance = %id, "Instance busy, re-run queued");
                    self.inner.pending.insert(id);
                }
            }
            return;
        };

        tokio::spawn(async move {
            let mut guard = guard;
            loop {
                instance.process_current().await;
                match guard.release() {
                    Some(next) => guard = next,
                    None => break,
                }
            }
        });
    }

    fn lock_attachment(&self) -> std::sync::MutexGuard<'_, Option<Attachment>> {
        self.inner
            .attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wrap the history mutation hook once and start the dispatcher.
    fn attach(&self) {
        let mut attachment = self.lock_attachment();
        if attachment.is_some() {
            return;
        }

        let history = &self.inner.history;
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, _) = broadcast::channel(1);

        let original = history.mutation_hook();
        let wrapped = {
            let original = original.clone();
            MutationHook::new(move |mutation, url| {
                if let Some(original) = &original {
                    original.call(mutation, url);
                }
                let _ = tx.send(mutation);
            })
        };
        history.set_mutation_hook(Some(Arc::new(wrapped)));

        let dispatcher = tokio::spawn(dispatch_loop(
            Arc::downgrade(&self.inner),
            rx,
            history.subscribe_popstate(),
            shutdown.subscribe(),
        ));

        *attachment = Some(Attachment {
            original,
            shutdown,
            dispatcher,
        });
        tracing::debug!("Registry attached to history");
    }

    /// Put the original hook back and stop the dispatcher.
    fn detach(&self) {
        let Some(attachment) = self.lock_attachment().take() else {
            return;
        };
        self.inner.history.set_mutation_hook(attachment.original);
        let _ = attachment.shutdown.send(());
        drop(attachment.dispatcher);
        tracing::debug!("Registry detached from history");
    }
}

async fn dispatch_loop(
    registry: Weak<RegistryInner>,
    mut mutations: mpsc::UnboundedReceiver<Mutation>,
    mut popstate: broadcast::Receiver<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            mutation = mutations.recv() => match mutation {
                Some(mutation) => tracing::trace!(?mutation, "History mutation observed"),
                None => break,
            },
            event = popstate.recv() => match event {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    tracing::trace!("Popstate observed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }

        // A burst of events resolves once, against the latest location.
        while mutations.try_recv().is_ok() {}
        while popstate.try_recv().is_ok() {}

        let Some(inner) = registry.upgrade() else {
            break;
        };
        let handle = Registry { inner };
        if panic::catch_unwind(AssertUnwindSafe(|| handle.notify())).is_err() {
            tracing::error!("Dispatch panicked, waiting for the next history event");
        }
    }
    tracing::debug!("Registry dispatcher stopped");
}
