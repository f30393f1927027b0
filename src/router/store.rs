//! Observable state cells.

use tokio::sync::watch;

/// A value readers can poll or subscribe to.
///
/// Every `set` notifies subscribers, even when the value is unchanged;
/// use [`set_if_changed`](Self::set_if_changed) to suppress no-op updates.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + PartialEq> Observable<T> {
    /// Store `value` only if it differs. Returns whether it was stored.
    pub fn set_if_changed(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_notifies_subscribers() {
        let cell = Observable::new(false);
        let mut rx = cell.subscribe();
        cell.set(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(cell.get());
    }

    #[test]
    fn test_set_if_changed() {
        let cell = Observable::new(1);
        let mut rx = cell.subscribe();
        assert!(!cell.set_if_changed(1));
        assert!(!rx.has_changed().unwrap());
        assert!(cell.set_if_changed(2));
        assert!(rx.has_changed().unwrap());
        assert_eq!(cell.with(|v| *v), 2);
    }
}
