//! Typed observer lists.
//!
//! Components announce state changes (children added, listeners
//! registered, ...) through an [`Observers`] list. Subscribing returns a
//! [`SubscriptionId`] used to unsubscribe.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use super::listeners::{KeyListener, MouseListener};
use super::types::ObjectRef;

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A cloneable list of callbacks. Clones share the same list.
pub struct Observers<T> {
    next_id: Arc<AtomicU64>,
    callbacks: Arc<Mutex<Vec<(SubscriptionId, Callback<T>)>>>,
}

impl<T> Observers<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where F: Fn(&T) + Send + Sync + 'static {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Calls every subscriber. Callbacks run outside the lock, so they may
    /// subscribe or unsubscribe.
    pub fn emit(&self, value: &T) {
        let callbacks: Vec<Callback<T>> =
            self.callbacks.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            callback(value);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.callbacks.lock().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.callbacks.lock().is_empty() }
}

impl<T> Default for Observers<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Clone for Observers<T> {
    fn clone(&self) -> Self {
        Self {
            next_id: Arc::clone(&self.next_id),
            callbacks: Arc::clone(&self.callbacks),
        }
    }
}

impl<T> std::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers").field("subscribers", &self.len()).finish()
    }
}

/// State changes announced by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistryNotification {
    /// An application was appended at `index`.
    ChildAdded { index: usize, child: ObjectRef },

    /// The application at `index` was removed.
    ChildRemoved { index: usize, child: ObjectRef },

    EventListenerRegistered {
        subscriber: String,
        event: String,
        properties: Vec<String>,
    },

    EventListenerDeregistered { subscriber: String, event: String },

    KeystrokeListenerRegistered(KeyListener),
    KeystrokeListenerDeregistered(KeyListener),
    DeviceListenerRegistered(MouseListener),
    DeviceListenerDeregistered(MouseListener),
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_emit_reaches_every_subscriber() {
        let observers = Observers::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let total = Arc::clone(&total);
            observers.subscribe(move |v| {
                total.fetch_add(*v as usize, Ordering::SeqCst);
            });
        }
        observers.emit(&2);

        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let observers = Observers::<u32>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let id = observers.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(&1);

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_clones_share_subscribers() {
        let observers = Observers::<u32>::new();
        let clone = observers.clone();
        clone.subscribe(|_| {});
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let observers = Observers::<u32>::new();
        let inner = observers.clone();
        let slot = Arc::new(Mutex::new(None));
        let slot_in_cb = Arc::clone(&slot);
        let id = observers.subscribe(move |_| {
            if let Some(id) = *slot_in_cb.lock() {
                inner.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        observers.emit(&0);
        assert!(observers.is_empty());
    }
}
