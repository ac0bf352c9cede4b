use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Handle returned by [`Store::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct StoreInner<T> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_id: AtomicU64,
}

/// Observable value. Every committed change is pushed to the subscribers
/// synchronously, after the internal locks are released, so subscribers
/// may read or write any store.
pub struct Store<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                value: Mutex::new(value),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Reads without cloning.
    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.inner.value.lock())
    }

    pub fn set(&self, value: T) {
        let snapshot = {
            let mut guard = self.inner.value.lock();
            *guard = value;
            guard.clone()
        };
        self.notify(&snapshot);
    }

    /// Mutates in place and notifies.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut T) -> R) -> R {
        let (out, snapshot) = {
            let mut guard = self.inner.value.lock();
            let out = mutate(&mut guard);
            (out, guard.clone())
        };
        self.notify(&snapshot);
        out
    }

    /// Registers `subscriber`; it is not called for the current value.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.lock().push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn notify(&self, value: &T) {
        let subscribers: Vec<Subscriber<T>> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();
        for subscriber in subscribers {
            subscriber(value);
        }
    }
}

impl<T: Clone + PartialEq> Store<T> {
    /// Sets and notifies only when the value actually changes.
    pub fn set_if_changed(&self, value: T) -> bool {
        let snapshot = {
            let mut guard = self.inner.value.lock();
            if *guard == value {
                return false;
            }
            *guard = value;
            guard.clone()
        };
        self.notify(&snapshot);
        true
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("value", &*self.inner.value.lock())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
