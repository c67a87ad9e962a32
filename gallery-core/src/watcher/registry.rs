//! Keyed listener subscriptions on a shared directory watcher

use dashmap::DashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, error};

/// Zero-argument change notification
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Set of listeners keyed by their owner
///
/// Safe to add, remove and notify from different threads at once; the OS
/// watcher thread may deliver an event while a controller registers or tears
/// down.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<String, Listener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `key` unless the key is already taken.
    ///
    /// Unlike an ordinary map insert this never replaces: the first
    /// registration for a key wins and later ones are dropped. Owners must use
    /// a key that is unique to them (controllers use a fresh UUID), otherwise a
    /// second owner silently receives no notifications.
    ///
    /// Returns `true` if the listener was inserted.
    pub fn add_listener(&self, key: impl Into<String>, listener: Listener) -> bool {
        let key = key.into();
        let mut inserted = false;
        self.listeners.entry(key.clone()).or_insert_with(|| {
            inserted = true;
            listener
        });

        if !inserted {
            debug!("Listener '{}' already registered, keeping the first one", key);
        }
        inserted
    }

    /// Remove the listener under `key`. Returns `true` if one was present.
    pub fn remove_listener(&self, key: &str) -> bool {
        self.listeners.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.listeners.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke every listener once and return how many ran to completion.
    ///
    /// Listeners are called on a snapshot taken up front, outside the map's
    /// locks, so a listener may add or remove registrations. A panicking
    /// listener is logged and does not keep the others from running.
    pub fn notify_all(&self) -> usize {
        let snapshot: Vec<(String, Listener)> = self
            .listeners
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (key, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener())) {
                Ok(()) => delivered += 1,
                Err(_) => error!("Listener '{}' panicked during notification", key),
            }
        }
        delivered
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.listeners.iter().map(|entry| entry.key().clone()).collect();
        f.debug_struct("ListenerRegistry").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        let listener: Listener = Arc::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    fn failing_listener() {
        panic!("listener failure");
    }

    #[test]
    fn test_first_registration_wins() {
        let registry = ListenerRegistry::new();
        let (first, first_listener) = counter();
        let (second, second_listener) = counter();

        assert!(registry.add_listener("gallery", first_listener));
        assert!(!registry.add_listener("gallery", second_listener));
        assert_eq!(registry.len(), 1);

        registry.notify_all();
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ListenerRegistry::new();
        let (_, listener) = counter();

        registry.add_listener("a", listener);
        assert!(registry.remove_listener("a"));
        assert!(!registry.remove_listener("a"));
        assert!(!registry.remove_listener("never-added"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let registry = ListenerRegistry::new();
        let (count, listener) = counter();

        registry.add_listener("bad", Arc::new(failing_listener));
        registry.add_listener("good", listener);

        assert_eq!(registry.notify_all(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_unregister_itself() {
        let registry = Arc::new(ListenerRegistry::new());
        let weak = Arc::downgrade(&registry);

        registry.add_listener(
            "once",
            Arc::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.remove_listener("once");
                }
            }),
        );

        assert_eq!(registry.notify_all(), 1);
        assert!(!registry.contains("once"));
        assert_eq!(registry.notify_all(), 0);
    }

    #[test]
    fn test_concurrent_add_remove_notify() {
        let registry = Arc::new(ListenerRegistry::new());
        let (count, listener) = counter();
        registry.add_listener("stable", listener);

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("worker-{worker}-{i}");
                        registry.add_listener(key.clone(), Arc::new(|| {}));
                        registry.notify_all();
                        registry.remove_listener(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 800);
    }
}
