//! Synchronous fan-out of mode changes
//!
//! [`SubscriptionBus`] calls every registered listener in registration
//! order. A panicking listener is logged and skipped; the remaining
//! listeners are still notified. Registering the same closure twice yields
//! two independent registrations.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::mode::ModeChangeEvent;

/// Listener invoked for every mode change
pub type Listener = Arc<dyn Fn(&ModeChangeEvent) + Send + Sync>;

/// Identifier of one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

/// Registry of mode-change listeners
#[derive(Clone, Default)]
pub struct SubscriptionBus {
    inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for SubscriptionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionBus")
            .field("listeners", &self.len())
            .finish()
    }
}

impl SubscriptionBus {
    /// Create bus without listeners
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register listener; the returned handle removes it
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ModeChangeEvent) + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.listeners.push((id, Arc::new(callback)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove registration; unknown ids are a no-op
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.inner.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(existing, _)| *existing != id);
        registry.listeners.len() != before
    }

    /// Notify every listener; returns how many completed without panicking
    ///
    /// Listeners run after the registry lock is released, so they may
    /// subscribe, unsubscribe or drive the controller re-entrantly.
    pub fn notify(&self, event: &ModeChangeEvent) -> usize {
        let listeners: Vec<(SubscriptionId, Listener)> = self.inner.lock().listeners.clone();
        let mut delivered = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    tracing::warn!(
                        subscription = id.0,
                        panic = panic_message(panic.as_ref()),
                        "mode change listener panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Number of registrations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Check if no listener is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle for one registration
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    bus: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Registration identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the listener; repeated calls are a no-op
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => SubscriptionBus { inner }.unsubscribe(self.id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event() -> ModeChangeEvent {
        ModeChangeEvent::new(Mode::Real, Mode::Demo, "test")
    }

    #[test]
    fn notifies_all_listeners() {
        let bus = SubscriptionBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            let _ = bus.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(bus.notify(&event()), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let bus = SubscriptionBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        bus.notify(&event());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn same_callback_twice_is_called_twice() {
        let bus = SubscriptionBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let callback = move |_: &ModeChangeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        };
        let _first = bus.subscribe(callback.clone());
        let _second = bus.subscribe(callback);
        bus.notify(&event());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let bus = SubscriptionBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _bad = bus.subscribe(|_| panic!("listener exploded"));
        let c = count.clone();
        let _good = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.notify(&event()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let bus = SubscriptionBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_in = slot.clone();
        let sub = bus.subscribe(move |_| {
            if let Some(sub) = slot_in.lock().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);
        bus.notify(&event());
        assert!(bus.is_empty());
    }
}
