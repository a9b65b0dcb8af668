//! Broadcast primitive for received-data notifications.
//!
//! A small subscriber-list event source: callbacks are registered under a
//! subscription id and invoked in subscription order on publish. The list is
//! snapshotted before invocation, so subscribing or unsubscribing from inside
//! a callback never deadlocks or skips delivery.

use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::error;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct Inner<T> {
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// A single-producer, multi-subscriber event source.
///
/// Subscribers only observe events published after they subscribed; there is
/// no replay. A panicking subscriber is logged and does not prevent delivery
/// to the remaining subscribers. After [`close`](Self::close), publishes are
/// dropped and existing subscriptions are permanently inactive.
pub struct EventSource<T> {
    inner: Arc<Inner<T>>,
}

// Callbacks and cancel handles are boxed as `'static` trait objects, so the
// event type must not borrow.
impl<T: 'static> EventSource<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a callback, returning a handle that can cancel it.
    ///
    /// Subscribing to a closed source returns an inert subscription.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        if !self.inner.closed.load(Ordering::Acquire) {
            self.inner.subscribers.lock().push((id, Arc::new(callback)));
        }

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.subscribers.lock().retain(|(sid, _)| *sid != id);
                }
            }),
        }
    }

    /// Deliver `value` to every current subscriber, in subscription order.
    pub fn publish(&self, value: &T) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }

        let snapshot: Vec<Callback<T>> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                error!("event subscriber panicked during publish");
            }
        }
    }

    /// Permanently shut the source down and drop all subscribers.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.subscribers.lock().clear();
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl<T: 'static> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Handle to an active subscription.
///
/// Dropping the handle leaves the subscription active; call
/// [`unsubscribe`](Self::unsubscribe) to cancel it. The handle stays valid
/// (and becomes a no-op) if the event source is dropped first.
pub struct Subscription {
    cancel: Box<dyn FnOnce() + Send>,
}

impl Subscription {
    /// Cancel the subscription; the callback will not be invoked again.
    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Subscription")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_into(sink: &Arc<Mutex<Vec<u32>>>) -> impl Fn(&u32) + Send + Sync + 'static {
        let sink = Arc::clone(sink);
        move |value| sink.lock().push(*value)
    }

    #[test]
    fn test_publish_reaches_all_subscribers_in_order() {
        let source = EventSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let order = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let order = Arc::clone(&order);
            source.subscribe(move |_: &u32| order.lock().push("first"))
        };
        let _second = {
            let order = Arc::clone(&order);
            source.subscribe(move |_: &u32| order.lock().push("second"))
        };
        let _sink = source.subscribe(collect_into(&seen));

        source.publish(&1);
        source.publish(&2);

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(*order.lock(), vec!["first", "second", "first", "second"]);
        first.unsubscribe();
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let source = EventSource::new();
        source.publish(&1);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = source.subscribe(collect_into(&seen));
        source.publish(&2);

        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let source = EventSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sub = source.subscribe(collect_into(&seen));
        source.publish(&1);
        sub.unsubscribe();
        source.publish(&2);

        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let source = EventSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _bad = source.subscribe(|_: &u32| panic!("subscriber failure"));
        let _good = source.subscribe(collect_into(&seen));

        source.publish(&7);
        source.publish(&8);

        assert_eq!(*seen.lock(), vec![7, 8]);
    }

    #[test]
    fn test_close_drops_publishes_and_subscribers() {
        let source = EventSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = source.subscribe(collect_into(&seen));

        source.close();
        source.publish(&1);

        assert!(seen.lock().is_empty());
        assert_eq!(source.subscriber_count(), 0);

        // Subscriptions taken after close are inert.
        let _late = source.subscribe(collect_into(&seen));
        source.publish(&2);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_subscription_handle_moves_across_threads() {
        let source = EventSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = source.subscribe(collect_into(&seen));

        std::thread::spawn(move || sub.unsubscribe())
            .join()
            .expect("unsubscribe on another thread");

        source.publish(&1);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_unsubscribe_after_source_dropped_is_noop() {
        let source = EventSource::<u32>::new();
        let sub = source.subscribe(|_| {});
        drop(source);
        sub.unsubscribe();
    }
}
