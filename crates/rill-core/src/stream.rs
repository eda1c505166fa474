#![forbid(unsafe_code)]

//! Value streams: the broadcast conduits everything else is built on.
//!
//! Two flavors exist:
//!
//! - [`ValueStream<T>`]: emit-only. A push is delivered synchronously to the
//!   subscribers registered at that moment and retains nothing.
//! - [`ReplayStream<T>`]: a `ValueStream` plus a last-value slot. New
//!   subscribers receive the stored value immediately; the slot updates on
//!   every push even with zero subscribers.
//!
//! Both are cheap `Rc` handles — cloning a stream clones the handle, not the
//! subscriber list. All delivery is single-threaded and synchronous on the
//! calling thread; there is no internal locking.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. A push is delivered to exactly the subscribers registered at push
//!    entry; sinks registered during delivery do not see that push.
//! 3. `push` never blocks and never fails.
//! 4. A `ReplayStream`'s slot always holds the most recent pushed value
//!    (or the construction-time initial value).
//!
//! # Failure Modes
//!
//! - A sink that panics unwinds through `push` to the pusher; remaining
//!   sinks for that push are not invoked (fail-fast, no swallowing).
//! - Cancelling a subscription whose stream is already gone is inert.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::subscription::Subscription;

/// Reference-counted sink callback, the form subscribers are stored in.
pub type SinkFn<T> = Rc<dyn Fn(&T)>;

// ---------------------------------------------------------------------------
// Source seam
// ---------------------------------------------------------------------------

/// Anything a sink can be attached to. This is the seam every operator is
/// written against, so pipelines compose over plain streams, replay streams,
/// and published properties alike.
pub trait Source<T> {
    /// Register `sink` and return its cancellation handle.
    ///
    /// Replaying sources invoke `sink` with their current value before
    /// registration completes.
    fn subscribe_sink(&self, sink: SinkFn<T>) -> Subscription;
}

// ---------------------------------------------------------------------------
// ValueStream
// ---------------------------------------------------------------------------

struct StreamInner<T> {
    /// (id, sink) pairs in registration order.
    subscribers: Vec<(u64, SinkFn<T>)>,
    next_id: u64,
    /// Upstream stage subscriptions kept alive for derived streams. When the
    /// last handle to this stream drops, these drop too, detaching the stage
    /// from its upstream.
    retained: Vec<Subscription>,
}

/// Emit-only broadcast stream.
pub struct ValueStream<T> {
    inner: Rc<RefCell<StreamInner<T>>>,
}

impl<T> Clone for ValueStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for ValueStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> std::fmt::Debug for ValueStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStream")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T: 'static> ValueStream<T> {
    /// Create a stream with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(StreamInner {
                subscribers: Vec::new(),
                next_id: 0,
                retained: Vec::new(),
            })),
        }
    }

    /// Deliver `value` synchronously to every currently-registered sink, in
    /// registration order. A push with zero subscribers is a no-op.
    pub fn push(&self, value: T) {
        // Snapshot first so sinks registered during delivery miss this push
        // and delivery itself runs without holding the subscriber borrow
        // (sinks may subscribe, cancel, or push re-entrantly).
        let snapshot: Vec<SinkFn<T>> = self
            .inner
            .borrow()
            .subscribers
            .iter()
            .map(|(_, sink)| Rc::clone(sink))
            .collect();
        trace!(subscribers = snapshot.len(), "push");
        for sink in snapshot {
            sink(&value);
        }
    }

    /// Register a sink. The returned [`Subscription`] removes it on cancel
    /// or drop.
    pub fn subscribe(&self, sink: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe_sink(Rc::new(sink))
    }

    /// Number of currently-registered sinks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Keep an upstream subscription alive for as long as this stream lives.
    /// Used by operator stages to tie their upstream registration to the
    /// derived stream's lifetime.
    pub(crate) fn retain(&self, subscription: Subscription) {
        self.inner.borrow_mut().retained.push(subscription);
    }

    pub(crate) fn downgrade(&self) -> WeakValueStream<T> {
        WeakValueStream {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<T: 'static> Source<T> for ValueStream<T> {
    fn subscribe_sink(&self, sink: SinkFn<T>) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, sink));
            id
        };
        trace!(id, "subscribe");
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().subscribers.retain(|(sid, _)| *sid != id);
            }
        })
    }
}

/// Weak handle used by operator stages so an upstream's sink closure does not
/// keep its downstream alive (that would make derived streams immortal).
pub(crate) struct WeakValueStream<T> {
    inner: Weak<RefCell<StreamInner<T>>>,
}

impl<T> Clone for WeakValueStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: 'static> WeakValueStream<T> {
    pub(crate) fn upgrade(&self) -> Option<ValueStream<T>> {
        self.inner.upgrade().map(|inner| ValueStream { inner })
    }
}

// ---------------------------------------------------------------------------
// ReplayStream
// ---------------------------------------------------------------------------

/// Broadcast stream that retains and replays its most recent value.
pub struct ReplayStream<T> {
    stream: ValueStream<T>,
    last: Rc<RefCell<T>>,
}

impl<T> Clone for ReplayStream<T> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            last: Rc::clone(&self.last),
        }
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for ReplayStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayStream")
            .field("last", &*self.last.borrow())
            .field("subscribers", &self.stream.subscriber_count())
            .finish()
    }
}

impl<T: Clone + 'static> ReplayStream<T> {
    /// Create a stream whose slot starts at `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            stream: ValueStream::new(),
            last: Rc::new(RefCell::new(initial)),
        }
    }

    /// Update the slot, then deliver to current subscribers. The slot is
    /// updated even when nobody is listening.
    pub fn push(&self, value: T) {
        *self.last.borrow_mut() = value.clone();
        self.stream.push(value);
    }

    /// Register a sink; it is invoked with the current slot value before
    /// this call returns, then receives every subsequent push.
    pub fn subscribe(&self, sink: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe_sink(Rc::new(sink))
    }

    /// Current slot value. Pure read — no delivery happens.
    #[must_use]
    pub fn value(&self) -> T {
        self.last.borrow().clone()
    }

    /// Borrow-based access to the slot, avoiding a clone.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.last.borrow())
    }

    /// Number of currently-registered sinks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.stream.subscriber_count()
    }
}

impl<T: Clone + 'static> Source<T> for ReplayStream<T> {
    fn subscribe_sink(&self, sink: SinkFn<T>) -> Subscription {
        // Clone out of the slot before invoking so a re-entrant push inside
        // the sink cannot hit a held borrow.
        let current = self.last.borrow().clone();
        sink(&current);
        self.stream.subscribe_sink(sink)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        (seen, move |v: &T| seen_clone.borrow_mut().push(v.clone()))
    }

    #[test]
    fn push_with_no_subscribers_is_noop() {
        let stream: ValueStream<i32> = ValueStream::new();
        stream.push(1);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn delivery_in_registration_order() {
        let stream: ValueStream<i32> = ValueStream::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = Rc::clone(&order);
        let _a = stream.subscribe(move |_| o1.borrow_mut().push("a"));
        let o2 = Rc::clone(&order);
        let _b = stream.subscribe(move |_| o2.borrow_mut().push("b"));
        let o3 = Rc::clone(&order);
        let _c = stream.subscribe(move |_| o3.borrow_mut().push("c"));

        stream.push(0);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn exactly_one_notification_per_push() {
        let stream: ValueStream<i32> = ValueStream::new();
        let (seen, sink) = recorder();
        let _sub = stream.subscribe(sink);

        stream.push(1);
        stream.push(2);
        stream.push(3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn subscriber_added_during_delivery_misses_that_push() {
        let stream: ValueStream<i32> = ValueStream::new();
        let late_seen = Rc::new(RefCell::new(Vec::new()));

        let stream_clone = stream.clone();
        let late_for_sink = Rc::clone(&late_seen);
        let added = Rc::new(Cell::new(false));
        let added_clone = Rc::clone(&added);
        let _outer = stream.subscribe(move |_| {
            if !added_clone.get() {
                added_clone.set(true);
                let seen = Rc::clone(&late_for_sink);
                stream_clone
                    .subscribe(move |v: &i32| seen.borrow_mut().push(*v))
                    .detach();
            }
        });

        stream.push(1);
        assert!(late_seen.borrow().is_empty());

        stream.push(2);
        assert_eq!(*late_seen.borrow(), vec![2]);
    }

    #[test]
    fn cancelled_sink_receives_nothing() {
        let stream: ValueStream<i32> = ValueStream::new();
        let (seen, sink) = recorder();
        let sub = stream.subscribe(sink);

        stream.push(1);
        sub.cancel();
        stream.push(2);
        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let stream: ValueStream<i32> = ValueStream::new();
        let (seen, sink) = recorder();
        {
            let _sub = stream.subscribe(sink);
            stream.push(1);
        }
        stream.push(2);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn cancel_after_stream_dropped_is_inert() {
        let sub;
        {
            let stream: ValueStream<i32> = ValueStream::new();
            sub = stream.subscribe(|_| {});
        }
        sub.cancel();
        sub.cancel();
    }

    #[test]
    fn replay_slot_tracks_last_push() {
        let stream = ReplayStream::new(0);
        assert_eq!(stream.value(), 0);

        stream.push(1);
        stream.push(2);
        stream.push(3);
        assert_eq!(stream.value(), 3);
    }

    #[test]
    fn replay_updates_slot_with_no_subscribers() {
        let stream = ReplayStream::new(String::from("initial"));
        stream.push(String::from("updated"));
        assert_eq!(stream.value(), "updated");
    }

    #[test]
    fn replay_delivers_current_value_on_subscribe() {
        let stream = ReplayStream::new(0);
        for v in 1..=5 {
            stream.push(v);
        }

        let (seen, sink) = recorder();
        let _sub = stream.subscribe(sink);
        // Exactly the latest value, exactly once — no history replay.
        assert_eq!(*seen.borrow(), vec![5]);

        stream.push(6);
        assert_eq!(*seen.borrow(), vec![5, 6]);
    }

    #[test]
    fn replay_initial_value_before_any_push() {
        let stream = ReplayStream::new(42);
        let (seen, sink) = recorder();
        let _sub = stream.subscribe(sink);
        assert_eq!(*seen.borrow(), vec![42]);
    }

    #[test]
    fn value_read_has_no_side_effects() {
        let stream = ReplayStream::new(7);
        let (seen, sink) = recorder();
        let _sub = stream.subscribe(sink);
        let _ = stream.value();
        let _ = stream.value();
        assert_eq!(*seen.borrow(), vec![7]);
    }

    #[test]
    fn debug_format() {
        let stream: ValueStream<i32> = ValueStream::default();
        let _sub = stream.subscribe(|_| {});
        let dbg = format!("{stream:?}");
        assert!(dbg.contains("ValueStream"));
        assert!(dbg.contains("1"));

        let replay = ReplayStream::new(42);
        let dbg = format!("{replay:?}");
        assert!(dbg.contains("ReplayStream"));
        assert!(dbg.contains("42"));
    }

    #[test]
    fn clone_shares_subscribers() {
        let stream: ValueStream<i32> = ValueStream::new();
        let clone = stream.clone();
        let (seen, sink) = recorder();
        let _sub = clone.subscribe(sink);

        stream.push(9);
        assert_eq!(*seen.borrow(), vec![9]);
    }
}
