#![forbid(unsafe_code)]

//! Bound properties: settable fields that publish on assignment.
//!
//! [`Published<T>`] wraps a mutable field in a [`ReplayStream`]. The field is
//! only reachable through [`set`](Published::set), which pushes the new value
//! synchronously before returning; there is no way to mutate the field
//! without notifying.
//!
//! # Invariants
//!
//! 1. `set` with a value equal to the current one is a no-op: no slot write,
//!    no delivery. Besides matching what observers care about, this is the
//!    guard that terminates re-entrant assign cascades (a ↔ b bindings
//!    stabilize after one round trip instead of recursing forever).
//! 2. After `set(v)` returns, every subscriber has already observed `v`.
//! 3. `get` reads the field directly; no delivery happens.

use crate::stream::{ReplayStream, SinkFn, Source};
use crate::subscription::Subscription;

/// A settable field backed by a replay stream. Cloning shares the field.
pub struct Published<T> {
    stream: ReplayStream<T>,
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
        }
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Published<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Published")
            .field("stream", &self.stream)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Published<T> {
    /// Create a property holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            stream: ReplayStream::new(initial),
        }
    }

    /// Assign the field and deliver to all subscribers before returning.
    /// No-op when `value` equals the current field.
    pub fn set(&self, value: T) {
        if self.stream.with_value(|current| *current == value) {
            return;
        }
        self.stream.push(value);
    }

    /// Read the field directly, bypassing delivery.
    #[must_use]
    pub fn get(&self) -> T {
        self.stream.value()
    }

    /// Borrow-based read of the field.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.stream.with_value(f)
    }

    /// The backing replay stream, for operator attachment.
    #[must_use]
    pub fn stream(&self) -> &ReplayStream<T> {
        &self.stream
    }

    /// Register a sink; receives the current field value immediately, then
    /// every subsequent assignment.
    pub fn subscribe(&self, sink: impl Fn(&T) + 'static) -> Subscription {
        self.stream.subscribe(sink)
    }
}

impl<T: Clone + PartialEq + 'static> Source<T> for Published<T> {
    fn subscribe_sink(&self, sink: SinkFn<T>) -> Subscription {
        self.stream.subscribe_sink(sink)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
