#![forbid(unsafe_code)]

//! Stateless stages: `map`, `filter`, `compact_map`.
//!
//! Transforms and predicates must be pure functions of their input; the
//! engine assumes no cross-call state. A panicking transform unwinds
//! through the upstream `push` to the pusher — nothing is caught here.

use std::rc::Rc;

use crate::stream::{Source, ValueStream};

/// Derived stream carrying `transform(v)` for each upstream `v`.
pub fn map<S, T, U>(source: &S, transform: impl Fn(&T) -> U + 'static) -> ValueStream<U>
where
    S: Source<T>,
    T: 'static,
    U: 'static,
{
    let out = ValueStream::new();
    let weak = out.downgrade();
    let sub = source.subscribe_sink(Rc::new(move |value: &T| {
        if let Some(out) = weak.upgrade() {
            out.push(transform(value));
        }
    }));
    out.retain(sub);
    out
}

/// Derived stream forwarding only values for which `predicate` holds.
pub fn filter<S, T>(source: &S, predicate: impl Fn(&T) -> bool + 'static) -> ValueStream<T>
where
    S: Source<T>,
    T: Clone + 'static,
{
    let out = ValueStream::new();
    let weak = out.downgrade();
    let sub = source.subscribe_sink(Rc::new(move |value: &T| {
        if predicate(value)
            && let Some(out) = weak.upgrade()
        {
            out.push(value.clone());
        }
    }));
    out.retain(sub);
    out
}

/// Derived stream of the `Some` results of `transform`; `None` is dropped.
pub fn compact_map<S, T, U>(
    source: &S,
    transform: impl Fn(&T) -> Option<U> + 'static,
) -> ValueStream<U>
where
    S: Source<T>,
    T: 'static,
    U: 'static,
{
    let out = ValueStream::new();
    let weak = out.downgrade();
    let sub = source.subscribe_sink(Rc::new(move |value: &T| {
        if let Some(mapped) = transform(value)
            && let Some(out) = weak.upgrade()
        {
            out.push(mapped);
        }
    }));
    out.retain(sub);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
