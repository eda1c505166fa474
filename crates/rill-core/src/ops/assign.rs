#![forbid(unsafe_code)]

//! Assign: terminal stage writing emissions into a [`Published`] property.
//!
//! Each upstream value lands through [`Published::set`], so it propagates to
//! the target's own subscribers synchronously. The no-change rule on `set`
//! keeps a property that is both read and written in one pipeline from
//! cascading forever.

use std::rc::Rc;

use crate::property::Published;
use crate::stream::Source;
use crate::subscription::Subscription;

/// Subscribe `target` to `source`; every emission is assigned to the
/// property. Store the returned subscription to keep the binding alive.
pub fn assign<S, T>(source: &S, target: &Published<T>) -> Subscription
where
    S: Source<T>,
    T: Clone + PartialEq + 'static,
{
    let target = target.clone();
    source.subscribe_sink(Rc::new(move |value: &T| target.set(value.clone())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
