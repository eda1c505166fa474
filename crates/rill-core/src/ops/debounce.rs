#![forbid(unsafe_code)]

//! Debounce: emit the last value of a quiet window.
//!
//! Every upstream push cancels the in-flight timer and arms a fresh one for
//! `duration` in the future, so only a value followed by `duration` of
//! silence ever reaches downstream — at or after push-time + duration.
//!
//! # Invariants
//!
//! 1. At most one timer is pending per stage at any moment.
//! 2. For pushes at t1 < t2 < ... < tn with every gap < duration, exactly
//!    one emission occurs, carrying the value pushed at tn, no earlier than
//!    tn + duration.
//! 3. Dropping the derived stream cancels the pending timer; nothing is
//!    emitted on teardown.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;
use web_time::Duration;

use crate::error::{Result, RillError};
use crate::scheduler::{CancelToken, Scheduler};
use crate::stream::{Source, ValueStream};

/// Build a debounce stage over `source`.
///
/// Fails with [`RillError::SchedulerShutDown`] if the scheduler is already
/// unusable; a shutdown later in the stage's life drops values with a
/// warning instead of emitting them late.
pub fn debounce<S, T>(
    source: &S,
    duration: Duration,
    scheduler: &Scheduler,
) -> Result<ValueStream<T>>
where
    S: Source<T>,
    T: Clone + 'static,
{
    if scheduler.is_shut_down() {
        return Err(RillError::SchedulerShutDown);
    }

    let out = ValueStream::new();
    let weak_out = out.downgrade();
    let scheduler = scheduler.clone();
    let pending: Rc<RefCell<Option<CancelToken>>> = Rc::new(RefCell::new(None));

    let sub = source.subscribe_sink(Rc::new(move |value: &T| {
        // Supersede any in-flight timer before arming the next one.
        drop(pending.borrow_mut().take());

        let value = value.clone();
        let weak_out = weak_out.clone();
        let pending_slot = Rc::downgrade(&pending);
        let fire = move || {
            if let Some(slot) = pending_slot.upgrade() {
                drop(slot.borrow_mut().take());
            }
            if let Some(out) = weak_out.upgrade() {
                out.push(value);
            }
        };
        match scheduler.schedule(duration, fire) {
            Ok(token) => *pending.borrow_mut() = Some(token),
            Err(err) => warn!(%err, "debounce: scheduler unavailable, dropping value"),
        }
    }));
    out.retain(sub);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
