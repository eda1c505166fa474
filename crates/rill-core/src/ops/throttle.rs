#![forbid(unsafe_code)]

//! Throttle: rate-limit to one leading (and optionally one trailing)
//! emission per window.
//!
//! The first value outside any window emits immediately and opens a
//! `duration`-wide window. Values arriving inside the window are held
//! (`latest = true`) or discarded (`latest = false`). With `latest = true`
//! the most recent held value emits exactly once when the window elapses,
//! and that emission opens the next window.
//!
//! # Invariants
//!
//! 1. Leading values always emit immediately.
//! 2. `latest = true`: a burst of k > 1 values inside one window yields
//!    exactly two emissions — the first value at burst start, the last at
//!    window elapse.
//! 3. `latest = false`: in-window values are dropped; the next value after
//!    elapse opens a fresh window.
//! 4. Dropping the derived stream cancels a pending trailing timer with no
//!    emission.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{trace, warn};
use web_time::{Duration, Instant};

use crate::error::{Result, RillError};
use crate::scheduler::{CancelToken, Scheduler};
use crate::stream::{Source, ValueStream};

struct ThrottleState<T> {
    /// Opening instant of the current window (a leading or trailing emit).
    window_start: Option<Instant>,
    /// Most recent in-window value, held for the trailing emit.
    pending: Option<T>,
    /// Trailing-emit timer for the current window.
    trailing: Option<CancelToken>,
}

impl<T> ThrottleState<T> {
    fn trailing_armed(&self) -> bool {
        self.trailing.as_ref().is_some_and(CancelToken::is_live)
    }
}

/// Build a throttle stage over `source`.
///
/// Fails with [`RillError::SchedulerShutDown`] if the scheduler is already
/// unusable.
pub fn throttle<S, T>(
    source: &S,
    duration: Duration,
    scheduler: &Scheduler,
    latest: bool,
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
    let state = Rc::new(RefCell::new(ThrottleState::<T> {
        window_start: None,
        pending: None,
        trailing: None,
    }));

    let sub = source.subscribe_sink(Rc::new(move |value: &T| {
        let now = scheduler.now();

        // Decide under the state borrow; emit and schedule after releasing
        // it, since downstream sinks may push re-entrantly.
        let mut emit_now: Option<T> = None;
        let mut arm_deadline: Option<Instant> = None;
        {
            let mut st = state.borrow_mut();
            let in_window = match st.window_start {
                Some(start) => {
                    now.saturating_duration_since(start) < duration || st.trailing_armed()
                }
                None => false,
            };
            if !in_window {
                st.window_start = Some(now);
                st.pending = None;
                st.trailing = None;
                emit_now = Some(value.clone());
            } else if latest {
                st.pending = Some(value.clone());
                if !st.trailing_armed()
                    && let Some(start) = st.window_start
                {
                    arm_deadline = Some(start + duration);
                }
            } else {
                trace!("throttle: value discarded inside window");
            }
        }

        if let Some(v) = emit_now
            && let Some(out) = weak_out.upgrade()
        {
            out.push(v);
        }

        if let Some(deadline) = arm_deadline {
            let weak_state = Rc::downgrade(&state);
            let weak_out = weak_out.clone();
            let fire = move || {
                let Some(state) = weak_state.upgrade() else {
                    return;
                };
                let held = {
                    let mut st = state.borrow_mut();
                    st.trailing = None;
                    // The trailing emit opens the next window.
                    st.window_start = Some(deadline);
                    st.pending.take()
                };
                if let Some(v) = held
                    && let Some(out) = weak_out.upgrade()
                {
                    out.push(v);
                }
            };
            let delay = deadline.saturating_duration_since(now);
            match scheduler.schedule(delay, fire) {
                Ok(token) => state.borrow_mut().trailing = Some(token),
                Err(err) => {
                    state.borrow_mut().pending = None;
                    warn!(%err, "throttle: scheduler unavailable, dropping held value");
                }
            }
        }
    }));
    out.retain(sub);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        (seen, move |v: &T| seen_clone.borrow_mut().push(v.clone()))
    }

    #[test]
    fn leading_value_emits_immediately() {
        let scheduler = Scheduler::virtual_clock();
        let source: ValueStream<i32> = ValueStream::new();
        let throttled = throttle(&source, 10 * MS, &scheduler, true).unwrap();
        let (seen, sink) = recorder();
        let _sub = throttled.subscribe(sink);

        source.push(1);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn burst_with_latest_emits_first_and_last() {
        let scheduler = Scheduler::virtual_clock();
        let source: ValueStream<i32> = ValueStream::new();
        let throttled = throttle(&source, 10 * MS, &scheduler, true).unwrap();
        let (seen, sink) = recorder();
        let _sub = throttled.subscribe(sink);

        source.push(1);
        scheduler.advance(2 * MS);
        source.push(2);
        scheduler.advance(2 * MS);
        source.push(3);
        scheduler.advance(2 * MS);
        source.push(4);
        assert_eq!(*seen.borrow(), vec![1]);

        // Window elapses: exactly one trailing emission, with the last value.
        scheduler.advance(10 * MS);
        assert_eq!(*seen.borrow(), vec![1, 4]);

        scheduler.advance(100 * MS);
        assert_eq!(*seen.borrow(), vec![1, 4]);
    }

    #[test]
    fn trailing_emit_opens_next_window() {
        let scheduler = Scheduler::virtual_clock();
        let source: ValueStream<i32> = ValueStream::new();
        let throttled = throttle(&source, 10 * MS, &scheduler, true).unwrap();
        let (seen, sink) = recorder();
        let _sub = throttled.subscribe(sink);

        source.push(1);
        scheduler.advance(5 * MS);
        source.push(2);
        scheduler.advance(5 * MS); // trailing fires at t=10 with 2
        assert_eq!(*seen.borrow(), vec![1, 2]);

        // t=12: still inside the window opened by the trailing emit.
        scheduler.advance(2 * MS);
        source.push(3);
        assert_eq!(*seen.borrow(), vec![1, 2]);

        scheduler.advance(8 * MS); // t=20: that window's trailing fires
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn latest_false_discards_in_window_values() {
        let scheduler = Scheduler::virtual_clock();
        let source: ValueStream<i32> = ValueStream::new();
        let throttled = throttle(&source, 10 * MS, &scheduler, false).unwrap();
        let (seen, sink) = recorder();
        let _sub = throttled.subscribe(sink);

        source.push(1);
        scheduler.advance(3 * MS);
        source.push(2);
        scheduler.advance(3 * MS);
        source.push(3);
        scheduler.advance(20 * MS);
        // No trailing emission ever.
        assert_eq!(*seen.borrow(), vec![1]);

        // First value after elapse opens a fresh window and emits.
        source.push(4);
        assert_eq!(*seen.borrow(), vec![1, 4]);
    }

    #[test]
    fn spaced_values_all_emit() {
        let scheduler = Scheduler::virtual_clock();
        let source: ValueStream<i32> = ValueStream::new();
        let throttled = throttle(&source, 10 * MS, &scheduler, true).unwrap();
        let (seen, sink) = recorder();
        let _sub = throttled.subscribe(sink);

        source.push(1);
        scheduler.advance(15 * MS);
        source.push(2);
        scheduler.advance(15 * MS);
        source.push(3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn teardown_cancels_trailing_timer() {
        let scheduler = Scheduler::virtual_clock();
        let source: ValueStream<i32> = ValueStream::new();
        let (seen, sink) = recorder();
        {
            let throttled = throttle(&source, 10 * MS, &scheduler, true).unwrap();
            let _sub = throttled.subscribe(sink);
            source.push(1);
            source.push(2); // held, trailing armed
            assert_eq!(*seen.borrow(), vec![1]);
        }
        scheduler.advance(20 * MS);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn construction_fails_on_shut_down_scheduler() {
        let scheduler = Scheduler::virtual_clock();
        scheduler.shutdown();
        let source: ValueStream<i32> = ValueStream::new();
        assert!(matches!(
            throttle(&source, 10 * MS, &scheduler, true),
            Err(RillError::SchedulerShutDown)
        ));
    }
}
