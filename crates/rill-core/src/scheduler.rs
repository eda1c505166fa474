#![forbid(unsafe_code)]

//! Time source abstraction for the delay-based operators.
//!
//! Debounce and throttle never read the clock directly; they go through a
//! [`Scheduler`], which owns a one-shot timer queue and a clock. Two clocks
//! exist:
//!
//! - **wall**: `Instant::now()`, pumped by the host loop via
//!   [`run_due`](Scheduler::run_due).
//! - **virtual**: a manually-advanced clock for deterministic tests, in the
//!   style of a lab clock. [`advance`](Scheduler::advance) moves time forward
//!   and fires every timer whose deadline falls inside the advanced span, in
//!   deadline order (FIFO among equal deadlines).
//!
//! Everything runs on the single cooperative loop: a callback never fires
//! concurrently with other engine work, so firing and cancellation cannot
//! race.
//!
//! # Invariants
//!
//! 1. Timers fire in (deadline, schedule-order) order.
//! 2. A cancelled timer never fires; cancellation is idempotent.
//! 3. While firing within an `advance` span, `now()` equals the firing
//!    timer's deadline, so cascading timers scheduled by callbacks land at
//!    the right point in virtual time.
//! 4. After `shutdown()`, `schedule` fails and every pending token reads as
//!    spent.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace, warn};
use web_time::{Duration, Instant};

use crate::error::{Result, RillError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

enum ClockSource {
    /// Real wall-clock time.
    Wall,
    /// Deterministic virtual clock: `now() == epoch + offset`.
    Virtual { epoch: Instant, offset: Duration },
}

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    /// Shared with the entry's [`CancelToken`]; set when cancelled or fired.
    spent: Rc<Cell<bool>>,
    callback: Option<Box<dyn FnOnce()>>,
}

struct SchedulerInner {
    clock: ClockSource,
    timers: Vec<TimerEntry>,
    next_seq: u64,
    shut_down: bool,
}

impl SchedulerInner {
    fn now(&self) -> Instant {
        match &self.clock {
            ClockSource::Wall => Instant::now(),
            ClockSource::Virtual { epoch, offset } => *epoch + *offset,
        }
    }
}

/// Cloneable handle over a timer queue and its clock.
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Clone for Scheduler {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field(
                "clock",
                &match inner.clock {
                    ClockSource::Wall => "wall",
                    ClockSource::Virtual { .. } => "virtual",
                },
            )
            .field("pending", &inner.timers.len())
            .field("shut_down", &inner.shut_down)
            .finish()
    }
}

/// Handle for one scheduled timer. Cancels on drop.
#[must_use = "dropping a CancelToken cancels its timer; hold it until the timer may fire"]
pub struct CancelToken {
    spent: Rc<Cell<bool>>,
    armed: Cell<bool>,
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("live", &self.is_live())
            .finish()
    }
}

impl CancelToken {
    /// Prevent the timer from firing. Idempotent; a no-op after the timer
    /// has already fired.
    pub fn cancel(&self) {
        self.spent.set(true);
    }

    /// `true` until the timer fires or is cancelled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.spent.get()
    }

    /// Let the timer run to completion without holding the token.
    ///
    /// Consumes the handle; the timer can no longer be cancelled.
    pub fn detach(self) {
        self.armed.set(false);
    }
}

impl Drop for CancelToken {
    fn drop(&mut self) {
        if self.armed.get() {
            self.spent.set(true);
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

impl Scheduler {
    /// Scheduler on real time. The host loop must call
    /// [`run_due`](Scheduler::run_due) periodically to fire elapsed timers.
    #[must_use]
    pub fn wall_clock() -> Self {
        Self::with_clock(ClockSource::Wall)
    }

    /// Scheduler on a deterministic virtual clock, starting at construction
    /// time. Time only moves through [`advance`](Scheduler::advance).
    #[must_use]
    pub fn virtual_clock() -> Self {
        Self::with_clock(ClockSource::Virtual {
            epoch: Instant::now(),
            offset: Duration::ZERO,
        })
    }

    fn with_clock(clock: ClockSource) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                clock,
                timers: Vec::new(),
                next_seq: 0,
                shut_down: false,
            })),
        }
    }

    /// Current time per this scheduler's clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.inner.borrow().now()
    }

    /// Place a one-shot timer `delay` in the future.
    ///
    /// Fails with [`RillError::SchedulerShutDown`] after
    /// [`shutdown`](Scheduler::shutdown).
    pub fn schedule(
        &self,
        delay: Duration,
        callback: impl FnOnce() + 'static,
    ) -> Result<CancelToken> {
        let mut inner = self.inner.borrow_mut();
        if inner.shut_down {
            return Err(RillError::SchedulerShutDown);
        }
        // Cancelled entries are purged lazily here and in the fire loop.
        inner.timers.retain(|t| !t.spent.get());

        let deadline = inner.now() + delay;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let spent = Rc::new(Cell::new(false));
        inner.timers.push(TimerEntry {
            deadline,
            seq,
            spent: Rc::clone(&spent),
            callback: Some(Box::new(callback)),
        });
        trace!(seq, delay_us = delay.as_micros() as u64, "timer scheduled");
        Ok(CancelToken {
            spent,
            armed: Cell::new(true),
        })
    }

    /// Fire every timer whose deadline has passed per `now()`. The pump for
    /// wall-clock schedulers; harmless on virtual ones.
    pub fn run_due(&self) {
        let now = self.now();
        self.fire_due_until(now);
    }

    /// Move the clock forward by `delta`, firing every timer that falls due
    /// along the way.
    ///
    /// Only moves virtual clocks. On a wall-clock scheduler this degrades to
    /// [`run_due`](Scheduler::run_due) with a warning, since real time
    /// cannot be steered.
    pub fn advance(&self, delta: Duration) {
        let is_virtual = matches!(
            self.inner.borrow().clock,
            ClockSource::Virtual { .. }
        );
        if !is_virtual {
            warn!("advance() on a wall-clock scheduler; draining due timers only");
            self.run_due();
            return;
        }

        let target = self.now() + delta;
        self.fire_due_until(target);

        let mut inner = self.inner.borrow_mut();
        if let ClockSource::Virtual { epoch, offset } = &mut inner.clock {
            *offset = target.saturating_duration_since(*epoch);
        }
    }

    /// Fire timers with `deadline <= target` in (deadline, seq) order,
    /// stepping the virtual clock to each deadline before invoking so
    /// callbacks observe their own fire time. Callbacks run with no borrow
    /// held and may schedule further timers (cascading).
    fn fire_due_until(&self, target: Instant) {
        loop {
            let entry = {
                let mut inner = self.inner.borrow_mut();
                inner.timers.retain(|t| !t.spent.get());
                let idx = inner
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| (t.deadline, t.seq))
                    .map(|(i, _)| i);
                let Some(idx) = idx else { break };
                let entry = inner.timers.remove(idx);
                if let ClockSource::Virtual { epoch, offset } = &mut inner.clock {
                    let fire_offset = entry.deadline.saturating_duration_since(*epoch);
                    if fire_offset > *offset {
                        *offset = fire_offset;
                    }
                }
                entry
            };

            entry.spent.set(true);
            if let Some(callback) = entry.callback {
                trace!(seq = entry.seq, "timer fired");
                callback();
            }
        }
    }

    /// Cancel all pending timers and reject any further scheduling.
    /// Idempotent.
    pub fn shutdown(&self) {
        let timers = {
            let mut inner = self.inner.borrow_mut();
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            std::mem::take(&mut inner.timers)
        };
        debug!(cancelled = timers.len(), "scheduler shut down");
        for timer in &timers {
            timer.spent.set(true);
        }
    }

    /// Whether `shutdown()` has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.borrow().shut_down
    }

    /// Number of scheduled, not-yet-fired, not-cancelled timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner
            .borrow()
            .timers
            .iter()
            .filter(|t| !t.spent.get())
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
