#![forbid(unsafe_code)]

//! Subscription handles and the [`DisposeBag`] registry.
//!
//! A [`Subscription`] ties a sink callback to the stream it was registered
//! on. Its only operation is cancellation, which removes the sink from the
//! stream's subscriber list. A [`DisposeBag`] collects subscriptions so an
//! owning object can release them all in one explicit teardown call.
//!
//! # Invariants
//!
//! 1. `cancel()` is idempotent — the second and later calls are no-ops.
//! 2. Dropping a `Subscription` cancels it (deterministic, not finalizer
//!    based — `Drop` runs at a known point).
//! 3. Cancelling after the source stream has been dropped is inert.
//! 4. `DisposeBag::release_all()` cancels each stored subscription exactly
//!    once and is safe to call repeatedly.
//!
//! # Failure Modes
//!
//! - `ensure_active()` on a cancelled handle returns
//!   [`RillError::SubscriptionInvalid`] — loud, not a silent no-op.
//! - Storing an already-cancelled subscription in a bag is harmless but
//!   logged at `debug` level since it usually indicates a wiring mistake.

use std::cell::RefCell;

use tracing::debug;

use crate::error::{Result, RillError};

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle for one registered sink. Cancels on drop.
///
/// The handle owns no data beyond the cancellation closure; the sink itself
/// lives in the stream's subscriber list until cancellation removes it.
#[must_use = "dropping a Subscription immediately unregisters its sink; store it or call detach()"]
pub struct Subscription {
    canceller: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            canceller: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// Remove the sink from its stream. Idempotent.
    pub fn cancel(&self) {
        let canceller = self.canceller.borrow_mut().take();
        if let Some(cancel) = canceller {
            cancel();
        }
    }

    /// Whether this subscription has already been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.canceller.borrow().is_none()
    }

    /// Fail loudly if the handle is no longer live.
    ///
    /// Use this before handing a stored subscription to code that assumes an
    /// active registration.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RillError::invalid_subscription(
                "subscription already cancelled",
            ))
        } else {
            Ok(())
        }
    }

    /// Keep the sink registered for the stream's remaining lifetime.
    ///
    /// Consumes the handle without cancelling; the sink can no longer be
    /// removed individually afterwards.
    pub fn detach(self) {
        let _ = self.canceller.borrow_mut().take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// DisposeBag
// ---------------------------------------------------------------------------

/// Owned set of subscriptions released together.
///
/// The owning object (typically a view-model) stores every subscription it
/// creates and calls [`release_all`](DisposeBag::release_all) from its own
/// explicit shutdown path. Dropping the bag releases everything as well.
#[derive(Default)]
pub struct DisposeBag {
    subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for DisposeBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposeBag")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}

impl DisposeBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a subscription until release.
    pub fn store(&mut self, subscription: Subscription) {
        if subscription.is_cancelled() {
            debug!("storing an already-cancelled subscription");
        }
        self.subscriptions.push(subscription);
    }

    /// Cancel every stored subscription exactly once and empty the bag.
    ///
    /// Idempotent: a second call finds the bag empty and does nothing.
    pub fn release_all(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        debug!(count = self.subscriptions.len(), "releasing subscriptions");
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }

    /// Number of stored (not yet released) subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the bag holds no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.release_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
