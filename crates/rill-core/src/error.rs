#![forbid(unsafe_code)]

//! Error taxonomy for the engine.
//!
//! There are only two failure surfaces: programmer errors on handles
//! (operating on something already torn down) and scheduler availability.
//! Transform closures inside operators are not represented here — a panic in
//! a transform propagates synchronously to whoever called `push`, with no
//! recovery attempted by the engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RillError>;

#[derive(Debug, Error)]
pub enum RillError {
    /// The scheduler was shut down; no further timers can be placed.
    /// Reported to operator constructors at build time, not deferred to the
    /// first push.
    #[error("scheduler has been shut down")]
    SchedulerShutDown,

    /// An operation was attempted on a subscription that is no longer live.
    #[error("invalid subscription operation: {reason}")]
    SubscriptionInvalid { reason: String },
}

impl RillError {
    #[must_use]
    pub fn invalid_subscription(reason: impl Into<String>) -> Self {
        Self::SubscriptionInvalid {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            RillError::SchedulerShutDown.to_string(),
            "scheduler has been shut down"
        );
        let err = RillError::invalid_subscription("already cancelled");
        assert_eq!(
            err.to_string(),
            "invalid subscription operation: already cancelled"
        );
    }
}
