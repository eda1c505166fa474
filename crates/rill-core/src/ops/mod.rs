#![forbid(unsafe_code)]

//! Operator pipeline stages.
//!
//! Each operator is a free function taking a [`Source`](crate::stream::Source)
//! upstream and returning a derived [`ValueStream`](crate::stream::ValueStream)
//! (or, for [`assign`], a terminal [`Subscription`](crate::subscription::Subscription)).
//! A stage is an explicit object: the derived stream holds the subscription
//! to its upstream, so dropping the derived stream detaches the stage and —
//! for the timed operators — cancels any pending timer without emitting.
//!
//! Values flow synchronously through stage chains on the pushing thread.
//! `debounce` and `throttle` are the only operators that defer delivery, via
//! their injected [`Scheduler`](crate::scheduler::Scheduler).

mod assign;
mod debounce;
mod throttle;
mod transform;

pub use assign::assign;
pub use debounce::debounce;
pub use throttle::throttle;
pub use transform::{compact_map, filter, map};
