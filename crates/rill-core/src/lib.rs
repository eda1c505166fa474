#![forbid(unsafe_code)]

//! Rill core: single-threaded reactive value streams.
//!
//! The engine is built from a handful of pieces:
//!
//! - [`ValueStream`] / [`ReplayStream`]: broadcast conduits; replay streams
//!   retain and replay their most recent value to new subscribers.
//! - [`Subscription`] / [`DisposeBag`]: sink lifetime management.
//! - [`Published`]: a settable field that pushes on assignment.
//! - [`ops`]: `map`, `filter`, `compact_map`, `debounce`, `throttle`,
//!   `assign` pipeline stages.
//! - [`Scheduler`]: the injected time source the delay-based operators run
//!   against; comes in wall-clock and virtual-clock flavors.
//!
//! Everything uses `Rc`/`RefCell` shared ownership on one cooperative loop.
//! A `push` is delivered synchronously, in registration order, before the
//! call returns; the only deferred work in the engine is timer callbacks,
//! which the host loop fires via [`Scheduler::run_due`] (or tests via
//! [`Scheduler::advance`]).

pub mod error;
pub mod ops;
pub mod property;
pub mod scheduler;
pub mod stream;
pub mod subscription;

pub use error::{Result, RillError};
pub use property::Published;
pub use scheduler::{CancelToken, Scheduler};
pub use stream::{ReplayStream, SinkFn, Source, ValueStream};
pub use subscription::{DisposeBag, Subscription};
