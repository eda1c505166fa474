#![forbid(unsafe_code)]

//! Rill public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use rill_core as core;

pub mod prelude {
    pub use rill_core::ops::{assign, compact_map, debounce, filter, map, throttle};
    pub use rill_core::{
        CancelToken, DisposeBag, Published, ReplayStream, Result, RillError, Scheduler, SinkFn,
        Source, Subscription, ValueStream,
    };
}
