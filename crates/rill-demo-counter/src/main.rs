#![forbid(unsafe_code)]

//! Scripted demo: drives the counter view-model the way a UI would, with a
//! virtual clock standing in for the host run loop so the timed pipelines
//! behave deterministically.
//!
//! Run with `RUST_LOG=debug` to watch individual deliveries.

mod view_model;

use tracing::info;
use tracing_subscriber::EnvFilter;
use view_model::CounterViewModel;
use web_time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let scheduler = rill_core::Scheduler::virtual_clock();
    let mut vm = match CounterViewModel::new(&scheduler) {
        Ok(vm) => vm,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };
    scheduler.advance(Duration::from_millis(500));

    info!(label = %vm.label(), "initial state");

    // A burst of "+" taps, 50ms apart.
    for _ in 0..6 {
        vm.increment();
        scheduler.advance(Duration::from_millis(50));
    }
    info!(label = %vm.label(), saves = vm.saves_triggered(), "after tap burst");

    // Let the throttle window elapse: one trailing save for the burst.
    scheduler.advance(Duration::from_millis(500));
    info!(saves = vm.saves_triggered(), "after settle");

    // Type a search query; nothing dispatches until the typing goes quiet.
    for text in ["c", "co", "cou", "count"] {
        vm.set_query(text);
        scheduler.advance(Duration::from_millis(120));
    }
    scheduler.advance(Duration::from_millis(300));
    info!(searches = ?vm.searches(), "after quiet period");

    vm.decrement();
    info!(label = %vm.label(), "after decrement");

    vm.shutdown();
    vm.increment();
    info!(
        count = vm.count(),
        label = %vm.label(),
        "after shutdown: field mutates, bindings are silent"
    );
}
