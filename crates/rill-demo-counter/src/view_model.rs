#![forbid(unsafe_code)]

//! Counter view-model: the engine's host-side integration point.
//!
//! Wires three pipelines over two bound properties:
//!
//! - `count` → `map` → `assign` into `label` (synchronous UI text).
//! - `count` → `throttle(latest)` → save trigger (rate-limited persistence
//!   stand-in).
//! - `query` → `compact_map` → `debounce` → search dispatch.
//!
//! All subscriptions live in a [`DisposeBag`]; [`shutdown`] releases them
//! explicitly, after which taps still mutate `count` but nothing downstream
//! hears about it.
//!
//! [`shutdown`]: CounterViewModel::shutdown

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rill_core::ops::{assign, compact_map, debounce, map, throttle};
use rill_core::{DisposeBag, Published, Result, Scheduler, ValueStream};
use tracing::{debug, info};
use web_time::Duration;

/// Rate limit for save triggers.
const SAVE_WINDOW: Duration = Duration::from_millis(500);
/// Quiet period a query must hold before a search dispatches.
const QUERY_QUIET: Duration = Duration::from_millis(300);

/// Derived pipeline stages, kept alive for the view-model's lifetime.
/// Dropping them (in `shutdown`) detaches every stage from its upstream.
struct Stages {
    _labels: ValueStream<String>,
    _saves: ValueStream<i64>,
    // Both halves of the query chain: a derived stream holds its upstream
    // only weakly, so the compact_map intermediate must stay alive too or
    // the whole chain detaches.
    _typed: ValueStream<String>,
    _lookups: ValueStream<String>,
}

pub struct CounterViewModel {
    count: Published<i64>,
    label: Published<String>,
    query: Published<String>,
    searches: Rc<RefCell<Vec<String>>>,
    save_count: Rc<Cell<u32>>,
    stages: Option<Stages>,
    bag: DisposeBag,
}

impl CounterViewModel {
    /// Build the view-model and its pipelines against `scheduler`.
    ///
    /// Fails if the scheduler is already shut down (the timed stages cannot
    /// be constructed without one).
    pub fn new(scheduler: &Scheduler) -> Result<Self> {
        let count = Published::new(0i64);
        let label = Published::new(String::from("Count: 0"));
        let query = Published::new(String::new());
        let searches = Rc::new(RefCell::new(Vec::new()));
        let save_count = Rc::new(Cell::new(0u32));
        let mut bag = DisposeBag::new();

        let labels = map(&count, |c: &i64| format!("Count: {c}"));
        bag.store(assign(&labels, &label));

        let saves = throttle(&count, SAVE_WINDOW, scheduler, true)?;
        let saves_counter = Rc::clone(&save_count);
        bag.store(saves.subscribe(move |count: &i64| {
            info!(count, "save triggered");
            saves_counter.set(saves_counter.get() + 1);
        }));

        // Drop the replayed empty query so only real keystrokes arm the
        // debounce.
        let typed = compact_map(&query, |q: &String| {
            if q.is_empty() { None } else { Some(q.clone()) }
        });
        let lookups = debounce(&typed, QUERY_QUIET, scheduler)?;
        let search_log = Rc::clone(&searches);
        bag.store(lookups.subscribe(move |q: &String| {
            debug!(query = %q, "search dispatched");
            search_log.borrow_mut().push(q.clone());
        }));

        Ok(Self {
            count,
            label,
            query,
            searches,
            save_count,
            stages: Some(Stages {
                _labels: labels,
                _saves: saves,
                _typed: typed,
                _lookups: lookups,
            }),
            bag,
        })
    }

    /// "+" button tap.
    pub fn increment(&self) {
        self.count.set(self.count.get() + 1);
    }

    /// "-" button tap.
    pub fn decrement(&self) {
        self.count.set(self.count.get() - 1);
    }

    /// Search-field edit.
    pub fn set_query(&self, text: impl Into<String>) {
        self.query.set(text.into());
    }

    /// Current counter value (direct field read).
    #[must_use]
    pub fn count(&self) -> i64 {
        self.count.get()
    }

    /// Current rendered label.
    #[must_use]
    pub fn label(&self) -> String {
        self.label.get()
    }

    /// How many throttled save triggers have fired.
    #[must_use]
    pub fn saves_triggered(&self) -> u32 {
        self.save_count.get()
    }

    /// Search queries dispatched so far, in dispatch order.
    #[must_use]
    pub fn searches(&self) -> Vec<String> {
        self.searches.borrow().clone()
    }

    /// Explicit teardown: release every subscription and detach the
    /// pipeline stages. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.bag.release_all();
        self.stages = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
