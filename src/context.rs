//! The single piece of mutable execution state.
//!
//! Everything that changes while tests run (the active section, the active
//! test case and entry, the result counters, the output sink and the halt hook)
//! lives in one [`Context`]. With the `std` feature it is thread local so that
//! host test threads never observe each other; without it there is exactly one
//! instance, which is sound because the runtime is single threaded.
//!
//! Test cases, entries and sections are shared `static` data, so at most one
//! run may be in flight in the whole process. [`RunGuard`] enforces that.

use core::cell::Cell;

use crate::link::Epoch;
use crate::output::Output;
use crate::registry::{Entry, TestCase};
use crate::results::Results;
use crate::section::Section;

pub(crate) struct Context {
    active_section: Cell<Option<&'static Section>>,
    active_case: Cell<Option<&'static TestCase>>,
    active_entry: Cell<Option<&'static Entry>>,
    results: Cell<Results>,
    epoch: Cell<Epoch>,
    output: Cell<Option<&'static dyn Output>>,
    halt: Cell<fn() -> !>,
    #[cfg(not(feature = "std"))]
    running: Cell<bool>,
}

impl Context {
    const fn new() -> Self {
        Self {
            active_section: Cell::new(None),
            active_case: Cell::new(None),
            active_entry: Cell::new(None),
            results: Cell::new(Results::new()),
            epoch: Cell::new(0),
            output: Cell::new(None),
            halt: Cell::new(crate::assertion::default_halt),
            #[cfg(not(feature = "std"))]
            running: Cell::new(false),
        }
    }

    pub fn active_section(&self) -> Option<&'static Section> {
        self.active_section.get()
    }

    pub fn set_active_section(&self, section: Option<&'static Section>) {
        self.active_section.set(section);
    }

    pub fn active_case(&self) -> Option<&'static TestCase> {
        self.active_case.get()
    }

    pub fn active_entry(&self) -> Option<&'static Entry> {
        self.active_entry.get()
    }

    pub fn set_active(&self, case: Option<&'static TestCase>, entry: Option<&'static Entry>) {
        self.active_case.set(case);
        self.active_entry.set(entry);
    }

    pub fn results(&self) -> Results {
        self.results.get()
    }

    pub fn update_results(&self, update: impl FnOnce(&mut Results)) {
        let mut results = self.results.get();
        update(&mut results);
        self.results.set(results);
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch.get()
    }

    /// Starts a new epoch; sections seen under an older one re-arm themselves.
    pub fn advance_epoch(&self) -> Epoch {
        let epoch = self.epoch.get().wrapping_add(1);
        self.epoch.set(epoch);
        epoch
    }

    pub fn output(&self) -> Option<&'static dyn Output> {
        self.output.get()
    }

    pub fn set_output(&self, output: &'static dyn Output) {
        self.output.set(Some(output));
    }

    pub fn halt_handler(&self) -> fn() -> ! {
        self.halt.get()
    }

    pub fn set_halt_handler(&self, halt: fn() -> !) {
        self.halt.set(halt);
    }
}

#[cfg(feature = "std")]
std::thread_local! {
    static CONTEXT: Context = const { Context::new() };
}

/// Runs `f` against the current execution context.
#[cfg(feature = "std")]
pub(crate) fn with<R>(f: impl FnOnce(&Context) -> R) -> R {
    CONTEXT.with(f)
}

#[cfg(not(feature = "std"))]
struct SingleThreaded(Context);

// SAFETY: without `std` the runtime targets single-core devices and is only
// ever driven from the main thread of execution.
#[cfg(not(feature = "std"))]
unsafe impl Sync for SingleThreaded {}

#[cfg(not(feature = "std"))]
static CONTEXT: SingleThreaded = SingleThreaded(Context::new());

/// Runs `f` against the current execution context.
#[cfg(not(feature = "std"))]
pub(crate) fn with<R>(f: impl FnOnce(&Context) -> R) -> R {
    f(&CONTEXT.0)
}

/// Held for the whole of one run; the shared statics are only mutated under it.
#[cfg(feature = "std")]
static RUN_LOCK: spin::Mutex<()> = spin::Mutex::new(());

/// Exclusive claim on the shared test statics for the duration of one run.
///
/// Dropping it, also while unwinding out of a panicking body, clears the
/// active test case and entry and releases the claim.
pub(crate) struct RunGuard {
    #[cfg(feature = "std")]
    _lock: spin::MutexGuard<'static, ()>,
    #[cfg(not(feature = "std"))]
    _private: (),
}

impl RunGuard {
    /// `None` while another run, on any thread, is in flight.
    #[cfg(feature = "std")]
    pub fn try_acquire() -> Option<Self> {
        RUN_LOCK.try_lock().map(|lock| Self { _lock: lock })
    }

    /// `None` while a run is in flight.
    #[cfg(not(feature = "std"))]
    pub fn try_acquire() -> Option<Self> {
        with(|cx| !cx.running.replace(true)).then(|| Self { _private: () })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        with(|cx| cx.set_active(None, None));
        #[cfg(not(feature = "std"))]
        with(|cx| cx.running.set(false));
    }
}
