//! Test runner
//!
//! Applies the filter once, then walks the registry in registration order and
//! invokes every entry of every enabled test case until its root section is
//! exhausted.

use crate::context::{self, RunGuard};
use crate::error::{MutError, MutResult};
use crate::filter::Filter;
use crate::output::{self, Output};
use crate::registry::{Entry, Fixture, Label, Registry, TestCase};
use crate::results::{Results, banner};
use crate::section::SectionGuard;
use crate::text::TextRange;

/// Configures and starts one run over a [`Registry`].
///
/// ```ignore
/// let results = Runner::new(sectest::registry::global())
///     .with_filter(sectest::text!("[fast]"))
///     .run()?;
/// ```
pub struct Runner<'r> {
    registry: &'r Registry,
    filter: Option<TextRange<'r>>,
    output: Option<&'static dyn Output>,
}

impl<'r> Runner<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            filter: None,
            output: None,
        }
    }

    /// Tag expression selecting the tests to run; empty selects everything.
    pub fn with_filter(mut self, filter: TextRange<'r>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sends every report of this execution context to `output`.
    pub fn with_output(mut self, output: &'static dyn Output) -> Self {
        self.output = Some(output);
        self
    }

    /// Fails with [`MutError::RunInProgress`] while another run is in flight
    /// anywhere in the process, including from inside a test body.
    pub fn run(self) -> MutResult<Results> {
        let Some(_run) = RunGuard::try_acquire() else {
            return Err(MutError::RunInProgress);
        };
        if let Some(output) = self.output {
            output::set(output);
        }

        let expr = self.filter.unwrap_or(TextRange::ram(&[]));
        let enabled = match Filter::parse(expr).map(|filter| filter.apply_held(self.registry)) {
            Ok(enabled) => enabled,
            Err(err) => {
                debug!("{err}");
                crate::report!("Malformed filter\n");
                output::flush();
                return Err(err);
            }
        };
        if enabled == 0 {
            crate::report!("{}\n{}", MutError::NoTestsEnabled, banner(false));
            output::flush();
            return Err(MutError::NoTestsEnabled);
        }
        debug!(
            "{enabled} of {} tests enabled, {} entries",
            self.registry.len(),
            self.registry.enabled_entry_count()
        );

        context::with(|cx| cx.update_results(|results| *results = Results::new()));
        for case in self.registry {
            case.clear_failed();
            if case.is_enabled() {
                for entry in case.entries() {
                    run_case_entry(case, entry);
                }
            } else {
                let skipped = case.entries().len();
                context::with(|cx| cx.update_results(|results| results.tests_skipped += skipped));
            }
        }

        let results = context::with(|cx| cx.results());
        crate::report!("{results}");
        output::flush();
        Ok(results)
    }
}

fn run_case_entry(case: &'static TestCase, entry: &'static Entry) {
    let label = Label {
        case: Some(case),
        entry: Some(entry),
    };
    context::with(|cx| {
        cx.set_active(Some(case), Some(entry));
        cx.update_results(|results| results.tests_ran += 1);
    });
    crate::report!("RUNNING: Test [{label}], tags={}\n", case.tags());

    let passes = drive(entry, case.fixture());
    debug!("test [{label}] done after {passes} passes");
}

/// Invokes `entry` until its root section is exhausted; returns the number of
/// passes.
fn drive(entry: &'static Entry, fixture: Option<&'static dyn Fixture>) -> u32 {
    context::with(|cx| cx.advance_epoch());
    let root = entry.root();
    root.rearm();

    let mut passes = 0;
    while root.try_execute() {
        let _root = SectionGuard::enter(root);
        if let Some(fixture) = fixture {
            fixture.on_enter();
        }
        entry.invoke();
        if let Some(fixture) = fixture {
            fixture.on_exit();
        }
        passes += 1;
    }

    context::with(|cx| cx.update_results(|results| results.passes += passes as usize));
    passes
}

/// Runs a single entry outside of any registry.
#[cfg(test)]
pub(crate) fn run_entry(entry: &'static Entry) -> u32 {
    drive(entry, None)
}
