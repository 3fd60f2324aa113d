//! `check!` and `require!` backends, and the halt hook.

use core::fmt::{self, Display};

use crate::context;
use crate::output;
use crate::registry::Label;
use crate::section::Section;
use crate::text::TextRange;

/// Source position of an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: TextRange<'static>,
    pub line: u32,
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.file_name(), self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Check,
    Require,
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Check => "CHECK",
            Kind::Require => "REQUIRE",
        })
    }
}

/// Records a recoverable assertion; returns `passed`.
pub fn check(passed: bool, location: Location, expr: TextRange<'static>) -> bool {
    record(passed, location, Kind::Check, expr);
    passed
}

/// Records a fatal assertion. On failure prints the summary so far, flushes
/// the output and halts.
pub fn require(passed: bool, location: Location, expr: TextRange<'static>) {
    if !record(passed, location, Kind::Require, expr) {
        let results = context::with(|cx| cx.results());
        crate::report!("{results}");
        output::flush();
        halt();
    }
}

fn record(passed: bool, location: Location, kind: Kind, expr: TextRange<'static>) -> bool {
    let first_failure = context::with(|cx| {
        let first_failure = !passed && cx.active_case().is_some_and(|case| case.mark_failed());
        cx.update_results(|results| {
            results.record_assertion(passed);
            if first_failure {
                results.tests_failed += 1;
            }
        });
        first_failure
    });
    if passed {
        return true;
    }

    if first_failure {
        debug!("first failure in [{}]", Label::active());
    }
    let section = Section::active().map(Section::name);
    crate::report!(
        "FAILED: Test [{}]. Section [{}]. Location [{}]:\n    {}: {}\n",
        Label::active(),
        section.unwrap_or(TextRange::ram_str("?")),
        location,
        kind,
        expr,
    );
    false
}

/// Reports a broken runtime invariant and halts.
pub fn fault(location: Location, what: &str) -> ! {
    crate::report!("Internal fault: {what}. Location [{location}]\n");
    output::flush();
    halt()
}

/// Installs the function called when a `require!` fails. It must not return.
pub fn set_halt_handler(halt: fn() -> !) {
    context::with(|cx| cx.set_halt_handler(halt));
}

/// Stops the program through the installed halt handler.
pub fn halt() -> ! {
    let handler = context::with(|cx| cx.halt_handler());
    handler()
}

#[cfg(feature = "std")]
pub(crate) fn default_halt() -> ! {
    std::process::abort()
}

#[cfg(not(feature = "std"))]
pub(crate) fn default_halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::runner::Runner;
    use crate::testing::{capture, leak_case_with, serial};
    use core::sync::atomic::{AtomicBool, Ordering};

    fn panic_halt() -> ! {
        panic!("halted")
    }

    #[test]
    fn test_location_strips_directories() {
        let location = Location {
            file: TextRange::ram_str("tests/unit/vector.rs"),
            line: 17,
        };
        assert_eq!(std::format!("{location}"), "vector.rs:17");
    }

    #[test]
    fn test_check_outside_a_run_only_counts() {
        let sink = capture();
        output::set(sink);
        let here = crate::location!();
        let before = context::with(|cx| cx.results());

        assert!(check(true, here, TextRange::ram_str("ok")));
        assert!(!check(false, here, TextRange::ram_str("1 == 2")));

        let after = context::with(|cx| cx.results());
        assert_eq!(after.assertions - before.assertions, 2);
        assert_eq!(after.assertions_failed - before.assertions_failed, 1);
        assert_eq!(after.tests_failed, before.tests_failed);
        assert!(sink.contents().contains("FAILED: Test [?]. Section [?]. Location [assertion.rs:"));
        assert!(sink.contents().ends_with("]:\n    CHECK: 1 == 2\n"));
    }

    #[test]
    fn test_require_halts_before_the_next_statement() {
        let _serial = serial();
        static AFTER: AtomicBool = AtomicBool::new(false);
        fn body() {
            crate::section!("fatal", {
                crate::require!(1 + 1 == 3);
                AFTER.store(true, Ordering::Relaxed);
            });
        }

        let sink = capture();
        let halted = std::thread::spawn(move || {
            set_halt_handler(panic_halt);
            let registry = Registry::new();
            registry.register(leak_case_with("fatal", "", body)).unwrap();
            let _ = Runner::new(&registry).with_output(sink).run();
        })
        .join();

        assert!(halted.is_err());
        assert!(!AFTER.load(Ordering::Relaxed));
        let text = sink.contents();
        assert!(text.contains("FAILED: Test [fatal]. Section [fatal]. Location [assertion.rs:"));
        assert!(text.contains("    REQUIRE: 1 + 1 == 3\n"));
        assert!(text.contains("1 total assertions. 1 assertions failed.\n"));
        assert!(text.ends_with("**** FAILED ****\n"));
    }
}
