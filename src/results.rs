use core::fmt::{self, Display};

/// Counters aggregated over one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Results {
    pub tests_ran: usize,
    pub tests_skipped: usize,
    pub tests_failed: usize,
    pub assertions: usize,
    pub assertions_failed: usize,
    /// Total number of body invocations.
    pub passes: usize,
}

impl Results {
    pub const fn new() -> Self {
        Self {
            tests_ran: 0,
            tests_skipped: 0,
            tests_failed: 0,
            assertions: 0,
            assertions_failed: 0,
            passes: 0,
        }
    }

    pub fn record_assertion(&mut self, passed: bool) {
        self.assertions += 1;
        if !passed {
            self.assertions_failed += 1;
        }
    }

    pub fn passed(&self) -> bool {
        self.assertions_failed == 0
    }
}

impl Default for Results {
    fn default() -> Self {
        Self::new()
    }
}

/// The final summary, banner included.
impl Display for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} tests ran. {} test skipped. {} tests failed.",
            self.tests_ran, self.tests_skipped, self.tests_failed
        )?;
        writeln!(
            f,
            "{} total assertions. {} assertions failed.",
            self.assertions, self.assertions_failed
        )?;
        f.write_str(banner(self.passed()))
    }
}

pub(crate) fn banner(passed: bool) -> &'static str {
    if passed {
        "**** SUCCESS ****\n"
    } else {
        "**** FAILED ****\n"
    }
}
