//! A small unit-test runtime for hosts and 8-bit microcontrollers.
//!
//! A test body is one flat function containing nested [`section!`] blocks. The
//! runner calls the body repeatedly; each call explores exactly one new leaf
//! block, and code outside the blocks is shared setup that runs every time.
//! Nothing is allocated: test cases, entries and sections are `static` data
//! and all strings are [`TextRange`]s, which may live in program memory on
//! Harvard targets.
//!
//! ```ignore
//! #[sectest::test_case("vector", "[vector][fast]")]
//! fn vector() {
//!     let mut v = Vec::new();
//!     v.push(1);
//!     sectest::section!("push more", {
//!         v.push(2);
//!         sectest::check!(v.len() == 2);
//!     });
//!     sectest::section!("clear", {
//!         v.clear();
//!         sectest::require!(v.is_empty());
//!     });
//! }
//!
//! fn main() {
//!     std::process::exit(if sectest::run_from_env() { 0 } else { 1 });
//! }
//! ```

#![no_std]
#![cfg_attr(target_arch = "avr", feature(asm_experimental_arch))]

#[cfg(any(feature = "std", test))]
extern crate std;

#[macro_use]
extern crate log;

#[macro_use]
mod macros;

pub mod assertion;
pub mod config;
mod context;
pub mod error;
pub mod filter;
mod link;
pub mod logger;
pub mod output;
pub mod registry;
pub mod results;
pub mod runner;
pub mod section;
pub mod text;

#[cfg(test)]
mod testing;

pub use assertion::{Location, set_halt_handler};
pub use error::{MutError, MutResult};
pub use output::Output;
pub use registry::{Entry, Fixture, Registry, TestCase, active_type};
pub use results::Results;
pub use runner::Runner;
pub use section::{Section, SectionGuard, SectionState};
pub use text::{MemoryKind, TextRange};

pub use sectest_macros::test_case;

#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "linkme")]
    pub use linkme;
}

/// Runs every test of the global registry that matches `filter`.
///
/// Tests declared with `#[test_case]` are collected first. Returns `true` only
/// if the run happened and no assertion failed.
pub fn run(filter: Option<TextRange<'_>>) -> bool {
    let registry = registry::global();
    #[cfg(feature = "linkme")]
    registry.collect_distributed();

    let mut runner = Runner::new(registry);
    if let Some(filter) = filter {
        runner = runner.with_filter(filter);
    }
    runner.run().is_ok_and(|results| results.passed())
}

/// [`run`] with the filter baked in through `SECTEST_FILTER`.
pub fn run_from_env() -> bool {
    run(config::FILTER_ENV.map(TextRange::ram_str))
}
