//! Unified error types for the sectest runtime.
//!
//! Recoverable conditions (bad filter, nothing to run, registration misuse) are
//! reported through [`MutError`]. Assertion failures are not errors: they are
//! recorded in the run [`Results`](crate::Results) and the run keeps going.
//!
//! ## Usage Examples
//!
//! ```ignore
//! let results = Runner::new(registry).with_filter(filter).run()?;
//! ```

use thiserror::Error;

/// Errors raised by the runtime before or around a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MutError {
    /// A tag in the filter expression is not wrapped in `[...]`, is empty, or
    /// a token has no tags at all. `position` is the byte offset of the
    /// offending token or tag.
    #[error("Malformed filter (at offset {position})")]
    MalformedFilter { position: usize },

    /// Filtering selected nothing. Treated as a failure to catch typos in the
    /// tag expression.
    #[error("No tests enabled (check your tag expression)")]
    NoTestsEnabled,

    /// The test case is already linked into a registry.
    #[error("Test case already registered")]
    AlreadyRegistered,

    /// Another run holds the shared test statics: from a body, or from a
    /// different thread. Registration and filtering are refused meanwhile too.
    #[error("A test run is already in progress")]
    RunInProgress,

    /// The `log` facade already has a logger installed.
    #[error("Logger initialization failed")]
    LoggerInit,
}

/// Result type alias used across the crate.
pub type MutResult<T> = Result<T, MutError>;
