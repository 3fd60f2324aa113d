//! Runtime configuration constants.

/// Bytes buffered by [`LogOutput`](crate::output::LogOutput) before a line is
/// forced out.
pub const LINE_BUFFER_SIZE: usize = 128;

/// Bytes copied out of a [`TextRange`](crate::TextRange) per formatting chunk.
pub const TEXT_CHUNK: usize = 32;

/// Name given to the implicit section wrapping each entry body.
pub const ROOT_SECTION_NAME: &str = "ROOT";

/// Filter expression baked in at build time (`SECTEST_FILTER=[fast] cargo build`).
pub const FILTER_ENV: Option<&str> = option_env!("SECTEST_FILTER");

/// Log level baked in at build time, read by [`logger::init`](crate::logger::init).
pub const LOG_ENV: Option<&str> = option_env!("LOG");
