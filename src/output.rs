//! Where reports go.
//!
//! Everything the runtime prints goes through the [`Output`] stored in the
//! execution context. Nothing is formatted into an intermediate string: the
//! `report!` macro streams `format_args!` pieces straight into the sink.

use core::fmt::{self, Write};

use spin::Mutex;

use crate::config::LINE_BUFFER_SIZE;
use crate::context;

/// A text sink.
pub trait Output: Sync {
    fn write_str(&self, text: &str);

    fn flush(&self) {}
}

struct Emitter<'a>(&'a dyn Output);

impl Write for Emitter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// Writes formatted text to the current output.
pub fn emit(args: fmt::Arguments<'_>) {
    // Sinks are infallible; `fmt` errors only come from broken `Display` impls.
    let _ = Emitter(current()).write_fmt(args);
}

/// The output reports currently go to.
pub fn current() -> &'static dyn Output {
    context::with(|cx| cx.output()).unwrap_or_else(fallback)
}

/// Routes reports of the current execution context to `output`.
pub fn set(output: &'static dyn Output) {
    context::with(|cx| cx.set_output(output));
}

pub fn flush() {
    current().flush();
}

#[cfg(feature = "std")]
fn fallback() -> &'static dyn Output {
    &StdoutOutput
}

#[cfg(not(feature = "std"))]
fn fallback() -> &'static dyn Output {
    static LOG_OUTPUT: LogOutput = LogOutput::new();
    &LOG_OUTPUT
}

/// Process standard output.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutOutput;

#[cfg(feature = "std")]
impl Output for StdoutOutput {
    fn write_str(&self, text: &str) {
        use std::io::Write as _;
        let _ = std::io::stdout().lock().write_all(text.as_bytes());
    }

    fn flush(&self) {
        use std::io::Write as _;
        let _ = std::io::stdout().lock().flush();
    }
}

/// Forwards complete lines to the `log` facade.
///
/// Failure lines go out at `error` level, everything else at `info`. Lines
/// longer than [`LINE_BUFFER_SIZE`] are split.
pub struct LogOutput {
    line: Mutex<LineBuffer>,
}

impl LogOutput {
    pub const fn new() -> Self {
        Self {
            line: Mutex::new(LineBuffer::new()),
        }
    }
}

impl Default for LogOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for LogOutput {
    fn write_str(&self, text: &str) {
        self.line.lock().push(text, forward);
    }

    fn flush(&self) {
        self.line.lock().flush(forward);
    }
}

fn forward(line: &str) {
    if line.starts_with("FAILED") || line.starts_with("**** FAILED") {
        error!("{line}");
    } else {
        info!("{line}");
    }
}

/// Fixed buffer that assembles text into lines.
pub(crate) struct LineBuffer {
    buffer: [u8; LINE_BUFFER_SIZE],
    pos: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buffer: [0; LINE_BUFFER_SIZE],
            pos: 0,
        }
    }

    pub fn push(&mut self, text: &str, mut sink: impl FnMut(&str)) {
        for &byte in text.as_bytes() {
            if byte == b'\n' {
                self.emit(&mut sink);
                continue;
            }
            if self.pos == LINE_BUFFER_SIZE {
                self.emit(&mut sink);
            }
            self.buffer[self.pos] = byte;
            self.pos += 1;
        }
    }

    /// Sends whatever is pending, even without a trailing newline.
    pub fn flush(&mut self, mut sink: impl FnMut(&str)) {
        if self.pos > 0 {
            self.emit(&mut sink);
        }
    }

    /// Sends the longest valid UTF-8 prefix and keeps the incomplete tail of a
    /// split character for the next line.
    fn emit(&mut self, sink: &mut impl FnMut(&str)) {
        let pending = &self.buffer[..self.pos];
        let valid = match core::str::from_utf8(pending) {
            Ok(line) => line.len(),
            Err(err) => err.valid_up_to(),
        };
        if let Ok(line) = core::str::from_utf8(&pending[..valid]) {
            sink(line);
        }
        self.buffer.copy_within(valid..self.pos, 0);
        self.pos -= valid;
    }
}
