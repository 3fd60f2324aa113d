//! `log` backend that prints into an [`Output`].

use core::fmt::{self, Display};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

use crate::config::LOG_ENV;
use crate::error::{MutError, MutResult};
use crate::output::Output;

pub struct OutputLogger {
    output: &'static dyn Output,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorCode {
    Red = 31,
    Green = 32,
    Yellow = 33,
    Cyan = 36,
    BrightBlack = 90,
}

impl Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{1B}[{}m", *self as u8)
    }
}

impl OutputLogger {
    pub const fn new(output: &'static dyn Output) -> Self {
        Self { output }
    }
}

impl Log for OutputLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let color = match record.level() {
            Level::Error => ColorCode::Red,
            Level::Warn => ColorCode::Yellow,
            Level::Info => ColorCode::Green,
            Level::Debug => ColorCode::Cyan,
            Level::Trace => ColorCode::BrightBlack,
        };
        let file = record.file().unwrap_or("none");
        let line = record.line().unwrap_or(0);
        let color_reset = "\u{1B}[0m";

        let mut writer = Writer(self.output);
        let _ = fmt::Write::write_fmt(
            &mut writer,
            format_args!("[{file}:{line}] {color}{}{color_reset}\n", record.args()),
        );
    }

    fn flush(&self) {
        self.output.flush();
    }
}

struct Writer(&'static dyn Output);

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// Maps a `LOG` value to a level filter; anything unknown turns logging off.
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Installs a logger writing into `output`, at the level baked in through
/// `LOG`.
///
/// Do not combine with [`LogOutput`](crate::output::LogOutput) as `output`:
/// that sink logs every line it receives.
pub fn init(output: &'static dyn Output) -> MutResult<()> {
    static LOGGER: Once<OutputLogger> = Once::new();

    if LOGGER.is_completed() {
        return Err(MutError::LoggerInit);
    }
    let logger = LOGGER.call_once(|| OutputLogger::new(output));
    log::set_logger(logger).map_err(|_| MutError::LoggerInit)?;
    log::set_max_level(parse_level(LOG_ENV));
    Ok(())
}
