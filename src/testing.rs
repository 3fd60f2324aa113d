//! Helpers for the unit tests.

use std::boxed::Box;
use std::string::String;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::output::Output;
use crate::registry::{Entry, TestCase};
use crate::text::TextRange;

fn noop() {}

static SERIAL: Mutex<()> = Mutex::new(());

/// Serializes tests that register or run: the run claim is process wide.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn leak_entries(entries: Vec<Entry>) -> &'static [Entry] {
    Box::leak(entries.into_boxed_slice())
}

/// A test case with `entries` empty bodies.
pub fn leak_case(name: &'static str, tags: &'static str, entries: usize) -> &'static TestCase {
    let entries = leak_entries((0..entries).map(|_| Entry::new(noop)).collect());
    Box::leak(Box::new(TestCase::new(
        TextRange::ram_str(name),
        TextRange::ram_str(tags),
        entries,
    )))
}

pub fn leak_case_with(name: &'static str, tags: &'static str, body: fn()) -> &'static TestCase {
    let entries = leak_entries(std::vec![Entry::new(body)]);
    Box::leak(Box::new(TestCase::new(
        TextRange::ram_str(name),
        TextRange::ram_str(tags),
        entries,
    )))
}

/// Output that keeps everything written to it.
#[derive(Default)]
pub struct Capture {
    text: Mutex<String>,
}

impl Capture {
    pub fn contents(&self) -> String {
        self.text.lock().map(|text| text.clone()).unwrap_or_default()
    }
}

impl Output for Capture {
    fn write_str(&self, text: &str) {
        if let Ok(mut captured) = self.text.lock() {
            captured.push_str(text);
        }
    }
}

pub fn capture() -> &'static Capture {
    Box::leak(Box::default())
}
