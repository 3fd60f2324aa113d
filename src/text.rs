//! Text that may live in RAM or in a separate program-memory bank.
//!
//! Harvard targets such as 8-bit AVR keep string literals in flash, which is not
//! reachable through ordinary loads: every byte has to be fetched with `lpm`.
//! [`TextRange`] hides that split behind one type so that searching and
//! comparison are written once. On targets with a unified address space the
//! [`TextRange::Program`] variant degenerates to a plain byte read.

use core::fmt::{self, Write};
use core::iter::FusedIterator;
use core::marker::PhantomData;

use crate::config::TEXT_CHUNK;

/// Which memory bank backs a [`TextRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Ram,
    Program,
}

/// A run of bytes in program memory.
///
/// Only ever dereferenced through [`read_program_byte`].
#[derive(Clone, Copy)]
pub struct ProgramBytes<'a> {
    ptr: *const u8,
    len: usize,
    _marker: PhantomData<&'a [u8]>,
}

// SAFETY: program memory is never written while tests run.
unsafe impl Send for ProgramBytes<'_> {}
unsafe impl Sync for ProgramBytes<'_> {}

impl<'a> ProgramBytes<'a> {
    /// # Safety
    ///
    /// On split address space targets `bytes` must be placed in program memory
    /// (see [`text!`](crate::text!)); its address is a flash address there.
    pub const unsafe fn new(bytes: &'a [u8]) -> Self {
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
            _marker: PhantomData,
        }
    }

    fn read(&self, index: usize) -> u8 {
        assert!(index < self.len, "program memory read out of range");
        // SAFETY: `index` is in bounds and the bytes outlive `'a`.
        unsafe { read_program_byte(self.ptr.add(index)) }
    }
}

#[cfg(target_arch = "avr")]
unsafe fn read_program_byte(addr: *const u8) -> u8 {
    let byte: u8;
    // SAFETY: the caller guarantees `addr` is a valid flash address.
    unsafe {
        core::arch::asm!(
            "lpm {0}, Z",
            out(reg) byte,
            in("Z") addr,
            options(pure, readonly, preserves_flags, nostack)
        );
    }
    byte
}

#[cfg(not(target_arch = "avr"))]
unsafe fn read_program_byte(addr: *const u8) -> u8 {
    // SAFETY: the caller guarantees `addr` is valid for reads.
    unsafe { addr.read() }
}

/// A half-open view over bytes in either memory bank.
///
/// Two ranges compare equal when their contents match, regardless of where
/// they live.
#[derive(Clone, Copy)]
pub enum TextRange<'a> {
    Ram(&'a [u8]),
    Program(ProgramBytes<'a>),
}

impl<'a> TextRange<'a> {
    pub const fn ram(bytes: &'a [u8]) -> Self {
        Self::Ram(bytes)
    }

    pub const fn ram_str(text: &'a str) -> Self {
        Self::Ram(text.as_bytes())
    }

    /// # Safety
    ///
    /// Same contract as [`ProgramBytes::new`].
    pub const unsafe fn program(bytes: &'a [u8]) -> Self {
        Self::Program(unsafe { ProgramBytes::new(bytes) })
    }

    pub const fn kind(&self) -> MemoryKind {
        match self {
            Self::Ram(_) => MemoryKind::Ram,
            Self::Program(_) => MemoryKind::Program,
        }
    }

    pub const fn len(&self) -> usize {
        match self {
            Self::Ram(bytes) => bytes.len(),
            Self::Program(bytes) => bytes.len,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<u8> {
        (index < self.len()).then(|| self.read(index))
    }

    pub fn first(&self) -> Option<u8> {
        self.get(0)
    }

    pub fn last(&self) -> Option<u8> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    pub fn bytes(&self) -> Bytes<'a> {
        Bytes {
            range: *self,
            front: 0,
            back: self.len(),
        }
    }

    /// Offset of the first `byte` at or after `from`.
    pub fn find(&self, byte: u8, from: usize) -> Option<usize> {
        (from..self.len()).find(|&index| self.read(index) == byte)
    }

    /// Offset of the last `byte`.
    pub fn rfind(&self, byte: u8) -> Option<usize> {
        (0..self.len()).rev().find(|&index| self.read(index) == byte)
    }

    /// Sub-range `[start, end)`, clamped to this range.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);
        match self {
            Self::Ram(bytes) => Self::Ram(&bytes[start..end]),
            Self::Program(bytes) => Self::Program(ProgramBytes {
                ptr: bytes.ptr.wrapping_add(start),
                len: end - start,
                _marker: PhantomData,
            }),
        }
    }

    /// Sub-range from `start` to the end.
    pub fn tail(&self, start: usize) -> Self {
        self.slice(start, self.len())
    }

    /// Compares contents byte by byte.
    pub fn content_eq(&self, other: &TextRange<'_>) -> bool {
        self.len() == other.len() && self.bytes().eq(other.bytes())
    }

    /// Strips everything up to the last `/` or `\`.
    pub fn file_name(&self) -> Self {
        let separator = self.rfind(b'/').max(self.rfind(b'\\'));
        separator.map_or(*self, |index| self.tail(index + 1))
    }

    fn read(&self, index: usize) -> u8 {
        match self {
            Self::Ram(bytes) => bytes[index],
            Self::Program(bytes) => bytes.read(index),
        }
    }
}

impl TextRange<'static> {
    /// Builds a range over a NUL-terminated string in program memory, probing
    /// for the terminator.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a NUL-terminated byte string in program memory that
    /// stays valid for the rest of the program.
    pub unsafe fn program_cstr(ptr: *const u8) -> Self {
        let mut len = 0;
        // SAFETY: the terminator bounds every read.
        while unsafe { read_program_byte(ptr.add(len)) } != 0 {
            len += 1;
        }
        Self::Program(ProgramBytes {
            ptr,
            len,
            _marker: PhantomData,
        })
    }
}

impl PartialEq<TextRange<'_>> for TextRange<'_> {
    fn eq(&self, other: &TextRange<'_>) -> bool {
        self.content_eq(other)
    }
}

impl Eq for TextRange<'_> {}

impl PartialEq<str> for TextRange<'_> {
    fn eq(&self, other: &str) -> bool {
        self.content_eq(&TextRange::ram_str(other))
    }
}

impl PartialEq<&str> for TextRange<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.content_eq(&TextRange::ram_str(other))
    }
}

impl fmt::Display for TextRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chunk = [0u8; TEXT_CHUNK];
        let mut pending = 0;
        for byte in self.bytes() {
            chunk[pending] = byte;
            pending += 1;
            if pending == TEXT_CHUNK {
                pending = write_utf8(f, &mut chunk, pending, false)?;
            }
        }
        write_utf8(f, &mut chunk, pending, true).map(|_| ())
    }
}

impl fmt::Debug for TextRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind(), DebugText(self))
    }
}

struct DebugText<'r, 'a>(&'r TextRange<'a>);

impl fmt::Debug for DebugText<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for byte in self.0.bytes() {
            for escaped in core::ascii::escape_default(byte) {
                f.write_char(escaped as char)?;
            }
        }
        f.write_char('"')
    }
}

/// Writes the valid UTF-8 in `chunk[..len]`, replacing invalid sequences.
/// An incomplete sequence at the end is moved to the front unless `last`.
/// Returns the number of bytes left pending.
fn write_utf8(
    f: &mut fmt::Formatter<'_>,
    chunk: &mut [u8; TEXT_CHUNK],
    len: usize,
    last: bool,
) -> Result<usize, fmt::Error> {
    let mut start = 0;
    loop {
        match core::str::from_utf8(&chunk[start..len]) {
            Ok(text) => {
                f.write_str(text)?;
                return Ok(0);
            }
            Err(err) => {
                let valid = start + err.valid_up_to();
                let text = core::str::from_utf8(&chunk[start..valid]).map_err(|_| fmt::Error)?;
                f.write_str(text)?;
                match err.error_len() {
                    Some(bad) => {
                        f.write_char(char::REPLACEMENT_CHARACTER)?;
                        start = valid + bad;
                    }
                    None if last => {
                        f.write_char(char::REPLACEMENT_CHARACTER)?;
                        return Ok(0);
                    }
                    None => {
                        chunk.copy_within(valid..len, 0);
                        return Ok(len - valid);
                    }
                }
            }
        }
    }
}

/// Byte iterator over a [`TextRange`].
#[derive(Clone)]
pub struct Bytes<'a> {
    range: TextRange<'a>,
    front: usize,
    back: usize,
}

impl Iterator for Bytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.front == self.back {
            return None;
        }
        let byte = self.range.read(self.front);
        self.front += 1;
        Some(byte)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for Bytes<'_> {
    fn next_back(&mut self) -> Option<u8> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.range.read(self.back))
    }
}

impl ExactSizeIterator for Bytes<'_> {}

impl FusedIterator for Bytes<'_> {}

#[doc(hidden)]
pub const fn to_array<const N: usize>(text: &str) -> [u8; N] {
    let bytes = text.as_bytes();
    let mut out = [0u8; N];
    let mut index = 0;
    while index < N {
        out[index] = bytes[index];
        index += 1;
    }
    out
}
