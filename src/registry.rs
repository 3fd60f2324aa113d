//! Test case registration.
//!
//! Test cases are `static` items linked into an intrusive, append-only list,
//! so registering a test never allocates. Run order is registration order.

use core::fmt::{self, Display};
use core::sync::atomic::{AtomicBool, Ordering::Relaxed};

use crate::config::ROOT_SECTION_NAME;
use crate::context::{self, RunGuard};
use crate::error::{MutError, MutResult};
use crate::link::StaticLink;
use crate::section::Section;
use crate::text::TextRange;

/// Hooks wrapped around every invocation of a test case body.
pub trait Fixture: Sync {
    fn on_enter(&self) {}
    fn on_exit(&self) {}
}

/// One invocable instantiation of a test body.
///
/// Type-parameterized tests carry one entry per type, labelled with the type
/// name.
pub struct Entry {
    body: fn(),
    root: Section,
    type_label: Option<TextRange<'static>>,
}

impl Entry {
    pub const fn new(body: fn()) -> Self {
        Self {
            body,
            root: Section::new(TextRange::ram_str(ROOT_SECTION_NAME)),
            type_label: None,
        }
    }

    pub const fn typed(body: fn(), type_label: TextRange<'static>) -> Self {
        Self {
            body,
            root: Section::new(TextRange::ram_str(ROOT_SECTION_NAME)),
            type_label: Some(type_label),
        }
    }

    pub fn type_label(&self) -> Option<TextRange<'static>> {
        self.type_label
    }

    pub fn root(&'static self) -> &'static Section {
        &self.root
    }

    pub(crate) fn invoke(&self) {
        (self.body)()
    }
}

/// A named, tagged collection of entries.
pub struct TestCase {
    name: TextRange<'static>,
    tags: TextRange<'static>,
    entries: &'static [Entry],
    fixture: Option<&'static dyn Fixture>,
    enabled: AtomicBool,
    failed: AtomicBool,
    linked: AtomicBool,
    next: StaticLink<TestCase>,
}

impl TestCase {
    pub const fn new(
        name: TextRange<'static>,
        tags: TextRange<'static>,
        entries: &'static [Entry],
    ) -> Self {
        Self {
            name,
            tags,
            entries,
            fixture: None,
            enabled: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            linked: AtomicBool::new(false),
            next: StaticLink::new(),
        }
    }

    pub const fn with_fixture(self, fixture: &'static dyn Fixture) -> Self {
        Self {
            fixture: Some(fixture),
            ..self
        }
    }

    /// The test case currently running.
    pub fn active() -> Option<&'static TestCase> {
        context::with(|cx| cx.active_case())
    }

    pub fn name(&self) -> TextRange<'static> {
        self.name
    }

    pub fn tags(&self) -> TextRange<'static> {
        self.tags
    }

    pub fn entries(&'static self) -> &'static [Entry] {
        self.entries
    }

    pub fn fixture(&self) -> Option<&'static dyn Fixture> {
        self.fixture
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Relaxed)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Relaxed);
    }

    pub(crate) fn clear_failed(&self) {
        self.failed.store(false, Relaxed);
    }

    /// Marks the case failed; `true` only the first time.
    pub(crate) fn mark_failed(&self) -> bool {
        let first = !self.failed.load(Relaxed);
        self.failed.store(true, Relaxed);
        first
    }

    /// Whether the case's own tag string lists exactly `tag` (brackets
    /// included).
    pub fn has_tag(&self, tag: TextRange<'_>) -> bool {
        let mut start = 0;
        while start < self.tags.len() {
            let end = self.tags.find(b'[', start + 1).unwrap_or(self.tags.len());
            let own = self.tags.slice(start, end);
            if !crate::filter::is_tag(&own) {
                warn!("Malformed tag in test [{}]: {}", self.name, own);
                return false;
            }
            if own == tag {
                return true;
            }
            start = end;
        }
        false
    }
}

/// Type label of the entry currently running, for type-parameterized tests.
pub fn active_type() -> Option<TextRange<'static>> {
    context::with(|cx| cx.active_entry()).and_then(Entry::type_label)
}

/// Displays as `name` or `name<type>`.
pub(crate) struct Label {
    pub case: Option<&'static TestCase>,
    pub entry: Option<&'static Entry>,
}

impl Label {
    pub fn active() -> Self {
        context::with(|cx| Self {
            case: cx.active_case(),
            entry: cx.active_entry(),
        })
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.case {
            Some(case) => write!(f, "{}", case.name)?,
            None => f.write_str("?")?,
        }
        match self.entry.and_then(Entry::type_label) {
            Some(label) => write!(f, "<{label}>"),
            None => Ok(()),
        }
    }
}

/// Append-only list of test cases.
pub struct Registry {
    first: StaticLink<TestCase>,
    last: StaticLink<TestCase>,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            first: StaticLink::new(),
            last: StaticLink::new(),
        }
    }

    /// Appends `case` to the end of the list.
    ///
    /// Fails with [`MutError::RunInProgress`] while any run is in flight.
    pub fn register(&self, case: &'static TestCase) -> MutResult<()> {
        let _run = RunGuard::try_acquire().ok_or(MutError::RunInProgress)?;
        if case.linked.load(Relaxed) {
            return Err(MutError::AlreadyRegistered);
        }
        case.linked.store(true, Relaxed);
        match self.last.get() {
            Some(last) => last.next.set(Some(case)),
            None => self.first.set(Some(case)),
        }
        self.last.set(Some(case));
        debug!("registered test [{}] {}", case.name, case.tags);
        Ok(())
    }

    /// Registers `cases` in order, stopping at the first error.
    pub fn register_all(&self, cases: &[&'static TestCase]) -> MutResult<()> {
        cases.iter().try_for_each(|&case| self.register(case))
    }

    pub fn iter(&self) -> Iter {
        Iter {
            next: self.first.get(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.get().is_none()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn entry_count(&self) -> usize {
        self.iter().map(|case| case.entries.len()).sum()
    }

    pub fn enabled_count(&self) -> usize {
        self.iter().filter(|case| case.is_enabled()).count()
    }

    pub fn enabled_entry_count(&self) -> usize {
        self.iter()
            .filter(|case| case.is_enabled())
            .map(|case| case.entries.len())
            .sum()
    }

    /// Fails with [`MutError::RunInProgress`] while any run is in flight.
    pub fn set_all_enabled(&self, enabled: bool) -> MutResult<()> {
        let _run = RunGuard::try_acquire().ok_or(MutError::RunInProgress)?;
        for case in self.iter() {
            case.set_enabled(enabled);
        }
        Ok(())
    }

    /// Registers every test declared with `#[test_case]` that is not linked
    /// yet. Slice order follows link order.
    #[cfg(feature = "linkme")]
    pub fn collect_distributed(&self) -> usize {
        DISTRIBUTED
            .iter()
            .copied()
            .filter(|&case| self.register(case).is_ok())
            .count()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> IntoIterator for &'r Registry {
    type Item = &'static TestCase;
    type IntoIter = Iter;

    fn into_iter(self) -> Iter {
        self.iter()
    }
}

/// Forward iterator over registered test cases.
pub struct Iter {
    next: Option<&'static TestCase>,
}

impl Iterator for Iter {
    type Item = &'static TestCase;

    fn next(&mut self) -> Option<&'static TestCase> {
        let case = self.next?;
        self.next = case.next.get();
        Some(case)
    }
}

/// Test cases declared through the attribute macro.
#[cfg(feature = "linkme")]
#[linkme::distributed_slice]
pub static DISTRIBUTED: [&'static TestCase];

static GLOBAL: Registry = Registry::new();

/// The process-wide registry.
pub fn global() -> &'static Registry {
    &GLOBAL
}
