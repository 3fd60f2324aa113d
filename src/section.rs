//! Nested, re-entrant sections.
//!
//! A test body is one flat function that the runner calls again and again.
//! Every `section!` site owns a [`Section`] with static storage, so the state
//! survives between calls. On each pass exactly one not yet exhausted leaf is
//! entered: siblings are mutually exclusive within a pass (`child_executed`),
//! and a section only reports itself exhausted once no descendant is left
//! pending (`has_active_child`). The body is exhausted when the root section's
//! [`Section::try_execute`] returns `false`.
//!
//! ```ignore
//! sectest::section!("push", {
//!     sectest::section!("then pop", { /* pass 1 */ });
//!     sectest::section!("then clear", { /* pass 2 */ });
//! });
//! ```

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering::Relaxed};

use crate::context;
use crate::link::{AtomicEpoch, Epoch, StaticLink};
use crate::text::TextRange;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    /// Not entered yet, or entered with work left below it.
    Ready,
    /// Entered during the current pass.
    Running,
    /// This section and all of its descendants are exhausted.
    Finished,
}

impl SectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Ready,
            1 => Self::Running,
            _ => Self::Finished,
        }
    }
}

/// One node of the section tree discovered while a body runs.
pub struct Section {
    name: TextRange<'static>,
    state: AtomicU8,
    child_executed: AtomicBool,
    has_active_child: AtomicBool,
    parent: StaticLink<Section>,
    epoch: AtomicEpoch,
}

impl Section {
    pub const fn new(name: TextRange<'static>) -> Self {
        Self {
            name,
            state: AtomicU8::new(SectionState::Ready as u8),
            child_executed: AtomicBool::new(false),
            has_active_child: AtomicBool::new(false),
            parent: StaticLink::new(),
            epoch: AtomicEpoch::new(0),
        }
    }

    /// The innermost section currently entered.
    pub fn active() -> Option<&'static Section> {
        context::with(|cx| cx.active_section())
    }

    pub fn name(&self) -> TextRange<'static> {
        self.name
    }

    pub fn state(&self) -> SectionState {
        SectionState::from_u8(self.state.load(Relaxed))
    }

    pub fn parent(&self) -> Option<&'static Section> {
        self.parent.get()
    }

    fn set_state(&self, state: SectionState) {
        self.state.store(state as u8, Relaxed);
    }

    /// Decides whether the block runs during this pass.
    pub fn try_execute(&'static self) -> bool {
        let sibling_ran = self
            .parent
            .get()
            .is_some_and(|parent| parent.child_executed.load(Relaxed));
        if sibling_ran || self.state() == SectionState::Finished {
            return false;
        }

        self.set_state(SectionState::Running);
        self.child_executed.store(false, Relaxed);
        self.has_active_child.store(false, Relaxed);
        if let Some(parent) = self.parent.get() {
            parent.child_executed.store(true, Relaxed);
        }
        true
    }

    /// Enters the block: links under the active section and becomes active.
    pub fn start(&'static self) {
        context::with(|cx| {
            self.sync_epoch(cx.epoch());
            let parent = cx.active_section();
            self.parent.set(parent);
            cx.set_active_section(Some(self));
            if let Some(parent) = parent {
                parent.on_child_start(self);
            }
        });
    }

    /// Leaves the block and settles the state reached during this pass.
    pub fn end(&'static self) {
        if self.state() == SectionState::Running {
            let next = if self.has_active_child.load(Relaxed) {
                SectionState::Ready
            } else {
                SectionState::Finished
            };
            self.set_state(next);
        }
        trace!("section [{}] ends {:?}", self.name, self.state());

        context::with(|cx| {
            if !cx
                .active_section()
                .is_some_and(|active| core::ptr::eq(active, self))
            {
                crate::fault!("section ended while not active");
            }
            let parent = self.parent.get();
            if let Some(parent) = parent {
                parent.on_child_end(self.state());
            }
            cx.set_active_section(parent);
        });
    }

    /// Brings the section back to `Ready` if it was last used under another
    /// epoch (a previous entry of a generic body, or a previous run).
    pub(crate) fn rearm(&'static self) {
        context::with(|cx| self.sync_epoch(cx.epoch()));
    }

    fn sync_epoch(&self, epoch: Epoch) {
        if self.epoch.load(Relaxed) != epoch {
            self.epoch.store(epoch, Relaxed);
            self.set_state(SectionState::Ready);
            self.child_executed.store(false, Relaxed);
            self.has_active_child.store(false, Relaxed);
            self.parent.set(None);
        }
    }

    fn on_child_start(&self, child: &Section) {
        trace!("section [{}] enters [{}]", self.name, child.name);
    }

    fn on_child_end(&self, child_state: SectionState) {
        if child_state == SectionState::Ready {
            self.has_active_child.store(true, Relaxed);
        }
    }
}

/// Scoped entry into a section; `end` runs on every exit path.
#[must_use = "the section ends when the guard is dropped"]
pub struct SectionGuard {
    section: &'static Section,
}

impl SectionGuard {
    pub fn enter(section: &'static Section) -> Self {
        section.start();
        Self { section }
    }

    pub fn try_execute(&self) -> bool {
        self.section.try_execute()
    }
}

impl Drop for SectionGuard {
    fn drop(&mut self) {
        self.section.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Entry;
    use crate::runner::run_entry;
    use crate::testing::capture;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::boxed::Box;

    fn leak_entry(body: fn()) -> &'static Entry {
        Box::leak(Box::new(Entry::new(body)))
    }

    #[test]
    fn test_two_disjoint_leaves() {
        static A: AtomicUsize = AtomicUsize::new(0);
        static B: AtomicUsize = AtomicUsize::new(0);
        fn body() {
            crate::section!("a", {
                A.fetch_add(1, Ordering::Relaxed);
            });
            crate::section!("b", {
                B.fetch_add(1, Ordering::Relaxed);
            });
        }

        let passes = run_entry(leak_entry(body));
        assert_eq!(passes, 2);
        assert_eq!(A.load(Ordering::Relaxed), 1);
        assert_eq!(B.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_one_leaf_per_pass() {
        static HITS: [AtomicUsize; 4] = [const { AtomicUsize::new(0) }; 4];
        static PER_PASS: AtomicUsize = AtomicUsize::new(0);
        static MAX_PER_PASS: AtomicUsize = AtomicUsize::new(0);
        fn hit(index: usize) {
            HITS[index].fetch_add(1, Ordering::Relaxed);
            PER_PASS.fetch_add(1, Ordering::Relaxed);
        }
        fn body() {
            PER_PASS.store(0, Ordering::Relaxed);
            crate::section!("0", { hit(0) });
            crate::section!("1", { hit(1) });
            crate::section!("2", { hit(2) });
            crate::section!("3", { hit(3) });
            MAX_PER_PASS.fetch_max(PER_PASS.load(Ordering::Relaxed), Ordering::Relaxed);
        }

        assert_eq!(run_entry(leak_entry(body)), 4);
        assert!(HITS.iter().all(|hits| hits.load(Ordering::Relaxed) == 1));
        assert_eq!(MAX_PER_PASS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_nested_leaves_share_outer_code() {
        static OUTER: AtomicUsize = AtomicUsize::new(0);
        static FIRST: AtomicUsize = AtomicUsize::new(0);
        static SECOND: AtomicUsize = AtomicUsize::new(0);
        fn body() {
            crate::section!("outer", {
                OUTER.fetch_add(1, Ordering::Relaxed);
                crate::section!("first", {
                    FIRST.fetch_add(1, Ordering::Relaxed);
                });
                crate::section!("second", {
                    SECOND.fetch_add(1, Ordering::Relaxed);
                });
            });
        }

        assert_eq!(run_entry(leak_entry(body)), 2);
        assert_eq!(OUTER.load(Ordering::Relaxed), 2);
        assert_eq!(FIRST.load(Ordering::Relaxed), 1);
        assert_eq!(SECOND.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_setup_counter_sees_fresh_pass_per_leaf() {
        // a, b, c.1, c.2 each get their own pass.
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        static SEEN: [AtomicUsize; 4] = [const { AtomicUsize::new(0) }; 4];
        fn body() {
            let call = CALLS.fetch_add(1, Ordering::Relaxed) + 1;
            crate::section!("a", { SEEN[0].store(call, Ordering::Relaxed) });
            crate::section!("b", { SEEN[1].store(call, Ordering::Relaxed) });
            crate::section!("c", {
                crate::section!("c.1", { SEEN[2].store(call, Ordering::Relaxed) });
                crate::section!("c.2", { SEEN[3].store(call, Ordering::Relaxed) });
            });
        }

        assert_eq!(run_entry(leak_entry(body)), 4);
        let seen: std::vec::Vec<usize> = SEEN.iter().map(|s| s.load(Ordering::Relaxed)).collect();
        assert_eq!(seen, [1, 2, 3, 4]);
    }

    #[test]
    fn test_leaf_finishes_on_first_pass() {
        static LEAF: Section = Section::new(TextRange::ram_str("leaf"));
        static ROOT: Section = Section::new(TextRange::ram_str("root"));

        ROOT.rearm();
        assert!(ROOT.try_execute());
        let root = SectionGuard::enter(&ROOT);
        {
            let leaf = SectionGuard::enter(&LEAF);
            assert!(leaf.try_execute());
            assert_eq!(Section::active().map(Section::name), Some(LEAF.name()));
            assert!(core::ptr::eq(LEAF.parent().unwrap(), &ROOT));
        }
        assert_eq!(LEAF.state(), SectionState::Finished);
        drop(root);
        assert_eq!(ROOT.state(), SectionState::Finished);
        assert!(Section::active().is_none());
        assert!(!ROOT.try_execute());
    }

    #[test]
    fn test_early_return_still_ends_sections() {
        // Sections after the return are never discovered, so the body is
        // exhausted after one pass.
        static AFTER: AtomicUsize = AtomicUsize::new(0);
        fn body() {
            crate::section!("outer", {
                crate::section!("bails", {
                    return;
                });
            });
            crate::section!("after", {
                AFTER.fetch_add(1, Ordering::Relaxed);
            });
        }

        let entry = leak_entry(body);
        assert_eq!(run_entry(entry), 1);
        assert_eq!(AFTER.load(Ordering::Relaxed), 0);
        assert!(Section::active().is_none());
        assert_eq!(entry.root().state(), SectionState::Finished);
    }

    #[test]
    fn test_ending_an_inactive_section_faults() {
        static OUTER: Section = Section::new(TextRange::ram_str("outer"));
        static INNER: Section = Section::new(TextRange::ram_str("inner"));
        fn panic_halt() -> ! {
            panic!("halted")
        }

        let sink = capture();
        let faulted = std::thread::spawn(move || {
            crate::set_halt_handler(panic_halt);
            crate::output::set(sink);
            let outer = SectionGuard::enter(&OUTER);
            let _inner = SectionGuard::enter(&INNER);
            drop(outer);
        })
        .join();

        assert!(faulted.is_err());
        assert!(
            sink.contents()
                .starts_with("Internal fault: section ended while not active. Location [section.rs:")
        );
    }
}
