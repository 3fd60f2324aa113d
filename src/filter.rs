//! Tag expression filtering.
//!
//! An expression is a comma separated list of tokens. A token is an optional
//! `~` followed by one or more bracketed tags written back to back:
//!
//! * `[io]` selects tests tagged `[io]`
//! * `[io][slow]` selects tests tagged with both
//! * `[io],[net]` selects tests tagged with either
//! * `~[slow]` selects tests not tagged `[slow]`
//!
//! Tags are compared exactly, brackets included, straight from the
//! [`TextRange`]s; nothing is copied.

use crate::context::RunGuard;
use crate::error::{MutError, MutResult};
use crate::registry::{Registry, TestCase};
use crate::text::TextRange;

/// A validated filter expression.
#[derive(Debug, Clone, Copy)]
pub struct Filter<'a> {
    expr: TextRange<'a>,
}

impl<'a> Filter<'a> {
    /// Validates `expr`. An empty expression selects everything.
    pub fn parse(expr: TextRange<'a>) -> MutResult<Self> {
        let filter = Self { expr };
        if !filter.is_empty() {
            for token in filter.tokens() {
                token.validate()?;
            }
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_empty()
    }

    /// Whether `case` is selected by at least one token.
    pub fn matches(&self, case: &TestCase) -> bool {
        self.is_empty()
            || self
                .tokens()
                .any(|token| token.matches(case) != token.negated)
    }

    /// Sets the `enabled` flag of every registered case; returns how many are
    /// enabled.
    ///
    /// Fails with [`MutError::RunInProgress`] while any run is in flight.
    pub fn apply(&self, registry: &Registry) -> MutResult<usize> {
        let _run = RunGuard::try_acquire().ok_or(MutError::RunInProgress)?;
        Ok(self.apply_held(registry))
    }

    /// [`Filter::apply`] for a caller already holding the run claim.
    pub(crate) fn apply_held(&self, registry: &Registry) -> usize {
        let mut enabled = 0;
        for case in registry {
            let selected = self.matches(case);
            debug!("filter {} test [{}] {}", self.expr, case.name(), selected);
            case.set_enabled(selected);
            enabled += usize::from(selected);
        }
        enabled
    }

    fn tokens(&self) -> Tokens<'a> {
        Tokens {
            expr: self.expr,
            start: 0,
            done: false,
        }
    }
}

/// Parses `expr` and applies it; `None` selects everything.
pub fn apply(expr: Option<TextRange<'_>>, registry: &Registry) -> MutResult<usize> {
    Filter::parse(expr.unwrap_or(TextRange::ram(&[])))?.apply(registry)
}

/// Whether `tag` is one non-empty `[...]` with no bracket inside.
pub(crate) fn is_tag(tag: &TextRange<'_>) -> bool {
    tag.len() > 2 && tag.first() == Some(b'[') && tag.find(b']', 0) == Some(tag.len() - 1)
}

struct Token<'a> {
    negated: bool,
    tags: TextRange<'a>,
    offset: usize,
}

impl<'a> Token<'a> {
    fn validate(&self) -> MutResult<()> {
        if self.tags.is_empty() {
            return Err(MutError::MalformedFilter {
                position: self.offset,
            });
        }
        self.tags().try_for_each(|tag| tag.map(|_| ()))
    }

    /// Whether `case` carries every tag of this token.
    fn matches(&self, case: &TestCase) -> bool {
        self.tags()
            .all(|tag| tag.is_ok_and(|tag| case.has_tag(tag)))
    }

    fn tags(&self) -> Tags<'a> {
        Tags {
            tags: self.tags,
            start: 0,
            offset: self.offset,
        }
    }
}

struct Tokens<'a> {
    expr: TextRange<'a>,
    start: usize,
    done: bool,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.done {
            return None;
        }
        let len = self.expr.len();
        let end = self.expr.find(b',', self.start).unwrap_or(len);
        let raw = self.expr.slice(self.start, end);
        let offset = self.start;
        if end == len {
            self.done = true;
        } else {
            self.start = end + 1;
        }

        Some(if raw.first() == Some(b'~') {
            Token {
                negated: true,
                tags: raw.tail(1),
                offset: offset + 1,
            }
        } else {
            Token {
                negated: false,
                tags: raw,
                offset,
            }
        })
    }
}

struct Tags<'a> {
    tags: TextRange<'a>,
    start: usize,
    offset: usize,
}

impl<'a> Iterator for Tags<'a> {
    type Item = MutResult<TextRange<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.tags.len() {
            return None;
        }
        let end = self
            .tags
            .find(b'[', self.start + 1)
            .unwrap_or(self.tags.len());
        let tag = self.tags.slice(self.start, end);
        let position = self.offset + self.start;
        self.start = end;

        Some(if is_tag(&tag) {
            Ok(tag)
        } else {
            Err(MutError::MalformedFilter { position })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{leak_case, serial};
    use proptest::prelude::*;
    use std::vec::Vec;

    fn registry(cases: &[(&'static str, &'static str)]) -> &'static Registry {
        let registry = std::boxed::Box::leak(std::boxed::Box::new(Registry::new()));
        for &(name, tags) in cases {
            registry.register(leak_case(name, tags, 1)).unwrap();
        }
        registry
    }

    fn enabled_names(expr: &str, registry: &Registry) -> Vec<std::string::String> {
        apply(Some(TextRange::ram_str(expr)), registry).unwrap();
        registry
            .iter()
            .filter(|case| case.is_enabled())
            .map(|case| std::format!("{}", case.name()))
            .collect()
    }

    const CASES: &[(&str, &str)] = &[
        ("vector", "[a]"),
        ("map", "[a][b]"),
        ("string", "[b]"),
        ("misc", ""),
        ("set", "[b][c][a]"),
    ];

    #[test]
    fn test_empty_enables_all() {
        let _serial = serial();
        let registry = registry(CASES);
        assert_eq!(apply(None, registry), Ok(5));
        assert_eq!(apply(Some(TextRange::ram_str("")), registry), Ok(5));
        assert_eq!(registry.enabled_entry_count(), registry.entry_count());
    }

    #[test]
    fn test_single_tag() {
        let _serial = serial();
        let registry = registry(CASES);
        assert_eq!(enabled_names("[a]", registry), ["vector", "map", "set"]);
    }

    #[test]
    fn test_tags_in_a_token_are_anded() {
        let _serial = serial();
        let registry = registry(CASES);
        assert_eq!(enabled_names("[a][b]", registry), ["map", "set"]);
        assert_eq!(enabled_names("[c][a][b]", registry), ["set"]);
    }

    #[test]
    fn test_tokens_are_ored() {
        let _serial = serial();
        let registry = registry(CASES);
        assert_eq!(enabled_names("[c],[b]", registry), ["map", "string", "set"]);
    }

    #[test]
    fn test_negation() {
        let _serial = serial();
        let registry = registry(CASES);
        assert_eq!(enabled_names("~[a]", registry), ["string", "misc"]);
        assert_eq!(enabled_names("~[a][b]", registry), ["vector", "string", "misc"]);
        assert_eq!(enabled_names("[c],~[b]", registry), ["vector", "misc", "set"]);
    }

    #[test]
    fn test_program_memory_expression() {
        let _serial = serial();
        static EXPR: TextRange<'static> = crate::text!("[b][a]");
        let registry = registry(CASES);
        assert_eq!(apply(Some(EXPR), registry), Ok(2));
    }

    #[test]
    fn test_malformed_expressions() {
        let _serial = serial();
        let registry = registry(CASES);
        let malformed = |expr: &str| {
            apply(Some(TextRange::ram_str(expr)), registry)
                .err()
                .map(|err| match err {
                    MutError::MalformedFilter { position } => position,
                    other => panic!("unexpected {other:?}"),
                })
        };

        assert_eq!(malformed("a"), Some(0));
        assert_eq!(malformed("[a]x"), Some(0));
        assert_eq!(malformed("[a]x]"), Some(0));
        assert_eq!(malformed("[a],[b]]"), Some(4));
        assert_eq!(malformed("~[a][b]]"), Some(4));
        assert_eq!(malformed("[a],[b"), Some(4));
        assert_eq!(malformed("[a][]"), Some(3));
        assert_eq!(malformed("[a],,[b]"), Some(4));
        assert_eq!(malformed("[a],"), Some(4));
        assert_eq!(malformed("~"), Some(1));
        assert_eq!(malformed(" [a]"), Some(0));
        assert_eq!(malformed("[a],~[b]"), None);
    }

    #[test]
    fn test_malformed_leaves_flags_alone() {
        let _serial = serial();
        let registry = registry(CASES);
        apply(Some(TextRange::ram_str("[b]")), registry).unwrap();
        assert!(apply(Some(TextRange::ram_str("[a],oops")), registry).is_err());
        assert_eq!(registry.enabled_count(), 3);
    }

    const ALPHABET: [&str; 4] = ["[a]", "[b]", "[c]", "[d]"];

    fn tag_string(mask: u8) -> &'static str {
        let tags: std::string::String = ALPHABET
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, tag)| *tag)
            .collect();
        std::boxed::Box::leak(tags.into_boxed_str())
    }

    proptest! {
        #[test]
        fn prop_negation_is_complement(masks in prop::collection::vec(0u8..16, 1..12), bit in 0usize..4) {
            let _serial = serial();
            let registry = std::boxed::Box::leak(std::boxed::Box::new(Registry::new()));
            for mask in &masks {
                registry.register(leak_case("t", tag_string(*mask), 1)).unwrap();
            }

            let tag = ALPHABET[bit];
            apply(Some(TextRange::ram_str(tag)), registry).unwrap();
            let selected: Vec<bool> = registry.iter().map(|case| case.is_enabled()).collect();
            let negated = std::format!("~{tag}");
            apply(Some(TextRange::ram_str(&negated)), registry).unwrap();
            let complement: Vec<bool> = registry.iter().map(|case| !case.is_enabled()).collect();

            prop_assert_eq!(&selected, &complement);
            let expected: Vec<bool> = masks.iter().map(|mask| mask & (1 << bit) != 0).collect();
            prop_assert_eq!(selected, expected);
        }

        #[test]
        fn prop_and_or(masks in prop::collection::vec(0u8..16, 1..12), x in 0usize..4, y in 0usize..4) {
            let _serial = serial();
            let registry = std::boxed::Box::leak(std::boxed::Box::new(Registry::new()));
            for mask in &masks {
                registry.register(leak_case("t", tag_string(*mask), 1)).unwrap();
            }
            let has = |mask: u8, bit: usize| mask & (1 << bit) != 0;

            let and = std::format!("{}{}", ALPHABET[x], ALPHABET[y]);
            apply(Some(TextRange::ram_str(&and)), registry).unwrap();
            let got: Vec<bool> = registry.iter().map(|case| case.is_enabled()).collect();
            let want: Vec<bool> = masks.iter().map(|&m| has(m, x) && has(m, y)).collect();
            prop_assert_eq!(got, want);

            let or = std::format!("{},{}", ALPHABET[x], ALPHABET[y]);
            apply(Some(TextRange::ram_str(&or)), registry).unwrap();
            let got: Vec<bool> = registry.iter().map(|case| case.is_enabled()).collect();
            let want: Vec<bool> = masks.iter().map(|&m| has(m, x) || has(m, y)).collect();
            prop_assert_eq!(got, want);
        }
    }
}
