//! Declarative macros.

/// Places a string literal in program memory and yields a [`TextRange`].
///
/// On AVR the bytes go to `.progmem.data` and are read with `lpm`; elsewhere
/// they are ordinary read-only data.
///
/// [`TextRange`]: crate::TextRange
#[macro_export]
macro_rules! text {
    ($text:expr) => {{
        const __TEXT: &str = $text;
        #[cfg_attr(target_arch = "avr", unsafe(link_section = ".progmem.data"))]
        static __BYTES: [u8; __TEXT.len()] = $crate::text::to_array::<{ __TEXT.len() }>(__TEXT);
        // SAFETY: `__BYTES` is static and placed where `program` reads from.
        unsafe { $crate::TextRange::program(&__BYTES) }
    }};
}

/// Source location of the invocation.
#[macro_export]
macro_rules! location {
    () => {
        $crate::assertion::Location {
            file: $crate::text!(file!()),
            line: line!(),
        }
    };
}

/// Declares a named block inside a test body.
///
/// ```ignore
/// sectest::section!("resize", {
///     v.resize(10, 0);
///     sectest::check!(v.len() == 10);
/// });
/// ```
#[macro_export]
macro_rules! section {
    ($name:expr, $body:block) => {{
        static __SECTION: $crate::section::Section =
            $crate::section::Section::new($crate::text!($name));
        let __guard = $crate::section::SectionGuard::enter(&__SECTION);
        if __guard.try_execute() $body
    }};
}

/// Recoverable assertion; evaluates to whether `cond` held.
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        $crate::assertion::check(
            $cond,
            $crate::location!(),
            $crate::text!(stringify!($cond)),
        )
    };
}

/// Fatal assertion: on failure prints the summary and halts.
#[macro_export]
macro_rules! require {
    ($cond:expr $(,)?) => {
        $crate::assertion::require(
            $cond,
            $crate::location!(),
            $crate::text!(stringify!($cond)),
        )
    };
}

/// Formats into the current output.
#[macro_export]
macro_rules! report {
    ($($arg:tt)*) => {
        $crate::output::emit(format_args!($($arg)*))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! fault {
    ($what:expr) => {
        $crate::assertion::fault($crate::location!(), $what)
    };
}

/// Declares a test case as a `static` and, with the `linkme` feature, adds it
/// to the distributed slice.
///
/// ```ignore
/// sectest::case!(VECTOR, "vector", "[vector][fast]", {
///     let mut v = Vec::new();
///     sectest::section!("push", { v.push(1); });
/// });
/// ```
#[macro_export]
macro_rules! case {
    ($(#[$meta:meta])* $vis:vis $case:ident, $name:expr, $tags:expr, $body:block) => {
        $(#[$meta])*
        $vis static $case: $crate::TestCase = {
            fn __body() $body
            static __ENTRIES: [$crate::registry::Entry; 1] = [$crate::registry::Entry::new(__body)];
            $crate::TestCase::new($crate::text!($name), $crate::text!($tags), &__ENTRIES)
        };
        $crate::__distribute!($case);
    };
}

/// Registers test cases with the global registry, in the order given.
#[macro_export]
macro_rules! register {
    ($($case:path),+ $(,)?) => {
        $crate::registry::global().register_all(&[$(&$case),+])
    };
}

#[cfg(feature = "linkme")]
#[doc(hidden)]
#[macro_export]
macro_rules! __distribute {
    ($case:path) => {
        const _: () = {
            #[$crate::__private::linkme::distributed_slice($crate::registry::DISTRIBUTED)]
            #[linkme(crate = $crate::__private::linkme)]
            static __DISTRIBUTED: &'static $crate::TestCase = &$case;
        };
    };
}

#[cfg(not(feature = "linkme"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __distribute {
    ($case:path) => {};
}
