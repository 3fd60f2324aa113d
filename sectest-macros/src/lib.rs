//! Procedural macros for sectest
//!
//! This crate provides the `#[test_case]` attribute. It turns a function into
//! a `static` test case and, with the `linkme` feature of `sectest`, adds it to
//! the distributed slice that `sectest::run()` collects.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Ident, ItemFn, LitStr, Path, Token, Type, parenthesized, parse_macro_input};

/// Build-time tag: when set, only tests whose tag string contains it are
/// compiled in.
const COMPILE_TIME_TAGS: &str = "SECTEST_COMPILE_TIME_TAGS";

struct Args {
    name: LitStr,
    tags: LitStr,
    types: Vec<Type>,
    fixture: Option<Path>,
}

impl Parse for Args {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name = input.parse()?;
        input.parse::<Token![,]>()?;
        let tags = input.parse()?;

        let mut types = Vec::new();
        let mut fixture = None;
        while !input.is_empty() {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            let key: Ident = input.parse()?;
            if key == "types" {
                let content;
                parenthesized!(content in input);
                types = Punctuated::<Type, Token![,]>::parse_terminated(&content)?
                    .into_iter()
                    .collect();
            } else if key == "fixture" {
                input.parse::<Token![=]>()?;
                fixture = Some(input.parse()?);
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    "expected `types(..)` or `fixture = PATH`",
                ));
            }
        }

        Ok(Self {
            name,
            tags,
            types,
            fixture,
        })
    }
}

/// Declares a test case.
///
/// # Example
///
/// ```rust,ignore
/// #[sectest::test_case("vector", "[vector][fast]")]
/// fn vector() {
///     sectest::section!("push", { /* ... */ });
/// }
///
/// #[sectest::test_case("zero", "[generic]", types(u8, i64))]
/// fn zero<T: Default + PartialEq>() {
///     sectest::check!(T::default() == T::default());
/// }
/// ```
///
/// # Arguments
/// - `"name"`, `"[tags]"`: string literals, required
/// - `types(A, B, ..)`: one entry per type for a generic function
/// - `fixture = PATH`: a `static` implementing `sectest::Fixture`
///
/// The case is a `static` named after the function in upper case with a
/// `_CASE` suffix, e.g. `VECTOR_CASE`.
#[proc_macro_attribute]
pub fn test_case(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as Args);
    let input = parse_macro_input!(item as ItemFn);

    match expand(args, input) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(args: Args, input: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let sig = &input.sig;
    if !sig.inputs.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "test bodies take no arguments",
        ));
    }
    let generic = sig.generics.type_params().count();
    if generic > 1 || (generic == 1) == args.types.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "`types(..)` requires a function with exactly one type parameter",
        ));
    }

    if let Ok(wanted) = std::env::var(COMPILE_TIME_TAGS) {
        if !wanted.is_empty() && !args.tags.value().contains(&wanted) {
            return Ok(quote! {
                #[allow(dead_code)]
                #input
            });
        }
    }

    let fn_name = &sig.ident;
    let vis = &input.vis;
    let case_name = format_ident!("{}_CASE", fn_name.to_string().to_uppercase());
    let name = &args.name;
    let tags = &args.tags;

    let entries: Vec<_> = if args.types.is_empty() {
        vec![quote! { ::sectest::Entry::new(#fn_name) }]
    } else {
        args.types
            .iter()
            .map(|ty| {
                let label = LitStr::new(&type_label(ty), Span::call_site());
                quote! { ::sectest::Entry::typed(#fn_name::<#ty>, ::sectest::text!(#label)) }
            })
            .collect()
    };
    let count = entries.len();
    let fixture = args
        .fixture
        .as_ref()
        .map(|fixture| quote! { .with_fixture(&#fixture) });

    Ok(quote! {
        #input

        #[allow(non_upper_case_globals)]
        #vis static #case_name: ::sectest::TestCase = {
            static __ENTRIES: [::sectest::Entry; #count] = [#(#entries),*];
            ::sectest::TestCase::new(::sectest::text!(#name), ::sectest::text!(#tags), &__ENTRIES)
                #fixture
        };

        ::sectest::__distribute!(#case_name);
    })
}

/// Renders a type the way it is written, without the token spacing.
fn type_label(ty: &Type) -> String {
    let raw = quote!(#ty).to_string();
    let chars: Vec<char> = raw.chars().collect();
    let word = |c: Option<&char>| c.is_some_and(|c| c.is_alphanumeric() || *c == '_');

    chars
        .iter()
        .enumerate()
        .filter(|&(i, c)| {
            *c != ' ' || (i > 0 && word(chars.get(i - 1)) && word(chars.get(i + 1)))
        })
        .map(|(_, c)| *c)
        .collect()
}
