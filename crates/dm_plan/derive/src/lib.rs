//! See [`Plan`].
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::std_instead_of_core, reason = "proc-macro lib")]
#![allow(clippy::std_instead_of_alloc, reason = "proc-macro lib")]

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

static PLAN_ATTRIBUTE_NAME: &str = "plan";

// -----------------------------------------------------------------------------
// Modules

mod attributes;
mod impls;
mod path;

// -----------------------------------------------------------------------------
// Macros

/// # Construction Plan Derivation
///
/// `#[derive(Plan)]` implements `DescribeClass` for a struct with named
/// fields. The description lists every field in declaration order with the
/// directives written in its `#[plan(...)]` attributes, and records the
/// file the struct is declared in for the `mtime` and `hash` cache policies.
///
/// ## Field Attributes
///
/// | attribute              | directive                                  |
/// |------------------------|--------------------------------------------|
/// | `map_from = "a.b"`     | read the field from `a.b` instead of its name |
/// | `map_to = "a.b"`       | export the field to `a.b`                  |
/// | `hidden`               | leave the field out of exports             |
/// | `computed`             | never read the field from the source       |
/// | `cast_with = "name"`   | convert the read value with a caster       |
/// | `rule = "min:3"`       | check the value against a rule; repeatable |
///
/// ```rust, ignore
/// #[derive(Plan, Deserialize)]
/// struct User {
///     #[plan(map_from = "profile.login", rule = "required")]
///     name: String,
///     #[plan(hidden)]
///     password: String,
/// }
/// ```
///
/// ## Type Attributes
///
/// `#[plan(auto_register)]` submits the type for `PlanCache::warm_up`
/// (with the `auto_register` feature). It has no effect on generic types.
///
/// Enums, tuple structs and unit structs are rejected.
#[proc_macro_derive(Plan, attributes(plan))]
pub fn derive_plan(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    match impls::derive_plan(ast) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}
