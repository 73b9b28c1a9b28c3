//! Paths to `dm_plan` items used by generated code.

use proc_macro2::TokenStream;
use quote::quote;

/// The path under which the deriving crate reaches `dm_plan`.
///
/// `::dm_plan` for direct dependents, `::dm_core::plan` for crates using the
/// umbrella crate. Reads the caller's manifest, so it is computed once per
/// derive and passed around.
pub(crate) fn dm_plan() -> syn::Path {
    dm_macro_utils::Manifest::shared(|manifest| manifest.get_crate_path("dm_plan"))
}

#[inline(always)]
pub(crate) fn macro_exports_(dm_plan_path: &syn::Path) -> TokenStream {
    quote! {
        #dm_plan_path::__macro_exports
    }
}

#[cfg(feature = "auto_register")]
#[inline(always)]
pub(crate) fn auto_register_(dm_plan_path: &syn::Path) -> TokenStream {
    quote! {
        #dm_plan_path::__macro_exports::auto_register
    }
}
