//! Parsing of `#[plan(...)]`.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, LitStr};

use crate::PLAN_ATTRIBUTE_NAME;

fn plan_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident(PLAN_ATTRIBUTE_NAME))
}

/// A non-empty string value, e.g. `map_from = "user.name"`.
fn string_value(meta: &ParseNestedMeta) -> syn::Result<LitStr> {
    let lit: LitStr = meta.value()?.parse()?;
    if lit.value().trim().is_empty() {
        return Err(syn::Error::new(lit.span(), "expected a non-empty string"));
    }
    Ok(lit)
}

// -----------------------------------------------------------------------------
// TypeAttributes

/// Attributes on the type itself.
#[derive(Default)]
pub(crate) struct TypeAttributes {
    /// Set by `#[plan(auto_register)]`.
    pub auto_register: Option<Span>,
}

impl TypeAttributes {
    pub fn parse_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in plan_attrs(attrs) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("auto_register") {
                    this.auto_register = Some(meta.path.require_ident()?.span());
                    Ok(())
                } else {
                    Err(meta.error("unknown type attribute, expected `auto_register`"))
                }
            })?;
        }
        Ok(this)
    }
}

// -----------------------------------------------------------------------------
// FieldAttributes

enum FieldDirective {
    CastWith(LitStr),
    MapFrom(LitStr),
    MapTo(LitStr),
    Hidden,
    Computed,
    Rule(LitStr),
}

/// Directives of one field, in the order they are written.
#[derive(Default)]
pub(crate) struct FieldAttributes {
    directives: Vec<FieldDirective>,
}

impl FieldAttributes {
    pub fn parse_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in plan_attrs(attrs) {
            attr.parse_nested_meta(|meta| {
                let directive = if meta.path.is_ident("hidden") {
                    FieldDirective::Hidden
                } else if meta.path.is_ident("computed") {
                    FieldDirective::Computed
                } else if meta.path.is_ident("map_from") {
                    FieldDirective::MapFrom(string_value(&meta)?)
                } else if meta.path.is_ident("map_to") {
                    FieldDirective::MapTo(string_value(&meta)?)
                } else if meta.path.is_ident("cast_with") {
                    FieldDirective::CastWith(string_value(&meta)?)
                } else if meta.path.is_ident("rule") {
                    let rule = string_value(&meta)?;
                    if rule.value().starts_with(':') {
                        return Err(syn::Error::new(rule.span(), "rule name is empty"));
                    }
                    FieldDirective::Rule(rule)
                } else {
                    return Err(meta.error(
                        "unknown field attribute, expected one of \
                         `hidden`, `computed`, `map_from`, `map_to`, `cast_with`, `rule`",
                    ));
                };
                this.directives.push(directive);
                Ok(())
            })?;
        }
        Ok(this)
    }

    /// `.with_directive(..)` calls, one per directive.
    pub fn get_expressions(&self, macro_exports: &TokenStream) -> Vec<TokenStream> {
        self.directives
            .iter()
            .map(|directive| {
                let directive = match directive {
                    FieldDirective::CastWith(lit) => {
                        quote!(#macro_exports::Directive::CastWith(::core::convert::Into::into(#lit)))
                    }
                    FieldDirective::MapFrom(lit) => {
                        quote!(#macro_exports::Directive::MapFrom(::core::convert::Into::into(#lit)))
                    }
                    FieldDirective::MapTo(lit) => {
                        quote!(#macro_exports::Directive::MapTo(::core::convert::Into::into(#lit)))
                    }
                    FieldDirective::Hidden => quote!(#macro_exports::Directive::Hidden),
                    FieldDirective::Computed => quote!(#macro_exports::Directive::Computed),
                    FieldDirective::Rule(lit) => quote! {
                        #macro_exports::Directive::ValidationRule(
                            #macro_exports::ValidationRule::parse(#lit)
                        )
                    },
                };
                quote!(.with_directive(#directive))
            })
            .collect()
    }
}
