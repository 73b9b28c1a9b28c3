use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, parse_quote};

use crate::attributes::{FieldAttributes, TypeAttributes};

pub(crate) fn derive_plan(mut ast: DeriveInput) -> syn::Result<TokenStream> {
    let type_attributes = TypeAttributes::parse_attrs(&ast.attrs)?;

    let fields = match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &ast.ident,
                    "`Plan` can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &ast.ident,
                "`Plan` can only be derived for structs",
            ));
        }
    };

    let dm_plan_path = crate::path::dm_plan();
    let macro_exports = crate::path::macro_exports_(&dm_plan_path);

    let mut with_fields = Vec::with_capacity(fields.len());
    for field in fields {
        let attributes = FieldAttributes::parse_attrs(&field.attrs)?;
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = ident.unraw().to_string();
        let with_directives = attributes.get_expressions(&macro_exports);
        with_fields.push(quote! {
            .with_field(
                #macro_exports::FieldInfo::new(#name)
                    #(#with_directives)*
            )
        });
    }

    let auto_register = get_auto_register_impl(&ast, &type_attributes, &dm_plan_path);

    // `DescribeClass: 'static`
    let params: Vec<_> = ast.generics.type_params().map(|param| param.ident.clone()).collect();
    let where_clause = ast.generics.make_where_clause();
    for param in params {
        where_clause.predicates.push(parse_quote!(#param: 'static));
    }

    let ident = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    Ok(quote! {
        const _: () = {
            impl #impl_generics #macro_exports::DescribeClass for #ident #ty_generics #where_clause {
                fn describe() -> #macro_exports::ClassInfo {
                    #macro_exports::ClassInfo::new(::core::any::type_name::<Self>())
                        .with_source(#macro_exports::SourceLocation::in_crate(
                            ::core::env!("CARGO_MANIFEST_DIR"),
                            ::core::file!(),
                        ))
                        #(#with_fields)*
                }
            }
        };

        #auto_register
    })
}

/// Submits the type for `PlanCache::warm_up`. Generic types are skipped.
#[cfg(feature = "auto_register")]
fn get_auto_register_impl(
    ast: &DeriveInput,
    attributes: &TypeAttributes,
    dm_plan_path: &syn::Path,
) -> TokenStream {
    use quote::quote_spanned;

    let Some(span) = attributes.auto_register else {
        return TokenStream::new();
    };
    if !ast.generics.params.is_empty() {
        return TokenStream::new();
    }

    let auto_register_ = crate::path::auto_register_(dm_plan_path);
    let ident = &ast.ident;

    quote_spanned! { span =>
        #auto_register_::inventory::submit!{
            #auto_register_::__AutoRegisterFunc(
                <#ident as #auto_register_::__RegisterType>::__register
            )
        }
    }
}

#[cfg(not(feature = "auto_register"))]
fn get_auto_register_impl(_: &DeriveInput, _: &TypeAttributes, _: &syn::Path) -> TokenStream {
    TokenStream::new()
}
