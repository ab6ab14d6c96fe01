//! Implementation of #[derive(FromContext)] proc-macro.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, DeriveInput, Field};

use crate::fields::named_fields;

pub fn derive_from_context_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let context_type = parse_context_type(&input.attrs)?;
    let fields = named_fields(input, "FromContext")?;

    let mut field_inits = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_type = &field.ty;

        let init = if is_default(field)? {
            quote! { #field_name: ::core::default::Default::default() }
        } else {
            quote! { #field_name: <#field_type as crate::FromRef<#context_type>>::from_ref(ctx) }
        };
        field_inits.push(init);
    }

    Ok(quote! {
        impl #impl_generics crate::FromRef<#context_type> for #name #ty_generics #where_clause {
            fn from_ref(ctx: &#context_type) -> Self {
                Self {
                    #(#field_inits),*
                }
            }
        }
    })
}

/// `#[from_context(Context = "MyContext")]` on the struct; defaults to `Context`.
fn parse_context_type(attrs: &[Attribute]) -> syn::Result<proc_macro2::TokenStream> {
    let mut context_ty: Option<syn::Type> = None;

    for attr in attrs.iter().filter(|a| a.path().is_ident("from_context")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("Context") {
                let value: syn::LitStr = meta.value()?.parse()?;
                context_ty = Some(value.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `Context = \"...\"`"))
            }
        })?;
    }

    Ok(match context_ty {
        Some(ty) => quote! { #ty },
        None => quote! { Context },
    })
}

/// `#[from_context(default)]` on a field: initialise with `Default::default()`.
fn is_default(field: &Field) -> syn::Result<bool> {
    let mut default = false;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("from_context")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = true;
                Ok(())
            } else {
                Err(meta.error("expected `default`"))
            }
        })?;
    }
    Ok(default)
}
