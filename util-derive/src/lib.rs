extern crate proc_macro2;

use proc_macro::TokenStream;
use quote::quote;

fn get_enum_variants(
    input: &syn::DeriveInput,
) -> &syn::punctuated::Punctuated<syn::Variant, syn::token::Comma> {
    let variants = match &input.data {
        syn::Data::Enum(enum_item) => &enum_item.variants,
        _ => panic!("Input must be an enum."),
    };

    assert!(
        variants.iter().all(|v| v.fields.is_empty()),
        "All variants must have no fields."
    );

    variants
}

/// Derives `util::EnumVariantNames`, returning the lowercase variant name.
/// This is the spelling used in assembly source (`$sp`, `nop`, ...).
#[proc_macro_derive(EnumVariantNames)]
pub fn enum_variant_names_derive(input: TokenStream) -> TokenStream {
    let syn_item: syn::DeriveInput = syn::parse(input).unwrap();
    let name = &syn_item.ident;
    let variants = get_enum_variants(&syn_item);

    let arms = variants.iter().map(|v| {
        let ident = &v.ident;
        let lower = ident.to_string().to_lowercase();
        quote! { #name::#ident => #lower, }
    });

    let expanded = quote! {
        impl ::util::EnumVariantNames for #name {
            fn variant_name(&self) -> &'static str {
                match self {
                    #( #arms )*
                }
            }
        }
    };
    expanded.into()
}

/// Derives `util::EnumFromStr` matching variant names case-insensitively,
/// plus a forwarding `core::str::FromStr` impl.
#[proc_macro_derive(EnumFromStr)]
pub fn enum_from_str_derive(input: TokenStream) -> TokenStream {
    let syn_item: syn::DeriveInput = syn::parse(input).unwrap();
    let name = &syn_item.ident;
    let name_str = name.to_string();
    let variants = get_enum_variants(&syn_item);
    let literals = variants.iter().map(|v| v.ident.to_string().to_lowercase());
    let identifiers = variants.iter().map(|v| &v.ident);

    let expanded = quote! {
        impl ::util::EnumFromStr for #name {
            fn from_str(s: &str) -> Result<#name, ::util::ParseEnumError> {
                match s.to_lowercase().as_str() {
                    #( #literals => Ok(#name::#identifiers), )*
                    _ => Err(::util::ParseEnumError {
                        value: s.to_string(),
                        enum_name: #name_str,
                    }),
                }
            }
        }

        impl ::core::str::FromStr for #name {
            type Err = ::util::ParseEnumError;

            fn from_str(s: &str) -> Result<#name, ::util::ParseEnumError> {
                <#name as ::util::EnumFromStr>::from_str(s)
            }
        }
    };

    expanded.into()
}
