//! Procedural macros for model_refactor
//!
//! This crate provides the `Model` derive macro, which describes a struct's
//! class name, table name and persisted fields to the model_refactor registry.
//!
//! ```ignore
//! #[derive(Model)]
//! #[model(class = "App\\Models\\Student", table = "students")]
//! pub struct Student {
//!     pub id: i64,
//!     #[column(name = "full_name", nullable, default = "\"\"")]
//!     pub name: Option<String>,
//!     #[column(skip)]
//!     pub cache: Vec<String>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitBool, LitStr};

/// Model-level settings from `#[model(...)]`
#[derive(Default)]
struct ModelArgs {
    class: Option<String>,
    table: Option<String>,
}

/// Field-level settings from `#[column(...)]`
#[derive(Default)]
struct ColumnArgs {
    name: Option<String>,
    ty: Option<String>,
    nullable: bool,
    default: Option<String>,
    skip: bool,
}

/// Derive macro implementing `model_refactor::models::Model`
#[proc_macro_derive(Model, attributes(model, column))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_model(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand_model(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let model_args = parse_model_args(input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Model only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Model only supports structs")),
    };

    let mut field_definitions = Vec::new();
    for field in fields {
        let column = parse_column_args(&field.attrs)?;
        if column.skip {
            continue;
        }

        let Some(ident) = &field.ident else { continue };
        let field_name = ident.to_string();
        let rust_type: String = field
            .ty
            .to_token_stream()
            .to_string()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let column_name = option_tokens(&column.name);
        let column_type = option_tokens(&column.ty);
        let default = option_tokens(&column.default);
        let nullable = column.nullable;

        field_definitions.push(quote! {
            ::model_refactor::models::FieldDefinition {
                name: #field_name.to_string(),
                column_name: #column_name,
                rust_type: #rust_type.to_string(),
                column_type: #column_type,
                nullable: #nullable,
                default: #default,
            }
        });
    }

    let class_name = match &model_args.class {
        Some(class) => quote! { #class.to_string() },
        None => {
            let struct_name = name.to_string();
            quote! { format!("{}::{}", module_path!(), #struct_name) }
        }
    };
    let table_name = option_tokens(&model_args.table);

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::model_refactor::models::Model for #name #ty_generics #where_clause {
            fn class_name() -> String {
                #class_name
            }

            fn table_name() -> Option<String> {
                #table_name
            }

            fn field_definitions() -> Vec<::model_refactor::models::FieldDefinition> {
                vec![#(#field_definitions),*]
            }
        }
    })
}

fn parse_model_args(input: &DeriveInput) -> syn::Result<ModelArgs> {
    let mut args = ModelArgs::default();

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("class") {
                args.class = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("table") {
                args.table = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("unsupported model attribute, expected `class` or `table`"));
            }
            Ok(())
        })?;
    }

    Ok(args)
}

fn parse_column_args(attrs: &[syn::Attribute]) -> syn::Result<ColumnArgs> {
    let mut args = ColumnArgs::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                args.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("ty") {
                args.ty = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                args.default = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("nullable") {
                args.nullable = if meta.input.peek(syn::Token![=]) {
                    meta.value()?.parse::<LitBool>()?.value()
                } else {
                    true
                };
            } else if meta.path.is_ident("skip") {
                args.skip = true;
            } else {
                return Err(meta.error(
                    "unsupported column attribute, expected `name`, `ty`, `nullable`, `default` or `skip`",
                ));
            }
            Ok(())
        })?;
    }

    Ok(args)
}

/// `Some("x".to_string())` or `None`
fn option_tokens(value: &Option<String>) -> TokenStream2 {
    match value {
        Some(value) => quote! { Some(#value.to_string()) },
        None => quote! { None },
    }
}
