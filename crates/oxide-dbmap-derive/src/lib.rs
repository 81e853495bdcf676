//! Derive macros for oxide-dbmap.
//!
//! `#[derive(Record)]` maps a struct to a table; `#[derive(Fields)]` makes a
//! struct embeddable in a record, contributing its fields as columns of the
//! outer table.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, LitStr, Meta, Type,
};

/// Derives `FieldAccess`, `Record` and an empty `Hooks` implementation.
///
/// # Attributes
///
/// - `#[table(name = "users")]` - Table name (defaults to the snake_case of
///   the struct name)
/// - `#[table(schema = "app")]` - Schema name
/// - `#[table(hooks)]` - Skip the empty `Hooks` impl; write your own
///
/// # Field Attributes
///
/// - `#[column(name = "user_name")]` - Column name (defaults to the field
///   name)
/// - `#[column(primary_key)]`, `#[column(autoincrement)]`
/// - `#[column(version)]` - Optimistic-lock version column
/// - `#[column(transient)]` - Never written by insert or update
/// - `#[column(unique)]`, `#[column(not_null)]`
/// - `#[column(size = 64)]` - Maximum text length
/// - `#[column(default = "0")]` - Raw SQL default expression
/// - `#[column(id_query = "select ...")]` - Query returning the generated key
/// - `#[column(embed)]` - Flatten the fields of a `#[derive(Fields)]` struct
/// - `#[column(skip)]` - Leave the field unmapped
#[proc_macro_derive(Record, attributes(table, column))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_impl(&input, true)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives `FieldAccess` for a struct embedded in records.
#[proc_macro_derive(Fields, attributes(column))]
pub fn derive_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_impl(&input, false)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_impl(input: &DeriveInput, record: bool) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "oxide-dbmap derives only support structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "oxide-dbmap derives only support structs",
            ));
        }
    };

    let mut mapped = Vec::new();
    let mut embedded = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let attrs = parse_column_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        if attrs.embed {
            embedded.push((ident, field.ty.clone()));
        } else {
            mapped.push(FieldInfo {
                name: ident.to_string().trim_start_matches("r#").to_string(),
                ident,
                ty: field.ty.clone(),
                attrs,
            });
        }
    }

    let defs: Vec<TokenStream2> = mapped.iter().map(field_def).collect();
    let embed_defs = embedded.iter().map(|(_, ty)| {
        quote! { defs.extend(<#ty as ::oxide_dbmap::FieldAccess>::field_defs()); }
    });

    let get_arms = mapped.iter().map(|f| {
        let (name, ident) = (&f.name, &f.ident);
        quote! {
            #name => ::oxide_dbmap::ToSqlValue::to_sql_value(&self.#ident)
                .map(::core::option::Option::Some),
        }
    });
    let embed_get_arms = embedded.iter().map(|(ident, ty)| {
        quote! {
            name if <#ty as ::oxide_dbmap::FieldAccess>::has_field(name) => {
                ::oxide_dbmap::FieldAccess::get_field(&self.#ident, name)
            }
        }
    });

    let set_arms = mapped.iter().map(|f| {
        let (name, ident, ty) = (&f.name, &f.ident, &f.ty);
        quote! {
            #name => {
                self.#ident = <#ty as ::oxide_dbmap::FromSqlValue>::from_sql_value(value)?;
                ::core::result::Result::Ok(true)
            }
        }
    });
    let embed_set_arms = embedded.iter().map(|(ident, ty)| {
        quote! {
            name if <#ty as ::oxide_dbmap::FieldAccess>::has_field(name) => {
                ::oxide_dbmap::FieldAccess::set_field(&mut self.#ident, name, value)
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let field_access = quote! {
        impl #impl_generics ::oxide_dbmap::FieldAccess for #struct_name #ty_generics #where_clause {
            fn field_defs() -> ::std::vec::Vec<::oxide_dbmap::FieldDef> {
                #[allow(unused_mut)]
                let mut defs = ::std::vec![#(#defs),*];
                #(#embed_defs)*
                defs
            }

            fn get_field(
                &self,
                name: &str,
            ) -> ::core::result::Result<
                ::core::option::Option<::oxide_dbmap::SqlValue>,
                ::oxide_dbmap::ConversionError,
            > {
                match name {
                    #(#get_arms)*
                    #(#embed_get_arms)*
                    _ => ::core::result::Result::Ok(::core::option::Option::None),
                }
            }

            fn set_field(
                &mut self,
                name: &str,
                value: ::oxide_dbmap::SqlValue,
            ) -> ::core::result::Result<bool, ::oxide_dbmap::ConversionError> {
                match name {
                    #(#set_arms)*
                    #(#embed_set_arms)*
                    _ => ::core::result::Result::Ok(false),
                }
            }
        }
    };

    if !record {
        return Ok(field_access);
    }

    let table = parse_table_attrs(&input.attrs, struct_name)?;
    let table_name = &table.name;
    let schema = match &table.schema {
        Some(schema) => quote! { ::core::option::Option::Some(#schema) },
        None => quote! { ::core::option::Option::None },
    };
    let hooks = if table.hooks {
        quote! {}
    } else {
        quote! {
            impl #impl_generics ::oxide_dbmap::Hooks for #struct_name #ty_generics #where_clause {}
        }
    };

    Ok(quote! {
        #field_access

        impl #impl_generics ::oxide_dbmap::Record for #struct_name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table_name;
            const SCHEMA_NAME: ::core::option::Option<&'static str> = #schema;
        }

        #hooks
    })
}

struct FieldInfo {
    name: String,
    ident: Ident,
    ty: Type,
    attrs: ColumnAttrs,
}

#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    primary_key: bool,
    autoincrement: bool,
    version: bool,
    transient: bool,
    unique: bool,
    not_null: bool,
    size: Option<usize>,
    default_expr: Option<String>,
    id_query: Option<String>,
    embed: bool,
    skip: bool,
}

struct TableAttrs {
    name: String,
    schema: Option<String>,
    hooks: bool,
}

fn field_def(info: &FieldInfo) -> TokenStream2 {
    let name = &info.name;
    let ty = &info.ty;
    let attrs = &info.attrs;
    let mut def = quote! {
        ::oxide_dbmap::FieldDef::new(#name, <#ty as ::oxide_dbmap::SqlType>::value_type())
    };
    if let Some(column) = &attrs.name {
        def = quote! { #def.column(#column) };
    }
    let flags = [
        (attrs.primary_key, quote! { primary_key }),
        (attrs.autoincrement, quote! { auto_increment }),
        (attrs.version, quote! { version }),
        (attrs.transient, quote! { transient }),
        (attrs.unique, quote! { unique }),
        (attrs.not_null, quote! { not_null }),
    ];
    for (set, method) in flags {
        if set {
            def = quote! { #def.#method() };
        }
    }
    if let Some(size) = attrs.size {
        def = quote! { #def.max_size(#size) };
    }
    if let Some(default) = &attrs.default_expr {
        def = quote! { #def.default_value(#default) };
    }
    if let Some(query) = &attrs.id_query {
        def = quote! { #def.generated_id_query(#query) };
    }
    def
}

fn string_value(expr: Expr) -> Option<String> {
    if let Expr::Lit(lit) = expr {
        if let Lit::Str(s) = lit.lit {
            return Some(s.value());
        }
    }
    None
}

fn parse_table_attrs(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<TableAttrs> {
    let mut table = TableAttrs {
        name: to_snake_case(&struct_name.to_string()),
        schema: None,
        hooks: false,
    };
    for attr in attrs {
        if attr.path().is_ident("table") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    table.name = value.value();
                } else if meta.path.is_ident("schema") {
                    let value: LitStr = meta.value()?.parse()?;
                    table.schema = Some(value.value()).filter(|s| !s.is_empty());
                } else if meta.path.is_ident("hooks") {
                    table.hooks = true;
                } else {
                    return Err(meta.error("unknown table attribute"));
                }
                Ok(())
            })?;
        }
    }
    Ok(table)
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs {
        if attr.path().is_ident("column") {
            // Handle empty attribute like #[column]
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    result.primary_key = true;
                } else if meta.path.is_ident("autoincrement") {
                    result.autoincrement = true;
                } else if meta.path.is_ident("version") {
                    result.version = true;
                } else if meta.path.is_ident("transient") {
                    result.transient = true;
                } else if meta.path.is_ident("unique") {
                    result.unique = true;
                } else if meta.path.is_ident("not_null") {
                    result.not_null = true;
                } else if meta.path.is_ident("embed") {
                    result.embed = true;
                } else if meta.path.is_ident("skip") {
                    result.skip = true;
                } else if meta.path.is_ident("size") {
                    let value: syn::LitInt = meta.value()?.parse()?;
                    result.size = Some(value.base10_parse()?);
                } else if meta.path.is_ident("name") {
                    result.name = string_value(meta.value()?.parse()?);
                } else if meta.path.is_ident("default") {
                    result.default_expr = string_value(meta.value()?.parse()?);
                } else if meta.path.is_ident("id_query") {
                    result.id_query = string_value(meta.value()?.parse()?);
                } else {
                    return Err(meta.error("unknown column attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(result)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("InvoiceLine"), "invoice_line");
    }

    #[test]
    fn test_column_attrs() {
        let field: syn::Field = syn::parse_quote! {
            #[column(name = "user_name", unique, size = 64, default = "'x'")]
            name: String
        };
        let attrs = parse_column_attrs(&field.attrs).unwrap();
        assert_eq!(attrs.name.as_deref(), Some("user_name"));
        assert!(attrs.unique);
        assert_eq!(attrs.size, Some(64));
        assert_eq!(attrs.default_expr.as_deref(), Some("'x'"));
    }

    #[test]
    fn test_unknown_column_attr_rejected() {
        let field: syn::Field = syn::parse_quote! {
            #[column(nullable)]
            name: String
        };
        assert!(parse_column_attrs(&field.attrs).is_err());
    }

    #[test]
    fn test_table_attrs() {
        let input: DeriveInput = syn::parse_quote! {
            #[table(name = "people", schema = "app", hooks)]
            struct Person { id: i64 }
        };
        let table = parse_table_attrs(&input.attrs, &input.ident).unwrap();
        assert_eq!(table.name, "people");
        assert_eq!(table.schema.as_deref(), Some("app"));
        assert!(table.hooks);
    }
}
