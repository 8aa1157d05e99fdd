//! Derive macro for typed table definitions.
//!
//! This crate provides the `#[derive(Table)]` macro, which turns a row
//! struct into an `oxide_schema::Table` plus one typed column handle per
//! field.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, Meta, Type};

/// Derives a table definition for a row struct.
///
/// # Attributes
///
/// - `#[table(name = "TableName")]` - Specifies the SQL table name (optional,
///   defaults to the snake_case struct name)
///
/// # Field Attributes
///
/// - `#[column(name = "ColumnName")]` - Specifies the SQL column name
///   (optional, defaults to the field name)
/// - `#[column(primary_key)]` - `PRIMARY KEY`
/// - `#[column(desc)]` - `PRIMARY KEY DESC`
/// - `#[column(autoincrement)]` - `PRIMARY KEY AUTOINCREMENT`
/// - `#[column(unique)]` - `UNIQUE`
/// - `#[column(collate = "NOCASE")]` - `COLLATE <name>`
/// - `#[column(default = "expr")]` - Sets a raw SQL default expression
/// - `#[column(index)]` / `#[column(unique_index)]` - Creates an index on
///   the column
///
/// Column codecs come from `HasPersistentType` on the field type.
///
/// # Generated Items
///
/// For a struct `Artist`, this macro generates:
///
/// - `ArtistTable` - holds the built `Table` and a public `Column<T>` per
///   field, with `ArtistTable::new()` and `ArtistTable::read(&cursor)`
/// - `Artist::table()` - shorthand for `ArtistTable::new()`
#[proc_macro_derive(Table, attributes(table, column))]
pub fn derive_table(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_table_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_table_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let vis = &input.vis;
    let table_name = get_table_name(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Table derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Table derive only supports structs",
            ));
        }
    };

    let mut column_infos: Vec<ColumnInfo> = Vec::new();
    for field in fields {
        let field_name = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let attrs = parse_column_attrs(&field.attrs)?;
        column_infos.push(ColumnInfo {
            column_name: attrs.name.clone().unwrap_or_else(|| field_name.to_string()),
            field_name,
            field_type: field.ty.clone(),
            attrs,
        });
    }

    let table_struct_name = format_ident!("{}Table", struct_name);

    let column_fields: Vec<TokenStream2> = column_infos
        .iter()
        .map(|info| {
            let field_name = &info.field_name;
            let field_type = &info.field_type;
            let doc = format!("The `{}` column.", info.column_name);
            quote! {
                #[doc = #doc]
                pub #field_name: ::oxide_schema::Column<#field_type>
            }
        })
        .collect();

    let column_declarations: Vec<TokenStream2> = column_infos
        .iter()
        .map(|info| {
            let field_name = &info.field_name;
            let field_type = &info.field_type;
            let column_name = &info.column_name;
            let constraints = info.attrs.constraint_calls();
            quote! {
                let #field_name = builder.typed::<#field_type, _>(#column_name, |c| c #(#constraints)*)?;
            }
        })
        .collect();

    let field_names: Vec<&Ident> = column_infos.iter().map(|c| &c.field_name).collect();

    let table_doc = format!("Table definition and typed columns for `{struct_name}`.");
    let read_doc = format!("Decodes the current row into a `{struct_name}`.");

    let expanded = quote! {
        #[doc = #table_doc]
        #[derive(Debug, Clone)]
        #vis struct #table_struct_name {
            /// The table definition.
            pub table: ::oxide_schema::Table,
            #(#column_fields),*
        }

        impl #table_struct_name {
            /// The SQL table name.
            pub const NAME: &'static str = #table_name;

            /// Builds the table definition.
            ///
            /// # Errors
            ///
            /// Returns the first constraint misuse found.
            pub fn new() -> ::std::result::Result<Self, ::oxide_schema::ConstructionError> {
                let mut builder = ::oxide_schema::Table::builder(Self::NAME);
                #(#column_declarations)*
                let table = builder.build()?;
                Ok(Self {
                    table,
                    #(#field_names),*
                })
            }

            #[doc = #read_doc]
            ///
            /// # Errors
            ///
            /// Returns the first column that fails to decode.
            pub fn read(
                &self,
                cursor: &::oxide_schema::Cursor<'_>,
            ) -> ::std::result::Result<#struct_name, ::oxide_schema::TypeError> {
                Ok(#struct_name {
                    #(#field_names: cursor.get(&self.#field_names)?),*
                })
            }
        }

        impl #struct_name {
            /// Builds the table definition for this row type.
            ///
            /// # Errors
            ///
            /// Same as the generated table type's `new`.
            pub fn table() -> ::std::result::Result<#table_struct_name, ::oxide_schema::ConstructionError> {
                #table_struct_name::new()
            }
        }
    };

    Ok(expanded)
}

struct ColumnInfo {
    field_name: Ident,
    field_type: Type,
    column_name: String,
    attrs: ColumnAttrs,
}

#[derive(Default)]
#[allow(clippy::struct_excessive_bools)]
struct ColumnAttrs {
    name: Option<String>,
    primary_key: bool,
    desc: bool,
    autoincrement: bool,
    unique: bool,
    collate: Option<String>,
    default_expr: Option<String>,
    index: bool,
    unique_index: bool,
}

impl ColumnAttrs {
    /// Builder calls applied to the column, in DDL order.
    fn constraint_calls(&self) -> Vec<TokenStream2> {
        let mut calls = Vec::new();
        if self.primary_key {
            calls.push(quote!(.primary_key()));
        }
        if self.desc {
            calls.push(quote!(.desc()));
        }
        if self.autoincrement {
            calls.push(quote!(.auto_increment()));
        }
        if self.unique {
            calls.push(quote!(.unique()));
        }
        if let Some(collate) = &self.collate {
            calls.push(quote!(.collate(::oxide_schema::Collate::from_name(#collate))));
        }
        if let Some(default) = &self.default_expr {
            calls.push(quote!(.default_raw(#default)));
        }
        if self.unique_index {
            calls.push(quote!(.unique_index()));
        } else if self.index {
            calls.push(quote!(.index()));
        }
        calls
    }
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<String> {
    let value: Expr = meta.value()?.parse()?;
    if let Expr::Lit(lit) = &value {
        if let Lit::Str(s) = &lit.lit {
            return Ok(s.value());
        }
    }
    Err(syn::Error::new_spanned(value, "expected a string literal"))
}

fn get_table_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("table") {
            let mut table_name = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    table_name = Some(string_value(&meta)?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported table attribute"))
                }
            })?;
            if let Some(name) = table_name {
                return Ok(name);
            }
        }
    }
    // Default to snake_case of struct name
    Ok(to_snake_case(&struct_name.to_string()))
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
                } else if meta.path.is_ident("desc") {
                    result.desc = true;
                } else if meta.path.is_ident("autoincrement") {
                    result.autoincrement = true;
                } else if meta.path.is_ident("unique") {
                    result.unique = true;
                } else if meta.path.is_ident("index") {
                    result.index = true;
                } else if meta.path.is_ident("unique_index") {
                    result.unique_index = true;
                } else if meta.path.is_ident("name") {
                    result.name = Some(string_value(&meta)?);
                } else if meta.path.is_ident("collate") {
                    result.collate = Some(string_value(&meta)?);
                } else if meta.path.is_ident("default") {
                    result.default_expr = Some(string_value(&meta)?);
                } else {
                    return Err(meta.error("unsupported column attribute"));
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
