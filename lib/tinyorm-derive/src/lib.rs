use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Lit, parse_macro_input};

/// Table-level options from `#[table(...)]`.
#[derive(Default)]
struct TableAttrs {
    name: Option<String>,
    default: bool,
    before_insert: Vec<syn::Path>,
    before_update: Vec<syn::Path>,
}

/// Column options from `#[column(...)]`.
#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    skip: bool,
    json: bool,
    csv: bool,
    set: bool,
    inflate: Vec<syn::Path>,
    deflate: Vec<syn::Path>,
}

/// Check if a field has a specific attribute
fn has_attr(field: &syn::Field, attr_name: &str) -> bool {
    field
        .attrs
        .iter()
        .any(|attr| attr.path().is_ident(attr_name))
}

fn parse_str(meta: &syn::meta::ParseNestedMeta) -> syn::Result<syn::LitStr> {
    meta.input.parse::<syn::Token![=]>()?;
    match meta.input.parse::<Lit>()? {
        Lit::Str(s) => Ok(s),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

fn parse_path(meta: &syn::meta::ParseNestedMeta) -> syn::Result<syn::Path> {
    parse_str(meta)?.parse()
}

/// Parse `#[table(name = "...", default, before_insert = "...", before_update = "...")]`
fn parse_table_attrs(input: &DeriveInput) -> syn::Result<TableAttrs> {
    let mut attrs = TableAttrs::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("table") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                attrs.name = Some(parse_str(&meta)?.value());
            } else if meta.path.is_ident("default") {
                attrs.default = true;
            } else if meta.path.is_ident("before_insert") {
                attrs.before_insert.push(parse_path(&meta)?);
            } else if meta.path.is_ident("before_update") {
                attrs.before_update.push(parse_path(&meta)?);
            } else {
                return Err(meta.error("unknown table option"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

/// Parse every `#[column(...)]` on a field
fn parse_column_attrs(field: &syn::Field) -> syn::Result<ColumnAttrs> {
    let mut attrs = ColumnAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                attrs.name = Some(parse_str(&meta)?.value());
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else if meta.path.is_ident("json") {
                attrs.json = true;
            } else if meta.path.is_ident("csv") {
                attrs.csv = true;
            } else if meta.path.is_ident("set") {
                attrs.set = true;
            } else if meta.path.is_ident("inflate") {
                attrs.inflate.push(parse_path(&meta)?);
            } else if meta.path.is_ident("deflate") {
                attrs.deflate.push(parse_path(&meta)?);
            } else {
                return Err(meta.error("unknown column option"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

/// Derive macro for the Entity trait
///
/// Generates `Entity::describe` from the struct's fields: every named field
/// becomes a column unless skipped.
///
/// ## Struct attributes
///
/// - `#[table(name = "...")]` - Table name (required; without it the type
///   fails with a configuration error on first use)
/// - `#[table(default)]` - Build rows from `Default::default()` and assign
///   each column, instead of constructing the struct from all columns at once
/// - `#[table(before_insert = "path")]`, `#[table(before_update = "path")]` -
///   Hooks with signature `fn(&mut Assignments<'_, Self>) -> Result<(), OrmError>`
///
/// ## Field attributes
///
/// - `#[pk]` - Part of the primary key
/// - `#[created_at]` - Stamped with the current time on insert
/// - `#[updated_at]` - Stamped with the current time on insert and update
/// - `#[extra]` - The `ExtraColumns` store for undeclared result columns
/// - `#[column(name = "...")]` - Column name, defaults to the field name
/// - `#[column(skip)]` - Not a column; gets `Default::default()` on read
/// - `#[column(json)]`, `#[column(csv)]`, `#[column(set)]` - Encodings
/// - `#[column(inflate = "path")]`, `#[column(deflate = "path")]` - Replace
///   the column's transform chain with a `fn(Value) -> Result<Value, ValueError>`
///
/// ## Example
///
/// ```text
/// #[derive(Entity)]
/// #[table(name = "member")]
/// struct Member {
///     #[pk]
///     pub id: i64,
///     pub name: String,
///     #[created_at]
///     pub created_at: Option<NaiveDateTime>,
///     #[extra]
///     pub extra: ExtraColumns,
/// }
/// ```
#[proc_macro_derive(
    Entity,
    attributes(table, pk, column, created_at, updated_at, extra)
)]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_entity(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let table = parse_table_attrs(input)?;

    let mut declarations = Vec::new();
    let mut constructor_fields = Vec::new();
    let mut extra_field = None;

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let ty = &field.ty;
        let attrs = parse_column_attrs(field)?;

        if has_attr(field, "extra") {
            if extra_field.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one #[extra] field is allowed",
                ));
            }
            extra_field = Some(ident);
            constructor_fields.push(quote! { #ident: ::core::default::Default::default() });
            continue;
        }

        if attrs.skip {
            constructor_fields.push(quote! { #ident: ::core::default::Default::default() });
            continue;
        }

        let field_name = ident.to_string();
        let column_name = attrs.name.clone().unwrap_or_else(|| field_name.clone());

        let mut modifiers = Vec::new();
        if attrs.name.is_some() {
            modifiers.push(quote! { .rename(#column_name) });
        }
        if has_attr(field, "pk") {
            modifiers.push(quote! { .primary_key() });
        }
        if has_attr(field, "created_at") {
            modifiers.push(quote! { .created_at() });
        }
        if has_attr(field, "updated_at") {
            modifiers.push(quote! { .updated_at() });
        }
        if attrs.json {
            modifiers.push(quote! { .json() });
        }
        if attrs.csv {
            modifiers.push(quote! { .csv() });
        }
        if attrs.set {
            modifiers.push(quote! { .string_set() });
        }
        // Repeats are passed through; the table build rejects them.
        for path in &attrs.inflate {
            modifiers.push(quote! { .inflate(#path) });
        }
        for path in &attrs.deflate {
            modifiers.push(quote! { .deflate(#path) });
        }

        declarations.push(quote! {
            table
                .column::<#ty, _, _>(
                    #field_name,
                    |row: &Self| &row.#ident,
                    |row: &mut Self| &mut row.#ident,
                )
                #(#modifiers)*;
        });
        constructor_fields.push(quote! { #ident: args.take(#column_name)? });
    }

    let table_name = table.name.as_ref().map(|n| quote! { table.name(#n); });

    let extra = extra_field.map(|ident| {
        quote! { table.extra_columns(|row: &mut Self| &mut row.#ident); }
    });

    let before_insert = &table.before_insert;
    let before_update = &table.before_update;

    let strategy = if table.default {
        quote! { table.default_constructor(); }
    } else {
        quote! {
            table.constructor(|args: &mut ::tinyorm::RowArgs| {
                ::core::result::Result::Ok(Self {
                    #(#constructor_fields,)*
                })
            });
        }
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::tinyorm::Entity for #name #ty_generics #where_clause {
            fn describe(table: &mut ::tinyorm::TableBuilder<Self>) {
                #table_name
                #(#declarations)*
                #extra
                #(table.before_insert(#before_insert);)*
                #(table.before_update(#before_update);)*
                #strategy
            }
        }
    })
}
