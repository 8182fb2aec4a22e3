use std::collections::HashSet;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input, spanned::Spanned};

/// Generates `trelnex_data::item::Item` for a struct with named fields.
///
/// ```ignore
/// #[derive(Clone, Default, TrackedItem)]
/// #[item(type_name = "customer")]
/// struct Customer {
///     #[item(base)]
///     base: BaseItem,
///     display_name: String,            // stored as "displayName"
///     #[item(name = "mail")]
///     email: Option<String>,           // stored as "mail"
///     #[item(untracked)]
///     login_count: i64,                // not recorded in save events
/// }
/// ```
#[proc_macro_derive(TrackedItem, attributes(item))]
pub fn derive_tracked_item(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_tracked_item(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Rust and external names of the `BaseItem` fields; domain fields may not reuse them.
const BASE_FIELD_NAMES: &[(&str, &str)] = &[
    ("id", "id"),
    ("partition_key", "partitionKey"),
    ("type_name", "typeName"),
    ("version", "version"),
    ("etag", "_etag"),
    ("created_date_time", "createdDateTime"),
    ("updated_date_time", "updatedDateTime"),
    ("deleted_date_time", "deletedDateTime"),
    ("is_deleted", "isDeleted"),
];

fn is_base_field_name(name: &str) -> bool {
    BASE_FIELD_NAMES
        .iter()
        .any(|(rust_name, external_name)| *rust_name == name || *external_name == name)
}

#[derive(Default)]
struct ItemFieldOptions {
    base: bool,
    untracked: bool,
    external_name: Option<String>,
}

struct DomainField {
    ident: Ident,
    ty: Type,
    name: String,
    external_name: String,
    tracked: bool,
}

fn expand_tracked_item(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "TrackedItem does not support generic structs",
        ));
    }

    let type_name = match parse_type_name(&input.attrs)? {
        Some(lit) => {
            check_type_name(&lit.value()).map_err(|message| syn::Error::new(lit.span(), message))?;
            lit.value()
        }
        None => {
            let derived = to_kebab_case(&struct_name.to_string());
            check_type_name(&derived)
                .map_err(|message| syn::Error::new(struct_name.span(), message))?;
            derived
        }
    };

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "TrackedItem can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "TrackedItem requires named fields",
            ));
        }
    };

    let mut base_field: Option<Ident> = None;
    let mut domain_fields = Vec::<DomainField>::new();
    let mut external_names = HashSet::<String>::new();

    for field in named_fields.named {
        let span = field.span();
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(span, "TrackedItem requires named fields"))?;
        let options = parse_item_field_options(&field.attrs)?;

        if options.base {
            if base_field.is_some() {
                return Err(syn::Error::new(span, "Only one field may be #[item(base)]"));
            }
            base_field = Some(ident);
            continue;
        }

        let name = ident.to_string().trim_start_matches("r#").to_string();
        let external_name = options
            .external_name
            .unwrap_or_else(|| to_camel_case(&name));

        if is_base_field_name(&name) {
            return Err(syn::Error::new(
                span,
                format!("field '{}' collides with a BaseItem field", name),
            ));
        }
        if is_base_field_name(&external_name) {
            return Err(syn::Error::new(
                span,
                format!(
                    "external name '{}' of field '{}' collides with a BaseItem field",
                    external_name, name
                ),
            ));
        }
        if !external_names.insert(external_name.clone()) {
            return Err(syn::Error::new(
                span,
                format!(
                    "external name '{}' of field '{}' is already used by another field",
                    external_name, name
                ),
            ));
        }

        domain_fields.push(DomainField {
            ident,
            ty: field.ty,
            name,
            external_name,
            tracked: !options.untracked,
        });
    }

    let base_field = base_field.ok_or_else(|| {
        syn::Error::new(
            struct_name.span(),
            "TrackedItem requires one field marked #[item(base)] of type BaseItem",
        )
    })?;

    let descriptors = domain_fields.iter().map(|field| {
        let DomainField {
            ty,
            name,
            external_name,
            tracked,
            ..
        } = field;
        quote! {
            ::trelnex_data::item::FieldDescriptor::new(
                #name,
                #external_name,
                <#ty as ::trelnex_data::core::FieldValue>::KIND,
            )
            .nullable(<#ty as ::trelnex_data::core::FieldValue>::NULLABLE)
            .tracked(#tracked)
        }
    });

    let getters = domain_fields.iter().map(|field| {
        let DomainField { ident, name, .. } = field;
        quote! {
            #name => Some(::trelnex_data::core::FieldValue::to_value(&self.#ident)),
        }
    });

    let setters = domain_fields.iter().map(|field| {
        let DomainField { ident, ty, name, .. } = field;
        quote! {
            #name => {
                self.#ident = <#ty as ::trelnex_data::core::FieldValue>::from_value(value)?;
                Ok(true)
            }
        }
    });

    Ok(quote! {
        impl ::trelnex_data::item::Item for #struct_name {
            const TYPE_NAME: &'static str = #type_name;

            fn base(&self) -> &::trelnex_data::item::BaseItem {
                &self.#base_field
            }

            fn base_mut(&mut self) -> &mut ::trelnex_data::item::BaseItem {
                &mut self.#base_field
            }

            fn fields() -> &'static [::trelnex_data::item::FieldDescriptor] {
                const FIELDS: &[::trelnex_data::item::FieldDescriptor] = &[
                    #(#descriptors),*
                ];
                FIELDS
            }

            fn get_domain_field(&self, name: &str) -> Option<::trelnex_data::core::Value> {
                match name {
                    #(#getters)*
                    _ => None,
                }
            }

            fn set_domain_field(
                &mut self,
                name: &str,
                value: ::trelnex_data::core::Value,
            ) -> ::trelnex_data::core::Result<bool> {
                match name {
                    #(#setters)*
                    _ => {
                        let _ = value;
                        Ok(false)
                    }
                }
            }
        }
    })
}

fn parse_item_field_options(attrs: &[syn::Attribute]) -> syn::Result<ItemFieldOptions> {
    let mut options = ItemFieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("item") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("base") {
                options.base = true;
                return Ok(());
            }

            if meta.path.is_ident("untracked") {
                options.untracked = true;
                return Ok(());
            }

            if meta.path.is_ident("name") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                if lit.value().is_empty() {
                    return Err(syn::Error::new(lit.span(), "#[item(name)] must not be empty"));
                }
                options.external_name = Some(lit.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[item(...)] option. Supported: base, untracked, name = \"...\"",
            ))
        })?;
    }

    if options.base && (options.untracked || options.external_name.is_some()) {
        return Err(syn::Error::new(
            attrs
                .iter()
                .find(|attr| attr.path().is_ident("item"))
                .map(|attr| attr.span())
                .unwrap_or_else(proc_macro2::Span::call_site),
            "#[item(base)] cannot be combined with other options",
        ));
    }

    Ok(options)
}

fn parse_type_name(attrs: &[syn::Attribute]) -> syn::Result<Option<LitStr>> {
    let mut type_name = None;

    for attr in attrs {
        if !attr.path().is_ident("item") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_name") {
                let value = meta.value()?;
                type_name = Some(value.parse::<LitStr>()?);
                return Ok(());
            }

            Err(meta.error("Unsupported item attribute. Supported: type_name = \"...\""))
        })?;
    }

    Ok(type_name)
}

/// Mirrors `trelnex_data::provider::validate_type_name`.
fn check_type_name(type_name: &str) -> Result<(), String> {
    let starts_with_letter = type_name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase());
    let allowed = type_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !starts_with_letter || !allowed {
        return Err(format!(
            "type name '{}' must start with a lowercase letter and contain only lowercase letters, digits and '-'",
            type_name
        ));
    }
    if type_name == "event" {
        return Err("type name 'event' is reserved".to_string());
    }
    Ok(())
}

fn to_camel_case(value: &str) -> String {
    let mut out = String::new();
    for (i, chunk) in value.split('_').filter(|part| !part.is_empty()).enumerate() {
        let mut chars = chunk.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() {
        value.to_string()
    } else {
        out
    }
}

fn to_kebab_case(value: &str) -> String {
    let mut out = String::new();
    for (i, c) in value.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '_' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}
