//! Procedural macros for the docmodel project.
//!
//! `#[derive(Document)]` implements `docmodel::document::Document` for a payload struct and
//! generates a companion `{Name}Field` enum with one variant per serialized field. The enum is
//! what `Model::find_by` and `Model::find_many_by` accept, so only declared fields can be
//! queried.

#[allow(unused_extern_crates)]
extern crate self as docmodel_macros;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Fields, Ident, LitStr, Token, ext::IdentExt, parse_macro_input,
    spanned::Spanned,
};

const RESERVED_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// Derives `Document` and a `{Name}Field` enum for a struct with named fields.
///
/// Field names follow the struct's serde attributes: `#[serde(rename = "...")]` on a field and
/// `#[serde(rename_all = "...")]` on the struct. Fields marked `skip`, `skip_serializing` or
/// `flatten` get no variant.
///
/// Declaring a field that serializes as `id`, `createdAt` or `updatedAt` is a compile error;
/// those are managed by the model.
#[proc_macro_derive(Document, attributes(serde))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "Document can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "Document can only be derived for structs with named fields",
            ));
        }
    };

    let container = SerdeAttrs::parse(&input.attrs)?;
    let rule = match &container.rename_all {
        Some(lit) => Some(RenameRule::from_str(&lit.value()).ok_or_else(|| {
            syn::Error::new(lit.span(), format!("unknown rename_all rule `{}`", lit.value()))
        })?),
        None => None,
    };

    let mut variants = Vec::new();
    let mut names = Vec::new();

    for field in fields {
        let attrs = SerdeAttrs::parse(&field.attrs)?;
        if attrs.skip || attrs.flatten {
            continue;
        }

        let Some(ident) = &field.ident else {
            continue;
        };
        let rust_name = ident.unraw().to_string();
        let name = match (&attrs.rename, rule) {
            (Some(rename), _) => rename.value(),
            (None, Some(rule)) => rule.apply(&rust_name),
            (None, None) => rust_name.clone(),
        };

        if RESERVED_FIELDS.contains(&name.as_str()) {
            return Err(syn::Error::new(
                field.span(),
                format!("`{name}` is a reserved field and is managed by the model"),
            ));
        }

        variants.push(Ident::new(&RenameRule::PascalCase.apply(&rust_name), ident.span()));
        names.push(LitStr::new(&name, Span::call_site()));
    }

    let name = &input.ident;
    let vis = &input.vis;
    let field_enum = format_ident!("{}Field", name);
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name_body = if variants.is_empty() {
        quote! { match *self {} }
    } else {
        quote! {
            match self {
                #(Self::#variants => #names,)*
            }
        }
    };

    Ok(quote! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #vis enum #field_enum {
            #(#variants,)*
        }

        impl ::docmodel::document::DocumentField for #field_enum {
            fn name(&self) -> &'static str {
                #name_body
            }
        }

        impl #impl_generics ::docmodel::document::Document for #name #ty_generics #where_clause {
            type Field = #field_enum;
        }
    })
}

/// The subset of serde attributes that affects serialized field names.
#[derive(Default)]
struct SerdeAttrs {
    rename: Option<LitStr>,
    rename_all: Option<LitStr>,
    skip: bool,
    flatten: bool,
}

impl SerdeAttrs {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut parsed = Self::default();

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") || meta.path.is_ident("rename_all") {
                    let target = if meta.path.is_ident("rename") {
                        &mut parsed.rename
                    } else {
                        &mut parsed.rename_all
                    };

                    if meta.input.peek(Token![=]) {
                        *target = Some(meta.value()?.parse()?);
                    } else {
                        // rename(serialize = "...", deserialize = "...")
                        meta.parse_nested_meta(|inner| {
                            let value: LitStr = inner.value()?.parse()?;
                            if inner.path.is_ident("serialize") {
                                *target = Some(value);
                            }
                            Ok(())
                        })?;
                    }
                    return Ok(());
                }

                if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    parsed.skip = true;
                } else if meta.path.is_ident("flatten") {
                    parsed.flatten = true;
                }

                skip_meta_value(&meta)
            })?;
        }

        Ok(parsed)
    }
}

fn skip_meta_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<proc_macro2::TokenStream>()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    LowerCase,
    UpperCase,
    PascalCase,
    CamelCase,
    SnakeCase,
    ScreamingSnakeCase,
    KebabCase,
    ScreamingKebabCase,
}

impl RenameRule {
    fn from_str(rule: &str) -> Option<Self> {
        Some(match rule {
            "lowercase" => Self::LowerCase,
            "UPPERCASE" => Self::UpperCase,
            "PascalCase" => Self::PascalCase,
            "camelCase" => Self::CamelCase,
            "snake_case" => Self::SnakeCase,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnakeCase,
            "kebab-case" => Self::KebabCase,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebabCase,
            _ => return None,
        })
    }

    /// Applies the rule to a snake_case field name.
    fn apply(self, field: &str) -> String {
        match self {
            Self::LowerCase | Self::SnakeCase => field.to_string(),
            Self::UpperCase | Self::ScreamingSnakeCase => field.to_ascii_uppercase(),
            Self::PascalCase => field
                .split('_')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect(),
            Self::CamelCase => {
                let pascal = Self::PascalCase.apply(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
            Self::KebabCase => field.replace('_', "-"),
            Self::ScreamingKebabCase => field.replace('_', "-").to_ascii_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_rules_follow_serde() {
        let cases = [
            (RenameRule::LowerCase, "first_name"),
            (RenameRule::UpperCase, "FIRST_NAME"),
            (RenameRule::PascalCase, "FirstName"),
            (RenameRule::CamelCase, "firstName"),
            (RenameRule::SnakeCase, "first_name"),
            (RenameRule::ScreamingSnakeCase, "FIRST_NAME"),
            (RenameRule::KebabCase, "first-name"),
            (RenameRule::ScreamingKebabCase, "FIRST-NAME"),
        ];

        for (rule, expected) in cases {
            assert_eq!(rule.apply("first_name"), expected, "{rule:?}");
        }
    }

    #[test]
    fn unknown_rule_is_rejected() {
        assert_eq!(RenameRule::from_str("Train-Case"), None);
        assert_eq!(RenameRule::from_str("camelCase"), Some(RenameRule::CamelCase));
    }

    #[test]
    fn reserved_field_is_a_compile_error() {
        let input: DeriveInput = syn::parse_quote! {
            #[serde(rename_all = "camelCase")]
            struct Bad {
                created_at: String,
            }
        };

        let err = expand(input).unwrap_err();
        assert!(err.to_string().contains("createdAt"));
    }

    #[test]
    fn skipped_and_renamed_fields() {
        let input: DeriveInput = syn::parse_quote! {
            struct User {
                #[serde(rename = "mail")]
                email: String,
                #[serde(skip)]
                cache: u32,
                #[serde(default, skip_serializing_if = "Option::is_none")]
                nickname: Option<String>,
            }
        };

        let tokens = expand(input).unwrap().to_string();
        assert!(tokens.contains("Email"));
        assert!(tokens.contains("\"mail\""));
        assert!(tokens.contains("Nickname"));
        assert!(!tokens.contains("Cache"));
    }

    #[test]
    fn tuple_structs_are_rejected() {
        let input: DeriveInput = syn::parse_quote! {
            struct Wrapper(String);
        };

        assert!(expand(input).is_err());
    }
}
