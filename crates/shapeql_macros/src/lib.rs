//! Procedural macros for shapeql.
//!
//! Derives the field-tree descriptors that drive both query synthesis and
//! response decoding.
//!
//! # Example
//!
//! ```ignore
//! use shapeql_core::GraphQL;
//!
//! #[derive(Default, GraphQL)]
//! struct HeroQuery {
//!     #[graphql(args = "episode: $episode")]
//!     hero: Hero,
//! }
//!
//! #[derive(Default, GraphQL)]
//! struct Hero {
//!     name: String,
//!     #[graphql(alias = "buddies", name = "friends")]
//!     friends: Vec<Friend>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::{Literal, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DataStruct, DeriveInput, Field, Fields, LitStr,
};

/// Derives `FieldType` plus `Selection` (structs) or `Polymorphic` (enums).
///
/// Field attributes: `name`, `alias`, `args`, `non_null`, `skip`.
/// Container attributes: `name`, and `discriminator` on enums.
/// Variant attributes: `on`.
///
/// Enum variants are newtypes over a `GraphQL` struct, one per concrete type.
/// Unit variants are not selected; put the `#[default]` fallback there.
///
/// ```ignore
/// #[derive(Default, GraphQL)]
/// enum Character {
///     #[default]
///     Unknown,
///     Human(HumanFields),
///     #[graphql(on = "Droid")]
///     Robot(DroidFields),
/// }
/// ```
#[proc_macro_derive(GraphQL, attributes(graphql))]
pub fn derive_graphql(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = match &input.data {
        Data::Struct(data) => expand_object(&input, data),
        Data::Enum(data) => expand_polymorphic(&input, data),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &input.ident,
            "`GraphQL` cannot be derived for unions",
        )),
    };

    expanded.unwrap_or_else(syn::Error::into_compile_error).into()
}

/// Derives a custom scalar or GraphQL enum decoded and encoded through serde.
///
/// # Example
///
/// ```ignore
/// #[derive(Default, Serialize, Deserialize, GraphQLScalar)]
/// #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// enum Episode {
///     #[default]
///     NewHope,
///     Empire,
///     Jedi,
/// }
/// ```
#[proc_macro_derive(GraphQLScalar, attributes(graphql))]
pub fn derive_graphql_scalar(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_scalar(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives `InputValue` for a serializable input object.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, InputObject)]
/// #[graphql(name = "ReviewInput")]
/// struct Review {
///     stars: i32,
/// }
/// ```
#[proc_macro_derive(InputObject, attributes(graphql))]
pub fn derive_input_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_input_object(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_object(input: &DeriveInput, data: &DataStruct) -> syn::Result<TokenStream2> {
    let container = parse_container_attrs(&input.attrs)?;
    reject_discriminator(&container)?;
    let type_name = type_name(input, &container)?;

    let fields: Vec<&Field> = match &data.fields {
        Fields::Named(named) => named.named.iter().collect(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "`GraphQL` structs need named fields",
            ))
        }
    };

    let mut descriptors = Vec::new();
    let mut arms = Vec::new();
    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(member) = &field.ident else {
            continue;
        };
        let ty = &field.ty;

        let wire_name = match &attrs.name {
            Some(name) => {
                validate_name(name)?;
                name.value()
            }
            None => to_lower_camel(&member.to_string()),
        };

        let mut descriptor = quote! {
            ::shapeql_core::FieldDescriptor::new(
                #wire_name,
                <#ty as ::shapeql_core::FieldType>::type_ref(),
            )
        };
        if let Some(alias) = &attrs.alias {
            validate_name(alias)?;
            descriptor = quote! { #descriptor.alias(#alias) };
        }
        if let Some(args) = &attrs.args {
            descriptor = quote! { #descriptor.arguments(#args) };
        }
        if attrs.non_null {
            descriptor = quote! { #descriptor.non_null() };
        }
        descriptors.push(descriptor);

        let index = Literal::usize_unsuffixed(arms.len());
        arms.push(quote! {
            #index => ::shapeql_core::FieldType::decode_value(&mut self.#member, value, decoder),
        });
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::shapeql_core::FieldType for #ident #ty_generics #where_clause {
            fn type_ref() -> ::shapeql_core::TypeRef {
                ::shapeql_core::TypeRef::Object(<Self as ::shapeql_core::Selection>::shape)
            }

            fn decode_value(
                &mut self,
                value: &::shapeql_core::__private::serde_json::Value,
                decoder: &mut ::shapeql_core::Decoder,
            ) -> ::core::result::Result<(), ::shapeql_core::DecodeError> {
                decoder.object(value, self)
            }
        }

        impl #impl_generics ::shapeql_core::Selection for #ident #ty_generics #where_clause {
            fn shape() -> ::shapeql_core::ObjectShape {
                ::shapeql_core::ObjectShape {
                    type_name: #type_name,
                    fields: ::std::vec![#(#descriptors),*],
                }
            }

            #[allow(unused_variables)]
            fn decode_field(
                &mut self,
                index: usize,
                value: &::shapeql_core::__private::serde_json::Value,
                decoder: &mut ::shapeql_core::Decoder,
            ) -> ::core::result::Result<(), ::shapeql_core::DecodeError> {
                match index {
                    #(#arms)*
                    _ => ::core::result::Result::Ok(()),
                }
            }
        }
    })
}

fn expand_polymorphic(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream2> {
    let container = parse_container_attrs(&input.attrs)?;
    let type_name = type_name(input, &container)?;
    let discriminator = match &container.discriminator {
        Some(discriminator) => {
            validate_name(discriminator)?;
            discriminator.value()
        }
        None => "__typename".to_string(),
    };

    let mut variants = Vec::new();
    let mut arms = Vec::new();
    for variant in &data.variants {
        let attrs = parse_variant_attrs(&variant.attrs)?;
        let ty = match &variant.fields {
            Fields::Unit => {
                if let Some(on) = &attrs.on {
                    return Err(syn::Error::new_spanned(
                        on,
                        "unit variants are never selected; `on` needs a newtype variant",
                    ));
                }
                continue;
            }
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0].ty,
            _ => {
                return Err(syn::Error::new_spanned(
                    variant,
                    "polymorphic variants hold exactly one field tree: `Variant(Shape)`",
                ))
            }
        };

        let ident = &variant.ident;
        let type_condition = match &attrs.on {
            Some(on) => {
                validate_name(on)?;
                on.value()
            }
            None => ident.to_string(),
        };

        variants.push(quote! {
            ::shapeql_core::VariantShape {
                type_condition: #type_condition,
                shape: <#ty as ::shapeql_core::Selection>::shape,
            }
        });

        let index = Literal::usize_unsuffixed(arms.len());
        arms.push(quote! {
            #index => {
                if !::core::matches!(self, Self::#ident(_)) {
                    *self = Self::#ident(::core::default::Default::default());
                }
                match self {
                    Self::#ident(inner) => decoder.decode_fields(object, inner),
                    _ => ::core::result::Result::Ok(()),
                }
            }
        });
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::shapeql_core::FieldType for #ident #ty_generics #where_clause {
            fn type_ref() -> ::shapeql_core::TypeRef {
                ::shapeql_core::TypeRef::Polymorphic(<Self as ::shapeql_core::Polymorphic>::variants)
            }

            fn decode_value(
                &mut self,
                value: &::shapeql_core::__private::serde_json::Value,
                decoder: &mut ::shapeql_core::Decoder,
            ) -> ::core::result::Result<(), ::shapeql_core::DecodeError> {
                decoder.polymorphic(value, self)
            }
        }

        impl #impl_generics ::shapeql_core::Polymorphic for #ident #ty_generics #where_clause {
            fn variants() -> ::shapeql_core::PolymorphicShape {
                ::shapeql_core::PolymorphicShape {
                    type_name: #type_name,
                    discriminator: #discriminator,
                    variants: ::std::vec![#(#variants),*],
                }
            }

            #[allow(unused_variables, unreachable_patterns)]
            fn decode_variant(
                &mut self,
                index: usize,
                object: &::shapeql_core::__private::serde_json::Map<
                    ::std::string::String,
                    ::shapeql_core::__private::serde_json::Value,
                >,
                decoder: &mut ::shapeql_core::Decoder,
            ) -> ::core::result::Result<(), ::shapeql_core::DecodeError> {
                match index {
                    #(#arms)*
                    _ => ::core::result::Result::Ok(()),
                }
            }
        }
    })
}

fn expand_scalar(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let container = parse_container_attrs(&input.attrs)?;
    reject_discriminator(&container)?;
    let name = type_name(input, &container)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::shapeql_core::FieldType for #ident #ty_generics #where_clause {
            fn type_ref() -> ::shapeql_core::TypeRef {
                ::shapeql_core::TypeRef::Scalar(::shapeql_core::ScalarKind::Custom(#name))
            }

            fn decode_value(
                &mut self,
                value: &::shapeql_core::__private::serde_json::Value,
                decoder: &mut ::shapeql_core::Decoder,
            ) -> ::core::result::Result<(), ::shapeql_core::DecodeError> {
                decoder.custom_scalar(#name, value, self)
            }
        }

        impl #impl_generics ::shapeql_core::InputValue for #ident #ty_generics #where_clause {
            fn input_type() -> ::shapeql_core::InputType {
                ::shapeql_core::InputType::Scalar(::shapeql_core::ScalarKind::Custom(#name))
            }
        }
    })
}

fn expand_input_object(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let container = parse_container_attrs(&input.attrs)?;
    reject_discriminator(&container)?;
    let name = type_name(input, &container)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::shapeql_core::InputValue for #ident #ty_generics #where_clause {
            fn input_type() -> ::shapeql_core::InputType {
                ::shapeql_core::InputType::InputObject(#name)
            }
        }
    })
}

#[derive(Default)]
struct ContainerAttrs {
    name: Option<LitStr>,
    discriminator: Option<LitStr>,
}

#[derive(Default)]
struct FieldAttrs {
    name: Option<LitStr>,
    alias: Option<LitStr>,
    args: Option<LitStr>,
    non_null: bool,
    skip: bool,
}

#[derive(Default)]
struct VariantAttrs {
    on: Option<LitStr>,
}

fn parse_container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut parsed = ContainerAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("graphql") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                parsed.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("discriminator") {
                parsed.discriminator = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("expected `name` or `discriminator`"));
            }
            Ok(())
        })?;
    }
    Ok(parsed)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("graphql") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                parsed.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("alias") {
                parsed.alias = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("args") {
                parsed.args = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("non_null") {
                parsed.non_null = true;
            } else if meta.path.is_ident("skip") {
                parsed.skip = true;
            } else {
                return Err(meta.error("expected `name`, `alias`, `args`, `non_null` or `skip`"));
            }
            Ok(())
        })?;
    }
    Ok(parsed)
}

fn parse_variant_attrs(attrs: &[Attribute]) -> syn::Result<VariantAttrs> {
    let mut parsed = VariantAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("graphql") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("on") {
                parsed.on = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `on`"))
            }
        })?;
    }
    Ok(parsed)
}

fn reject_discriminator(container: &ContainerAttrs) -> syn::Result<()> {
    match &container.discriminator {
        Some(discriminator) => Err(syn::Error::new_spanned(
            discriminator,
            "`discriminator` is only valid on polymorphic enums",
        )),
        None => Ok(()),
    }
}

fn type_name(input: &DeriveInput, container: &ContainerAttrs) -> syn::Result<String> {
    match &container.name {
        Some(name) => {
            validate_name(name)?;
            Ok(name.value())
        }
        None => Ok(input.ident.to_string()),
    }
}

fn validate_name(lit: &LitStr) -> syn::Result<()> {
    if is_valid_name(&lit.value()) {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            lit,
            "not a valid GraphQL name (expected /[_A-Za-z][_0-9A-Za-z]*/)",
        ))
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// `home_planet` -> `homePlanet`. Leading underscores are kept.
fn to_lower_camel(ident: &str) -> String {
    let ident = ident.strip_prefix("r#").unwrap_or(ident);
    let trimmed = ident.trim_start_matches('_');
    let mut out = String::with_capacity(ident.len());
    out.push_str(&ident[..ident.len() - trimmed.len()]);

    let mut first = true;
    let mut capitalize = false;
    for c in trimmed.chars() {
        if c == '_' {
            capitalize = !first;
            continue;
        }
        if first {
            out.extend(c.to_lowercase());
            first = false;
        } else if capitalize {
            out.extend(c.to_uppercase());
            capitalize = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower_camel() {
        assert_eq!(to_lower_camel("name"), "name");
        assert_eq!(to_lower_camel("home_planet"), "homePlanet");
        assert_eq!(to_lower_camel("primary_function_2"), "primaryFunction2");
        assert_eq!(to_lower_camel("__typename"), "__typename");
        assert_eq!(to_lower_camel("r#type"), "type");
        assert_eq!(to_lower_camel("id_"), "id");
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("Droid"));
        assert!(is_valid_name("_private"));
        assert!(!is_valid_name("1st"));
        assert!(!is_valid_name("on Droid"));
    }
}
