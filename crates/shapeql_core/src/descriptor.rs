//! Field descriptors shared by query synthesis and response decoding.
//!
//! A field tree is a Rust type deriving `GraphQL`. The derive produces an
//! [`ObjectShape`] (or a [`PolymorphicShape`] for enums) describing every
//! selected field, and a small setter table the [`Decoder`] drives. Both the
//! synthesizer and the decoder walk the same descriptors, so the document
//! that is sent and the decoding that follows can't drift apart.
//!
//! Nested shapes are referenced through function pointers and built lazily,
//! one level at a time.

use std::fmt;

use serde_json::{Map, Value};

use crate::decode::{DecodeError, Decoder};

/// The kind of GraphQL operation to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationKind {
    /// A `query` operation.
    #[default]
    Query,
    /// A `mutation` operation.
    Mutation,
}

impl OperationKind {
    /// Returns the document keyword for this operation.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Leaf scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int,
    Float,
    String,
    Boolean,
    Id,
    /// A custom scalar or enum, carrying its wire type name.
    Custom(&'static str),
}

impl ScalarKind {
    /// Returns the GraphQL type name of this scalar.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
            Self::Id => "ID",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds the shape of an object type.
pub type ShapeFn = fn() -> ObjectShape;

/// Builds the shape of a polymorphic type.
pub type VariantsFn = fn() -> PolymorphicShape;

/// The kind of a field, as derived from its Rust type.
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// A leaf value; selected without a sub-selection.
    Scalar(ScalarKind),
    /// A nested object with its own selection set.
    Object(ShapeFn),
    /// An ordered list (`Vec<T>`).
    List(Box<TypeRef>),
    /// A nullable value (`Option<T>`).
    Nullable(Box<TypeRef>),
    /// One of a closed set of concrete shapes, chosen by a discriminator.
    Polymorphic(VariantsFn),
}

impl TypeRef {
    /// Wraps a type in a list.
    #[must_use]
    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    /// Wraps a type as nullable.
    #[must_use]
    pub fn nullable(inner: TypeRef) -> Self {
        Self::Nullable(Box::new(inner))
    }

    /// Strips list and nullable wrappers, returning the named type.
    #[must_use]
    pub fn leaf(&self) -> &TypeRef {
        match self {
            Self::List(inner) | Self::Nullable(inner) => inner.leaf(),
            other => other,
        }
    }

    /// Returns true if the outermost wrapper is nullable.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Nullable(_))
    }
}

/// A single selected field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Schema field name.
    pub name: &'static str,
    /// Optional response alias, rendered as `alias: name`.
    pub alias: Option<&'static str>,
    /// Argument list rendered verbatim inside parentheses.
    pub arguments: Option<&'static str>,
    /// A `null` or missing value is an error instead of being skipped.
    pub non_null: bool,
    /// The field's kind.
    pub ty: TypeRef,
}

impl FieldDescriptor {
    /// Creates a descriptor with no alias, arguments, or non-null marker.
    pub fn new(name: &'static str, ty: TypeRef) -> Self {
        Self {
            name,
            alias: None,
            arguments: None,
            non_null: false,
            ty,
        }
    }

    /// Sets the response alias.
    #[must_use]
    pub fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Sets the argument binding.
    #[must_use]
    pub fn arguments(mut self, arguments: &'static str) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Marks the field non-null.
    #[must_use]
    pub fn non_null(mut self) -> Self {
        self.non_null = true;
        self
    }

    /// The key this field appears under in the response.
    pub fn response_key(&self) -> &'static str {
        self.alias.unwrap_or(self.name)
    }
}

/// The selection set of an object type.
#[derive(Debug, Clone)]
pub struct ObjectShape {
    /// Rust-side type name, used in diagnostics.
    pub type_name: &'static str,
    /// Selected fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

/// One concrete shape of a polymorphic field.
#[derive(Debug, Clone)]
pub struct VariantShape {
    /// The GraphQL type this variant matches (`... on Human`).
    pub type_condition: &'static str,
    /// The variant's selection set.
    pub shape: ShapeFn,
}

/// The closed set of shapes a polymorphic field can take.
#[derive(Debug, Clone)]
pub struct PolymorphicShape {
    /// Rust-side type name, used in diagnostics.
    pub type_name: &'static str,
    /// Response key naming the concrete type, usually `__typename`.
    pub discriminator: &'static str,
    /// Declared variants in declaration order.
    pub variants: Vec<VariantShape>,
}

impl PolymorphicShape {
    /// Finds the variant whose type condition matches exactly.
    pub fn position(&self, type_name: &str) -> Option<usize> {
        self.variants
            .iter()
            .position(|variant| variant.type_condition == type_name)
    }

    /// Comma-separated list of declared type conditions.
    pub fn expected(&self) -> String {
        self.variants
            .iter()
            .map(|variant| variant.type_condition)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A Rust type that can sit in a field tree.
///
/// Implemented for scalars, `Option`, `Vec` and `Box` here, and generated by
/// the derives for objects, polymorphic enums and custom scalars.
pub trait FieldType: Default {
    /// Describes the field kind.
    fn type_ref() -> TypeRef;

    /// Populates `self` from a non-null JSON value.
    fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError>;
}

/// An object type with a selection set. Usable as the root of an operation.
pub trait Selection: FieldType {
    /// Describes the selection set.
    fn shape() -> ObjectShape;

    /// Decodes `value` into the field at `index` of [`Selection::shape`].
    fn decode_field(
        &mut self,
        index: usize,
        value: &Value,
        decoder: &mut Decoder,
    ) -> Result<(), DecodeError>;
}

/// A field whose concrete shape is picked at decode time.
pub trait Polymorphic: FieldType {
    /// Describes the declared variants.
    fn variants() -> PolymorphicShape;

    /// Switches to the variant at `index` (if not already active) and decodes
    /// `object` into it.
    fn decode_variant(
        &mut self,
        index: usize,
        object: &Map<String, Value>,
        decoder: &mut Decoder,
    ) -> Result<(), DecodeError>;
}

/// Returns true if `name` is a valid GraphQL `Name`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_shape() -> ObjectShape {
        ObjectShape {
            type_name: "Empty",
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_leaf_strips_wrappers() {
        let ty = TypeRef::nullable(TypeRef::list(TypeRef::Scalar(ScalarKind::Int)));
        assert!(matches!(ty.leaf(), TypeRef::Scalar(ScalarKind::Int)));
        assert!(ty.is_nullable());
    }

    #[test]
    fn test_response_key_prefers_alias() {
        let field = FieldDescriptor::new("hero", TypeRef::Object(empty_shape));
        assert_eq!(field.response_key(), "hero");
        assert_eq!(field.alias("empireHero").response_key(), "empireHero");
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("__typename"));
        assert!(is_valid_name("primaryFunction2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("2fast"));
        assert!(!is_valid_name("hero(id: 1)"));
        assert!(!is_valid_name("naïve"));
    }

    #[test]
    fn test_polymorphic_lookup_is_case_sensitive() {
        let shape = PolymorphicShape {
            type_name: "Character",
            discriminator: "__typename",
            variants: vec![
                VariantShape {
                    type_condition: "Human",
                    shape: empty_shape,
                },
                VariantShape {
                    type_condition: "Droid",
                    shape: empty_shape,
                },
            ],
        };

        assert_eq!(shape.position("Droid"), Some(1));
        assert_eq!(shape.position("droid"), None);
        assert_eq!(shape.expected(), "Human, Droid");
    }
}
