//! Response decoder.
//!
//! Walks a field tree's descriptors against the `data` member of a response
//! and writes into the caller's target in place. Rules:
//!
//! - `null` and a missing key are the same thing. The target field keeps
//!   whatever it held, unless the descriptor is `non_null`.
//! - Lists are rebuilt from fresh `Default` elements, preserving order.
//! - Polymorphic fields pick their variant by the discriminator, matched
//!   exactly. An unknown type name is a warning unless
//!   [`DecodeOptions::strict_variants`] is set.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::descriptor::{
    FieldType, ObjectShape, Polymorphic, PolymorphicShape, Selection, ShapeFn, VariantsFn,
};
use crate::diagnostics::{codes, DiagnosticBag};

/// Decoder settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail on a discriminator that matches no declared variant instead of
    /// resetting the field and recording a warning.
    pub strict_variants: bool,
}

/// One step of a [`ResponsePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(&'static str),
    Index(usize),
}

/// Location of a value inside the response `data`, e.g. `hero.friends[2].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePath(pub Vec<PathSegment>);

impl ResponsePath {
    /// Returns true for the root of `data`.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// What went wrong while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: Cow<'static, str>,
        found: String,
    },

    #[error("unexpected null for a non-null field")]
    UnexpectedNull,

    #[error("unknown variant `{type_name}`, expected one of: {expected}")]
    UnknownVariant { type_name: String, expected: String },

    #[error("missing discriminator field `{0}`")]
    MissingDiscriminator(&'static str),
}

/// A hard decoding failure, located by its response path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at `{path}`")]
pub struct DecodeError {
    pub path: ResponsePath,
    pub kind: DecodeErrorKind,
}

/// Outcome of a successful decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct DecodeReport {
    /// Tolerated failures, such as unknown polymorphic variants.
    pub diagnostics: DiagnosticBag,
}

impl DecodeReport {
    /// Returns true when nothing was tolerated.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Decodes `data` into `target` with default options.
pub fn decode<T: Selection>(data: &Value, target: &mut T) -> Result<DecodeReport, DecodeError> {
    Decoder::new(DecodeOptions::default()).decode(data, target)
}

/// Stateful decoder driven by the generated `decode_field` and
/// `decode_variant` implementations.
#[derive(Debug, Default)]
pub struct Decoder {
    options: DecodeOptions,
    path: Vec<PathSegment>,
    diagnostics: DiagnosticBag,
    shapes: FxHashMap<usize, Arc<ObjectShape>>,
    variants: FxHashMap<usize, Arc<PolymorphicShape>>,
    /// Path depth of the last polymorphic value reset for lack of a match.
    unmatched: Option<usize>,
}

impl Decoder {
    /// Creates a decoder.
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Decodes a whole `data` member into `target`.
    ///
    /// `null` leaves the target unmodified.
    pub fn decode<T: Selection>(
        mut self,
        data: &Value,
        target: &mut T,
    ) -> Result<DecodeReport, DecodeError> {
        if !data.is_null() {
            self.object(data, target)?;
        }
        Ok(DecodeReport {
            diagnostics: self.diagnostics,
        })
    }

    /// Decodes a JSON object into a selection.
    pub fn object<T: Selection>(&mut self, value: &Value, target: &mut T) -> Result<(), DecodeError> {
        match value {
            Value::Object(object) => self.decode_fields(object, target),
            other => {
                let shape = self.shape_of(T::shape);
                Err(self.mismatch(shape.type_name, other))
            }
        }
    }

    /// Decodes every field of `T`'s shape from `object`.
    pub fn decode_fields<T: Selection>(
        &mut self,
        object: &Map<String, Value>,
        target: &mut T,
    ) -> Result<(), DecodeError> {
        let shape = self.shape_of(T::shape);
        for (index, field) in shape.fields.iter().enumerate() {
            let key = field.response_key();
            self.path.push(PathSegment::Key(key));
            let result = match object.get(key) {
                None | Some(Value::Null) if field.non_null => {
                    Err(self.error(DecodeErrorKind::UnexpectedNull))
                }
                None | Some(Value::Null) => Ok(()),
                Some(value) => target.decode_field(index, value, self),
            };
            self.path.pop();
            result?;
        }
        Ok(())
    }

    /// Rebuilds `target` from a JSON array. Null elements stay `Default`.
    ///
    /// `target` is only replaced once every element decoded.
    pub fn list<T: FieldType>(&mut self, value: &Value, target: &mut Vec<T>) -> Result<(), DecodeError> {
        let Value::Array(items) = value else {
            return Err(self.mismatch("list", value));
        };

        let mut decoded = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let mut element = T::default();
            if !item.is_null() {
                self.path.push(PathSegment::Index(index));
                let result = element.decode_value(item, self);
                self.path.pop();
                result?;
            }
            decoded.push(element);
        }
        *target = decoded;
        Ok(())
    }

    /// Picks the variant named by the discriminator and decodes into it.
    pub fn polymorphic<T: Polymorphic>(
        &mut self,
        value: &Value,
        target: &mut T,
    ) -> Result<(), DecodeError> {
        let shape = self.variants_of(T::variants);
        let Value::Object(object) = value else {
            return Err(self.mismatch(shape.type_name, value));
        };
        let Some(type_name) = object.get(shape.discriminator).and_then(Value::as_str) else {
            return Err(self.error(DecodeErrorKind::MissingDiscriminator(shape.discriminator)));
        };

        if let Some(index) = shape.position(type_name) {
            return target.decode_variant(index, object, self);
        }

        if self.options.strict_variants {
            return Err(self.error(DecodeErrorKind::UnknownVariant {
                type_name: type_name.to_owned(),
                expected: shape.expected(),
            }));
        }

        let path = self.current_path();
        warn!(
            "Unknown variant `{}` for {} at `{}`, resetting to default",
            type_name, shape.type_name, path
        );
        self.diagnostics.warning(
            codes::UNKNOWN_VARIANT,
            format!("unknown variant of {}", shape.type_name),
            path.to_string(),
            format!("`{type_name}` is not one of: {}", shape.expected()),
        );
        *target = T::default();
        self.unmatched = Some(self.path.len());
        Ok(())
    }

    /// Decodes a custom scalar through its serde implementation.
    pub fn custom_scalar<T: DeserializeOwned>(
        &mut self,
        name: &'static str,
        value: &Value,
        target: &mut T,
    ) -> Result<(), DecodeError> {
        match T::deserialize(value) {
            Ok(decoded) => {
                *target = decoded;
                Ok(())
            }
            Err(e) => Err(self.error(DecodeErrorKind::Mismatch {
                expected: Cow::Borrowed(name),
                found: e.to_string(),
            })),
        }
    }

    /// Builds a mismatch error at the current path.
    pub fn mismatch(&self, expected: impl Into<Cow<'static, str>>, found: &Value) -> DecodeError {
        self.error(DecodeErrorKind::Mismatch {
            expected: expected.into(),
            found: json_kind(found).to_owned(),
        })
    }

    /// Builds an error at the current path.
    pub fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            path: self.current_path(),
            kind,
        }
    }

    /// The decoder options.
    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// Starts decoding an optional value at the current depth.
    pub(crate) fn begin_optional(&mut self) -> usize {
        self.unmatched = None;
        self.path.len()
    }

    /// Returns true if a polymorphic value at `depth` went unmatched since
    /// [`Decoder::begin_optional`].
    pub(crate) fn unmatched_at(&mut self, depth: usize) -> bool {
        self.unmatched.take() == Some(depth)
    }

    fn current_path(&self) -> ResponsePath {
        ResponsePath(self.path.clone())
    }

    fn shape_of(&mut self, shape: ShapeFn) -> Arc<ObjectShape> {
        Arc::clone(
            self.shapes
                .entry(shape as usize)
                .or_insert_with(|| Arc::new(shape())),
        )
    }

    fn variants_of(&mut self, variants: VariantsFn) -> Arc<PolymorphicShape> {
        Arc::clone(
            self.variants
                .entry(variants as usize)
                .or_insert_with(|| Arc::new(variants())),
        )
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDescriptor, TypeRef, VariantShape};
    use serde_json::json;

    // Hand-written equivalents of what the derive generates.

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        name: String,
        height: Option<f64>,
        friends: Vec<Person>,
    }

    impl FieldType for Person {
        fn type_ref() -> TypeRef {
            TypeRef::Object(Self::shape)
        }

        fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
            decoder.object(value, self)
        }
    }

    impl Selection for Person {
        fn shape() -> ObjectShape {
            ObjectShape {
                type_name: "Person",
                fields: vec![
                    FieldDescriptor::new("name", String::type_ref()).non_null(),
                    FieldDescriptor::new("height", <Option<f64>>::type_ref()),
                    FieldDescriptor::new("friends", <Vec<Person>>::type_ref()),
                ],
            }
        }

        fn decode_field(
            &mut self,
            index: usize,
            value: &Value,
            decoder: &mut Decoder,
        ) -> Result<(), DecodeError> {
            match index {
                0 => self.name.decode_value(value, decoder),
                1 => self.height.decode_value(value, decoder),
                2 => self.friends.decode_value(value, decoder),
                _ => Ok(()),
            }
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Droid {
        primary_function: String,
    }

    impl FieldType for Droid {
        fn type_ref() -> TypeRef {
            TypeRef::Object(Self::shape)
        }

        fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
            decoder.object(value, self)
        }
    }

    impl Selection for Droid {
        fn shape() -> ObjectShape {
            ObjectShape {
                type_name: "Droid",
                fields: vec![FieldDescriptor::new("primaryFunction", String::type_ref())],
            }
        }

        fn decode_field(
            &mut self,
            index: usize,
            value: &Value,
            decoder: &mut Decoder,
        ) -> Result<(), DecodeError> {
            match index {
                0 => self.primary_function.decode_value(value, decoder),
                _ => Ok(()),
            }
        }
    }

    #[derive(Debug, Default, PartialEq)]
    enum Character {
        #[default]
        Unknown,
        Droid(Droid),
    }

    impl FieldType for Character {
        fn type_ref() -> TypeRef {
            TypeRef::Polymorphic(Self::variants)
        }

        fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
            decoder.polymorphic(value, self)
        }
    }

    impl Polymorphic for Character {
        fn variants() -> PolymorphicShape {
            PolymorphicShape {
                type_name: "Character",
                discriminator: "__typename",
                variants: vec![VariantShape {
                    type_condition: "Droid",
                    shape: Droid::shape,
                }],
            }
        }

        fn decode_variant(
            &mut self,
            index: usize,
            object: &Map<String, Value>,
            decoder: &mut Decoder,
        ) -> Result<(), DecodeError> {
            match index {
                0 => {
                    if !matches!(self, Self::Droid(_)) {
                        *self = Self::Droid(Droid::default());
                    }
                    match self {
                        Self::Droid(inner) => decoder.decode_fields(object, inner),
                        Self::Unknown => Ok(()),
                    }
                }
                _ => Ok(()),
            }
        }
    }

    #[derive(Debug, Default)]
    struct Search {
        results: Vec<Character>,
    }

    impl FieldType for Search {
        fn type_ref() -> TypeRef {
            TypeRef::Object(Self::shape)
        }

        fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
            decoder.object(value, self)
        }
    }

    impl Selection for Search {
        fn shape() -> ObjectShape {
            ObjectShape {
                type_name: "Search",
                fields: vec![FieldDescriptor::new("results", <Vec<Character>>::type_ref())],
            }
        }

        fn decode_field(
            &mut self,
            index: usize,
            value: &Value,
            decoder: &mut Decoder,
        ) -> Result<(), DecodeError> {
            match index {
                0 => self.results.decode_value(value, decoder),
                _ => Ok(()),
            }
        }
    }

    #[derive(Debug, Default)]
    struct HeroSlot {
        hero: Option<Character>,
        search: Option<Search>,
    }

    impl FieldType for HeroSlot {
        fn type_ref() -> TypeRef {
            TypeRef::Object(Self::shape)
        }

        fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
            decoder.object(value, self)
        }
    }

    impl Selection for HeroSlot {
        fn shape() -> ObjectShape {
            ObjectShape {
                type_name: "HeroSlot",
                fields: vec![
                    FieldDescriptor::new("hero", <Option<Character>>::type_ref()),
                    FieldDescriptor::new("search", <Option<Search>>::type_ref()),
                ],
            }
        }

        fn decode_field(
            &mut self,
            index: usize,
            value: &Value,
            decoder: &mut Decoder,
        ) -> Result<(), DecodeError> {
            match index {
                0 => self.hero.decode_value(value, decoder),
                1 => self.search.decode_value(value, decoder),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_decode_nested_lists_in_order() {
        let mut person = Person::default();
        let report = decode(
            &json!({
                "name": "Luke Skywalker",
                "height": 1.72,
                "friends": [{ "name": "Han Solo" }, { "name": "Leia Organa" }]
            }),
            &mut person,
        )
        .unwrap();

        assert!(report.is_clean());
        assert_eq!(person.name, "Luke Skywalker");
        assert_eq!(person.height, Some(1.72));
        let names: Vec<_> = person.friends.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Han Solo", "Leia Organa"]);
    }

    #[test]
    fn test_null_and_absent_leave_target_untouched() {
        let mut person = Person {
            name: "kept".into(),
            height: Some(2.0),
            friends: vec![Person::default()],
        };
        decode(&json!({ "name": "Luke", "height": null }), &mut person).unwrap();

        assert_eq!(person.name, "Luke");
        assert_eq!(person.height, Some(2.0));
        assert_eq!(person.friends.len(), 1);
    }

    #[test]
    fn test_null_data_leaves_target_unmodified() {
        let mut person = Person {
            name: "kept".into(),
            ..Person::default()
        };
        let report = decode(&Value::Null, &mut person).unwrap();

        assert!(report.is_clean());
        assert_eq!(person.name, "kept");
    }

    #[test]
    fn test_empty_list_clears() {
        let mut person = Person {
            friends: vec![Person::default(), Person::default()],
            ..Person::default()
        };
        decode(&json!({ "name": "Luke", "friends": [] }), &mut person).unwrap();
        assert!(person.friends.is_empty());
    }

    #[test]
    fn test_non_null_field_rejects_null() {
        let mut person = Person::default();
        let err = decode(&json!({ "name": null }), &mut person).unwrap_err();

        assert_eq!(err.kind, DecodeErrorKind::UnexpectedNull);
        assert_eq!(err.path.to_string(), "name");
    }

    #[test]
    fn test_mismatch_carries_path() {
        let mut person = Person::default();
        let err = decode(
            &json!({ "name": "Luke", "friends": [{ "name": "Han" }, { "name": 7 }] }),
            &mut person,
        )
        .unwrap_err();

        assert_eq!(err.path.to_string(), "friends[1].name");
        assert_eq!(
            err.to_string(),
            "expected String, found number at `friends[1].name`"
        );
        // A failed list decode does not touch the previous contents.
        assert!(person.friends.is_empty());
    }

    #[test]
    fn test_list_requires_array() {
        let mut person = Person::default();
        let err = decode(&json!({ "name": "Luke", "friends": {} }), &mut person).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::Mismatch { .. }));
    }

    #[test]
    fn test_polymorphic_picks_variant() {
        let mut search = Search::default();
        decode(
            &json!({ "results": [{ "__typename": "Droid", "primaryFunction": "Astromech" }] }),
            &mut search,
        )
        .unwrap();

        assert_eq!(
            search.results,
            [Character::Droid(Droid {
                primary_function: "Astromech".into()
            })]
        );
    }

    #[test]
    fn test_unknown_variant_is_soft_by_default() {
        let mut search = Search::default();
        let report = decode(
            &json!({ "results": [{ "__typename": "Starship" }, { "__typename": "droid" }] }),
            &mut search,
        )
        .unwrap();

        assert_eq!(search.results, [Character::Unknown, Character::Unknown]);
        let warnings: Vec<_> = report.diagnostics.with_code(codes::UNKNOWN_VARIANT).collect();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].location.as_deref(), Some("results[0]"));
    }

    #[test]
    fn test_unknown_variant_clears_optional_field() {
        let mut slot = HeroSlot {
            hero: Some(Character::Droid(Droid::default())),
            search: None,
        };
        let report = decode(
            &json!({
                "hero": { "__typename": "Starship" },
                "search": { "results": [{ "__typename": "Starship" }] }
            }),
            &mut slot,
        )
        .unwrap();

        assert_eq!(slot.hero, None);
        // Only the unmatched value itself is cleared, not the option around it.
        let search = slot.search.unwrap();
        assert_eq!(search.results, [Character::Unknown]);
        assert_eq!(report.diagnostics.with_code(codes::UNKNOWN_VARIANT).count(), 2);
    }

    #[test]
    fn test_known_variant_fills_optional_field() {
        let mut slot = HeroSlot::default();
        decode(
            &json!({ "hero": { "__typename": "Droid", "primaryFunction": "Protocol" } }),
            &mut slot,
        )
        .unwrap();

        assert_eq!(
            slot.hero,
            Some(Character::Droid(Droid {
                primary_function: "Protocol".into()
            }))
        );
    }

    #[test]
    fn test_unknown_variant_strict() {
        let mut search = Search::default();
        let err = Decoder::new(DecodeOptions {
            strict_variants: true,
        })
        .decode(&json!({ "results": [{ "__typename": "Starship" }] }), &mut search)
        .unwrap_err();

        assert_eq!(
            err.kind,
            DecodeErrorKind::UnknownVariant {
                type_name: "Starship".into(),
                expected: "Droid".into(),
            }
        );
    }

    #[test]
    fn test_missing_discriminator() {
        let mut search = Search::default();
        let err = decode(&json!({ "results": [{ "primaryFunction": "x" }] }), &mut search)
            .unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::MissingDiscriminator("__typename"));
    }

    #[test]
    fn test_root_path_display() {
        assert_eq!(ResponsePath::default().to_string(), "(root)");
    }
}
