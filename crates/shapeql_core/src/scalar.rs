//! Built-in leaf and wrapper field types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::{DecodeError, Decoder};
use crate::descriptor::{FieldType, ScalarKind, TypeRef};

/// A GraphQL `ID`.
///
/// Serialized as a string. Decoding also accepts integer IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    /// Creates an ID from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for Id {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl FieldType for Id {
    fn type_ref() -> TypeRef {
        TypeRef::Scalar(ScalarKind::Id)
    }

    fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
        match value {
            Value::String(s) => self.0.clone_from(s),
            Value::Number(n) if n.is_i64() || n.is_u64() => self.0 = n.to_string(),
            other => return Err(decoder.mismatch("ID", other)),
        }
        Ok(())
    }
}

impl FieldType for String {
    fn type_ref() -> TypeRef {
        TypeRef::Scalar(ScalarKind::String)
    }

    fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
        match value {
            Value::String(s) => {
                self.clone_from(s);
                Ok(())
            }
            other => Err(decoder.mismatch("String", other)),
        }
    }
}

impl FieldType for bool {
    fn type_ref() -> TypeRef {
        TypeRef::Scalar(ScalarKind::Boolean)
    }

    fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
        match value {
            Value::Bool(b) => {
                *self = *b;
                Ok(())
            }
            other => Err(decoder.mismatch("Boolean", other)),
        }
    }
}

macro_rules! int_field_type {
    ($($ty:ty),* $(,)?) => {$(
        impl FieldType for $ty {
            fn type_ref() -> TypeRef {
                TypeRef::Scalar(ScalarKind::Int)
            }

            fn decode_value(
                &mut self,
                value: &Value,
                decoder: &mut Decoder,
            ) -> Result<(), DecodeError> {
                let parsed = match value {
                    Value::Number(n) => n
                        .as_i64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .or_else(|| n.as_u64().and_then(|v| <$ty>::try_from(v).ok())),
                    _ => None,
                };
                match parsed {
                    Some(v) => {
                        *self = v;
                        Ok(())
                    }
                    None => Err(decoder.mismatch(concat!("Int (", stringify!($ty), ")"), value)),
                }
            }
        }
    )*};
}

int_field_type!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! float_field_type {
    ($($ty:ty),* $(,)?) => {$(
        impl FieldType for $ty {
            fn type_ref() -> TypeRef {
                TypeRef::Scalar(ScalarKind::Float)
            }

            #[allow(clippy::cast_possible_truncation)]
            fn decode_value(
                &mut self,
                value: &Value,
                decoder: &mut Decoder,
            ) -> Result<(), DecodeError> {
                // Ints are valid Float results.
                match value.as_f64() {
                    Some(v) => {
                        *self = v as $ty;
                        Ok(())
                    }
                    None => Err(decoder.mismatch("Float", value)),
                }
            }
        }
    )*};
}

float_field_type!(f32, f64);

impl<T: FieldType> FieldType for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::nullable(T::type_ref())
    }

    /// Decodes into the present value, or into a fresh one that is only
    /// stored on success. An unmatched polymorphic value clears the option.
    fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
        let depth = decoder.begin_optional();
        match self {
            Some(inner) => inner.decode_value(value, decoder)?,
            None => {
                let mut inner = T::default();
                inner.decode_value(value, decoder)?;
                *self = Some(inner);
            }
        }
        if decoder.unmatched_at(depth) {
            *self = None;
        }
        Ok(())
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::list(T::type_ref())
    }

    fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
        decoder.list(value, self)
    }
}

impl<T: FieldType> FieldType for Box<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn decode_value(&mut self, value: &Value, decoder: &mut Decoder) -> Result<(), DecodeError> {
        self.as_mut().decode_value(value, decoder)
    }
}
