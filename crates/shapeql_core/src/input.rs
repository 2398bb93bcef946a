//! Static inference of GraphQL input types for variables.

use std::fmt;

use serde::Serialize;

use crate::descriptor::ScalarKind;
use crate::scalar::Id;

/// A GraphQL input type reference, as written in a variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputType {
    Scalar(ScalarKind),
    InputObject(&'static str),
    List(Box<InputType>),
    Nullable(Box<InputType>),
}

impl InputType {
    /// Wraps a type in a list.
    #[must_use]
    pub fn list(inner: InputType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Marks a type as nullable. Idempotent.
    #[must_use]
    pub fn nullable(inner: InputType) -> Self {
        match inner {
            nullable @ Self::Nullable(_) => nullable,
            other => Self::Nullable(Box::new(other)),
        }
    }

    /// Returns the named type under all wrappers.
    pub fn named(&self) -> &str {
        match self {
            Self::Scalar(kind) => kind.name(),
            Self::InputObject(name) => *name,
            Self::List(inner) | Self::Nullable(inner) => inner.named(),
        }
    }

    fn write_bare(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => f.write_str(kind.name()),
            Self::InputObject(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::Nullable(inner) => inner.write_bare(f),
        }
    }
}

/// Renders `[String!]!` style notation: everything not wrapped in
/// [`InputType::Nullable`] gets a trailing `!`.
impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_bare(f)?;
        if !matches!(self, Self::Nullable(_)) {
            f.write_str("!")?;
        }
        Ok(())
    }
}

/// A Rust type usable as a variable value.
///
/// The GraphQL type comes from the static type only, so an empty `Vec<i32>`
/// is still declared `[Int!]!`.
pub trait InputValue: Serialize {
    fn input_type() -> InputType;
}

macro_rules! scalar_input {
    ($kind:expr => $($ty:ty),+ $(,)?) => {$(
        impl InputValue for $ty {
            fn input_type() -> InputType {
                InputType::Scalar($kind)
            }
        }
    )+};
}

scalar_input!(ScalarKind::String => String, str, char);
scalar_input!(ScalarKind::Boolean => bool);
scalar_input!(ScalarKind::Int => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
scalar_input!(ScalarKind::Float => f32, f64);
scalar_input!(ScalarKind::Id => Id);

impl<T: InputValue> InputValue for Option<T> {
    fn input_type() -> InputType {
        InputType::nullable(T::input_type())
    }
}

impl<T: InputValue> InputValue for Vec<T> {
    fn input_type() -> InputType {
        InputType::list(T::input_type())
    }
}

impl<T: InputValue> InputValue for [T] {
    fn input_type() -> InputType {
        InputType::list(T::input_type())
    }
}

impl<T: InputValue, const N: usize> InputValue for [T; N]
where
    [T; N]: Serialize,
{
    fn input_type() -> InputType {
        InputType::list(T::input_type())
    }
}

impl<T: InputValue + ?Sized> InputValue for Box<T> {
    fn input_type() -> InputType {
        T::input_type()
    }
}

impl<T: InputValue + ?Sized> InputValue for &T {
    fn input_type() -> InputType {
        T::input_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<T: InputValue + ?Sized>() -> String {
        T::input_type().to_string()
    }

    #[test]
    fn test_scalars_are_non_null() {
        assert_eq!(render::<String>(), "String!");
        assert_eq!(render::<&str>(), "String!");
        assert_eq!(render::<char>(), "String!");
        assert_eq!(render::<u16>(), "Int!");
        assert_eq!(render::<f32>(), "Float!");
        assert_eq!(render::<bool>(), "Boolean!");
        assert_eq!(render::<Id>(), "ID!");
    }

    #[test]
    fn test_option_drops_bang() {
        assert_eq!(render::<Option<i64>>(), "Int");
        assert_eq!(render::<Option<Option<i64>>>(), "Int");
    }

    #[test]
    fn test_lists() {
        assert_eq!(render::<Vec<String>>(), "[String!]!");
        assert_eq!(render::<[u8]>(), "[Int!]!");
        assert_eq!(render::<[bool; 3]>(), "[Boolean!]!");
        assert_eq!(render::<Option<Vec<Option<i32>>>>(), "[Int]");
        assert_eq!(render::<Vec<Vec<Id>>>(), "[[ID!]!]!");
    }

    #[test]
    fn test_named_type() {
        let ty = InputType::list(InputType::nullable(InputType::InputObject("ReviewInput")));
        assert_eq!(ty.named(), "ReviewInput");
        assert_eq!(ty.to_string(), "[ReviewInput]!");
    }
}
