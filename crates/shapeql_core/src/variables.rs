//! Operation variables.

use indexmap::IndexMap;
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::input::{InputType, InputValue};

/// A variable value that could not be serialized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to serialize variable `{name}`: {message}")]
pub struct VariableError {
    pub name: String,
    pub message: String,
}

/// One variable: its inferred input type and serialized value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub input_type: InputType,
    pub value: Value,
}

/// Insertion-ordered variables of one operation.
///
/// Serializes as the JSON object sent under `"variables"`. A value that
/// failed to serialize in [`Variables::set`] surfaces when the map itself is
/// serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    entries: IndexMap<String, Variable>,
    error: Option<VariableError>,
}

impl Variables {
    /// Creates an empty set of variables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable, builder style. Replaces an existing one of the same
    /// name in place.
    #[must_use]
    pub fn set<T: InputValue + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        if let Err(e) = self.insert(name, value) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Adds a variable, failing if its value can't be serialized.
    pub fn insert<T: InputValue + ?Sized>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<(), VariableError> {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|e| VariableError {
            name: name.clone(),
            message: e.to_string(),
        })?;
        self.entries.insert(
            name,
            Variable {
                input_type: T::input_type(),
                value,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.entries.iter().map(|(name, var)| (name.as_str(), var))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The first serialization failure recorded by [`Variables::set`].
    pub fn error(&self) -> Option<&VariableError> {
        self.error.as_ref()
    }
}

impl Serialize for Variables {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(error) = &self.error {
            return Err(S::Error::custom(error));
        }
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, variable) in &self.entries {
            map.serialize_entry(name, &variable.value)?;
        }
        map.end()
    }
}
