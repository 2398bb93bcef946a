//! Response envelope parsing and error normalization.
//!
//! Servers report errors in one of two shapes. The canonical one carries a
//! string `message`; the extended one carries an array of tokens. Both end
//! up as [`GraphQLErrors`].

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Bytes of a response body kept in error messages.
pub const SNIPPET_LIMIT: usize = 512;

/// A position in the request document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// A single error in the canonical shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub locations: Vec<Location>,
    /// Response path as sent by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLError {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
        }
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The `errors` member of a response. Empty means the server reported no
/// error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphQLErrors(pub Vec<GraphQLError>);

impl GraphQLErrors {
    /// Returns the errors as a vector.
    pub fn into_vec(self) -> Vec<GraphQLError> {
        self.0
    }
}

impl Deref for GraphQLErrors {
    type Target = [GraphQLError];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a GraphQLErrors {
    type Item = &'a GraphQLError;
    type IntoIter = std::slice::Iter<'a, GraphQLError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<GraphQLError>> for GraphQLErrors {
    fn from(errors: Vec<GraphQLError>) -> Self {
        Self(errors)
    }
}

/// Shows the first error's message.
impl fmt::Display for GraphQLErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.first() {
            Some(error) => f.write_str(&error.message),
            None => f.write_str("no errors"),
        }
    }
}

impl std::error::Error for GraphQLErrors {}

/// A single error in the extended shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedError {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// The `errors` member in the extended shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtendedErrors(pub Vec<ExtendedError>);

impl ExtendedErrors {
    /// Converts to the canonical shape.
    ///
    /// Each token becomes its own record carrying the locations and path of
    /// the record it came from. A record without tokens still yields one
    /// record, with an empty message.
    pub fn into_canonical(self) -> GraphQLErrors {
        let mut errors = Vec::with_capacity(self.0.len());
        for record in self.0 {
            if record.message.is_empty() {
                errors.push(GraphQLError {
                    message: String::new(),
                    locations: record.locations,
                    path: record.path,
                    extensions: record.extensions,
                });
                continue;
            }
            for token in &record.message {
                errors.push(GraphQLError {
                    message: token_to_string(token),
                    locations: record.locations.clone(),
                    path: record.path.clone(),
                    extensions: record.extensions.clone(),
                });
            }
        }
        GraphQLErrors(errors)
    }
}

/// Joins the first record's tokens with `;`.
impl fmt::Display for ExtendedErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(first) = self.0.first() else {
            return f.write_str("no errors");
        };
        for (i, token) in first.message.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            f.write_str(&token_to_string(token))?;
        }
        Ok(())
    }
}

impl std::error::Error for ExtendedErrors {}

fn token_to_string(token: &Value) -> String {
    match token {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Which error shape the server used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorShape {
    Canonical,
    Extended,
}

/// A parsed response body.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The raw `data` member. `None` when absent or `null`.
    pub data: Option<Box<RawValue>>,
    pub errors: GraphQLErrors,
    /// The `extensions` member, untouched.
    pub extensions: Option<Value>,
    pub shape: ErrorShape,
}

impl Envelope {
    /// Parses `data` into a JSON value; `null` when absent.
    pub fn data_value(&self) -> Result<Value, EnvelopeError> {
        match &self.data {
            Some(raw) => serde_json::from_str(raw.get())
                .map_err(|e| EnvelopeError::InvalidData(e.to_string())),
            None => Ok(Value::Null),
        }
    }
}

/// The body is not a GraphQL response in either shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("malformed response ({canonical}; extended shape: {extended}): {snippet}")]
    Malformed {
        canonical: String,
        extended: String,
        snippet: String,
    },

    #[error("invalid response data: {0}")]
    InvalidData(String),
}

#[derive(Deserialize)]
struct CanonicalBody {
    #[serde(default)]
    data: Option<Box<RawValue>>,
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<GraphQLError>,
    #[serde(default)]
    extensions: Option<Value>,
}

#[derive(Deserialize)]
struct ExtendedBody {
    #[serde(default)]
    data: Option<Box<RawValue>>,
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<ExtendedError>,
    #[serde(default)]
    extensions: Option<Value>,
}

/// Parses a response body, trying the canonical error shape first.
pub fn normalize(body: &[u8]) -> Result<Envelope, EnvelopeError> {
    let canonical = match serde_json::from_slice::<CanonicalBody>(body) {
        Ok(parsed) => {
            return Ok(Envelope {
                data: parsed.data,
                errors: GraphQLErrors(parsed.errors),
                extensions: parsed.extensions,
                shape: ErrorShape::Canonical,
            })
        }
        Err(e) => e,
    };

    match serde_json::from_slice::<ExtendedBody>(body) {
        Ok(parsed) => {
            warn!(
                "Response errors use the extended shape ({} records), converting",
                parsed.errors.len()
            );
            Ok(Envelope {
                data: parsed.data,
                errors: ExtendedErrors(parsed.errors).into_canonical(),
                extensions: parsed.extensions,
                shape: ErrorShape::Extended,
            })
        }
        Err(extended) => Err(EnvelopeError::Malformed {
            canonical: canonical.to_string(),
            extended: extended.to_string(),
            snippet: body_snippet(body, SNIPPET_LIMIT),
        }),
    }
}

/// Lossy UTF-8 prefix of `body`, at most `limit` bytes, marked when cut.
pub fn body_snippet(body: &[u8], limit: usize) -> String {
    if body.len() <= limit {
        return String::from_utf8_lossy(body).into_owned();
    }
    let mut snippet = String::from_utf8_lossy(&body[..limit]).into_owned();
    snippet.push_str("...");
    snippet
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_error() {
        let envelope = normalize(
            br#"{"errors":[{"message":"boom","locations":[{"line":1,"column":3}]}]}"#,
        )
        .unwrap();

        assert_eq!(envelope.shape, ErrorShape::Canonical);
        assert_eq!(envelope.errors.len(), 1);
        assert_eq!(envelope.errors[0].message, "boom");
        assert_eq!(envelope.errors[0].locations, [Location { line: 1, column: 3 }]);
        assert_eq!(envelope.errors.to_string(), "boom");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_extended_error_splits_tokens() {
        let envelope = normalize(br#"{"errors":[{"message":["a","b"],"locations":[]}]}"#).unwrap();

        assert_eq!(envelope.shape, ErrorShape::Extended);
        let messages: Vec<_> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["a", "b"]);
    }

    #[test]
    fn test_extended_keeps_per_record_locations() {
        let errors: ExtendedErrors = serde_json::from_value(json!([
            { "message": ["x", 42, { "k": true }], "locations": [{ "line": 2, "column": 1 }] },
            { "message": [], "locations": null, "path": ["hero", 0] },
        ]))
        .unwrap();

        assert_eq!(errors.to_string(), "x;42;{\"k\":true}");

        let canonical = errors.into_canonical();
        let messages: Vec<_> = canonical.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["x", "42", "{\"k\":true}", ""]);
        assert_eq!(canonical[1].locations, [Location { line: 2, column: 1 }]);
        assert!(canonical[3].locations.is_empty());
        assert_eq!(canonical[3].path, Some(vec![json!("hero"), json!(0)]));
    }

    #[test]
    fn test_no_errors() {
        let envelope = normalize(br#"{"data":{"me":{"name":"Luke"}},"errors":null}"#).unwrap();

        assert!(envelope.errors.is_empty());
        assert_eq!(
            envelope.data_value().unwrap(),
            json!({ "me": { "name": "Luke" } })
        );
    }

    #[test]
    fn test_null_data() {
        let envelope = normalize(br#"{"data":null}"#).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.data_value().unwrap(), Value::Null);
    }

    #[test]
    fn test_extensions_and_path_preserved() {
        let envelope = normalize(
            br#"{"data":null,"errors":[{"message":"denied","path":["me"],"extensions":{"code":"FORBIDDEN"}}],"extensions":{"cost":3}}"#,
        )
        .unwrap();

        assert_eq!(envelope.extensions, Some(json!({ "cost": 3 })));
        assert_eq!(envelope.errors[0].path, Some(vec![json!("me")]));
        assert_eq!(
            envelope.errors[0].extensions,
            Some(json!({ "code": "FORBIDDEN" }))
        );
    }

    #[test]
    fn test_malformed_body() {
        let err = normalize(b"<html>bad gateway</html>").unwrap_err();
        match err {
            EnvelopeError::Malformed { snippet, .. } => {
                assert_eq!(snippet, "<html>bad gateway</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            normalize(br#"{"errors":"nope"}"#),
            Err(EnvelopeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_body_snippet_truncates() {
        let body = vec![b'a'; 600];
        let snippet = body_snippet(&body, SNIPPET_LIMIT);
        assert_eq!(snippet.len(), SNIPPET_LIMIT + 3);
        assert!(snippet.ends_with("..."));
    }
}
