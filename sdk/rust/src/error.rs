//! Error types for the shapeql client.
//!
//! Every failure maps to a typed [`ErrorCode`] so callers can branch on the
//! class of failure without matching variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use shapeql_core::{DecodeError, EnvelopeError, GraphQLErrors, SynthesisError};
use thiserror::Error;

use crate::transport::TransportError;

/// Typed error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Request construction
    InvalidTemplate,
    SerializeError,

    // Network errors
    InvalidUrl,
    NetworkError,
    ConnectionRefused,
    Timeout,
    Cancelled,

    // Protocol errors
    HttpError,
    InvalidResponse,
    DecodeError,

    // Server-reported
    #[serde(rename = "GRAPHQL_ERROR")]
    GraphQLError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTemplate => "INVALID_TEMPLATE",
            Self::SerializeError => "SERIALIZE_ERROR",
            Self::InvalidUrl => "INVALID_URL",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::HttpError => "HTTP_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::DecodeError => "DECODE_ERROR",
            Self::GraphQLError => "GRAPHQL_ERROR",
        }
    }

    /// Returns true if this is a retryable error.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::ConnectionRefused
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed client call.
#[derive(Error, Debug, Clone)]
pub enum SdkError {
    /// The field tree can't be rendered as a document.
    #[error(transparent)]
    InvalidTemplate(#[from] SynthesisError),

    #[error("failed to serialize request: {0}")]
    Serialize(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-2xx status. `body` is truncated.
    #[error("non-2xx status code: {status} body: {body:?}")]
    HttpStatus {
        status: u16,
        reason: Option<String>,
        body: String,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out")]
    Timeout,

    /// The body is not a GraphQL response.
    #[error(transparent)]
    ResponseDecode(#[from] EnvelopeError),

    /// `data` doesn't fit the field tree.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The server reported errors. `data` was still decoded.
    #[error(transparent)]
    GraphQL(#[from] GraphQLErrors),
}

impl SdkError {
    /// Returns the typed code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTemplate(_) => ErrorCode::InvalidTemplate,
            Self::Serialize(_) => ErrorCode::SerializeError,
            Self::Transport(TransportError::InvalidUrl { .. } | TransportError::UnsupportedScheme(_)) => {
                ErrorCode::InvalidUrl
            }
            Self::Transport(TransportError::Connect(_)) => ErrorCode::ConnectionRefused,
            Self::Transport(_) => ErrorCode::NetworkError,
            Self::HttpStatus { .. } => ErrorCode::HttpError,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Timeout => ErrorCode::Timeout,
            Self::ResponseDecode(_) => ErrorCode::InvalidResponse,
            Self::Decode(_) => ErrorCode::DecodeError,
            Self::GraphQL(_) => ErrorCode::GraphQLError,
        }
    }

    /// Returns true if repeating the call may succeed.
    ///
    /// Server-side HTTP failures (5xx, 429) count as retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            other => other.code().is_retryable(),
        }
    }

    /// Returns true if the caller's context ended the call.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout)
    }

    /// The server-reported errors, if that is what this is.
    pub fn graphql_errors(&self) -> Option<&GraphQLErrors> {
        match self {
            Self::GraphQL(errors) => Some(errors),
            _ => None,
        }
    }
}

impl Serialize for SdkError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let errors = self.graphql_errors();
        let mut state =
            serializer.serialize_struct("SdkError", if errors.is_some() { 3 } else { 2 })?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("message", &self.to_string())?;
        if let Some(errors) = errors {
            state.serialize_field("errors", errors)?;
        }
        state.end()
    }
}

/// Type alias for SDK results.
pub type SdkResult<T> = std::result::Result<T, SdkError>;
