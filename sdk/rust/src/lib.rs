//! Async GraphQL client for shapeql field trees.
//!
//! A type deriving [`GraphQL`] doubles as the query and the result. The
//! client synthesizes the operation from the type, sends it, normalizes the
//! response errors and decodes `data` back into the value you passed in.
//!
//! ```ignore
//! use shapeql_sdk::{Context, GraphQL, Id, ShapeqlClient, Variables};
//!
//! #[derive(Debug, Default, GraphQL)]
//! struct Human {
//!     name: String,
//!     home_planet: Option<String>,
//! }
//!
//! #[derive(Debug, Default, GraphQL)]
//! struct HumanQuery {
//!     #[graphql(args = "id: $id")]
//!     human: Option<Human>,
//! }
//!
//! let client = ShapeqlClient::new("http://localhost:4000/graphql");
//! let mut query = HumanQuery::default();
//! let vars = Variables::new().set("id", &Id::from("1000"));
//!
//! client.query(&Context::background(), &mut query, &vars).await?;
//! ```
//!
//! Server-reported errors come back as [`SdkError::GraphQL`] after `data` has
//! been decoded, so partial results are still in the target.

pub mod client;
pub mod context;
pub mod error;
pub mod transport;

pub use client::{ClientConfig, RawResponse, ShapeqlClient};
pub use context::{CancelHandle, Context};
pub use error::{ErrorCode, SdkError, SdkResult};
pub use transport::{
    HttpResponse, HttpTransport, HyperTransport, TransportError, DEFAULT_MAX_BODY,
};

pub use shapeql_core::{
    DecodeOptions, FormatOptions, GraphQL, GraphQLError, GraphQLErrors, GraphQLScalar, Id,
    InputObject, Location, OperationKind, Variables,
};
