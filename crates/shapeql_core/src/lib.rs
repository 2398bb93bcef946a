//! Core of the shapeql GraphQL client.
//!
//! A Rust type deriving [`GraphQL`] is both the query template and the
//! decode target. This crate provides:
//! - `descriptor`: the field-tree model the derives generate
//! - `synthesize`: operation documents built from descriptors
//! - `decode`: descriptor-driven decoding of `data`
//! - `envelope`: response parsing and error normalization
//! - `input` / `variables`: variables and their inferred input types
//! - `diagnostics`: tolerated failures

extern crate self as shapeql_core;

pub mod decode;
pub mod descriptor;
pub mod diagnostics;
pub mod envelope;
pub mod input;
pub mod scalar;
pub mod synthesize;
pub mod variables;

pub use decode::{
    decode, DecodeError, DecodeErrorKind, DecodeOptions, DecodeReport, Decoder, PathSegment,
    ResponsePath,
};
pub use descriptor::{
    FieldDescriptor, FieldType, ObjectShape, OperationKind, Polymorphic, PolymorphicShape,
    ScalarKind, Selection, TypeRef, VariantShape,
};
pub use diagnostics::{Diagnostic, DiagnosticBag};
pub use envelope::{
    body_snippet, normalize, Envelope, EnvelopeError, ErrorShape, ExtendedError, ExtendedErrors,
    GraphQLError, GraphQLErrors, Location,
};
pub use input::{InputType, InputValue};
pub use scalar::Id;
pub use shapeql_macros::{GraphQL, GraphQLScalar, InputObject};
pub use synthesize::{
    synthesize, Document, FormatOptions, SynthesisError, Synthesizer, VariableDeclaration,
};
pub use variables::{Variable, VariableError, Variables};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
