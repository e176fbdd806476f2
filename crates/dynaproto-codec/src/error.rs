//! Error types for the decode and encode engines.
//!
//! Decode errors mean the bytes are corrupt or hostile. Encode errors mean
//! the caller's input doesn't fit the schema. Either way the whole call
//! fails: no partially decoded message or half-written buffer escapes.

use dynaproto_wire::WireError;

/// Errors that can occur while decoding bytes into a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The bytes themselves are malformed: a runaway varint, a length that
    /// overruns the input, or a group/unknown wire type.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Nested messages went deeper than the configured limit.
    #[error("message nesting exceeds maximum depth of {max_depth}")]
    NestingTooDeep { max_depth: usize },

    /// A field refers to a type the registry doesn't have.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A string field held invalid UTF-8 under [`Utf8Policy::Strict`](crate::Utf8Policy::Strict).
    #[error("field '{field}' is not valid UTF-8")]
    InvalidUtf8 { field: String },
}

/// Errors that can occur while encoding a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// An enum field was given a name or number the enum doesn't declare.
    #[error("field '{field}': {value} is not a value of enum {enum_type}")]
    UnknownEnumValue {
        field: String,
        enum_type: String,
        value: String,
    },

    /// A message field was given something other than a message.
    #[error("field '{field}' expects a message")]
    NotAMessage { field: String },

    /// A repeated field was given something other than a list.
    #[error("field '{field}' is repeated and expects a list")]
    NotARepeatedField { field: String },

    /// A string or bytes field was given a list or a message.
    #[error("field '{field}' expects a scalar value")]
    NotAScalar { field: String },

    /// Nested messages went deeper than the configured limit.
    #[error("message nesting exceeds maximum depth of {max_depth}")]
    NestingTooDeep { max_depth: usize },

    /// A field refers to a type the registry doesn't have.
    #[error("unknown type: {0}")]
    UnknownType(String),
}
