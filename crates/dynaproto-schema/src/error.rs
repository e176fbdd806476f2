//! Error types for the schema layer.

use dynaproto_wire::WireError;

/// Errors that can occur while building or querying a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The descriptor set is malformed or internally inconsistent.
    ///
    /// Fatal to registry construction: no partially built registry is
    /// ever returned.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// No message or enum with this qualified name is registered.
    #[error("unknown type: {0}")]
    UnknownType(String),
}

/// Corrupt descriptor-set bytes are a schema problem, not a wire problem,
/// from the caller's point of view.
impl From<WireError> for SchemaError {
    fn from(err: WireError) -> Self {
        Self::InvalidSchema(format!("malformed descriptor set: {err}"))
    }
}
