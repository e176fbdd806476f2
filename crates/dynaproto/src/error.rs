//! Unified error type for Dynaproto.

use dynaproto_codec::{DecodeError, EncodeError};
use dynaproto_schema::SchemaError;
use dynaproto_wire::WireError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts layer errors automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DynaprotoError {
    /// Malformed bytes (runaway varint, overrunning length, bad wire type).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The descriptor set is invalid, or a type name is unknown.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Decoding a message failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The input doesn't fit the message type.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}
