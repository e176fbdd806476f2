//! Error types for the wire layer.
//!
//! Everything here means the input bytes are corrupt or adversarial.
//! Malformed binary input is never transiently malformed, so callers
//! should report these errors rather than retry.

/// Errors that can occur while reading wire-format bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A varint ran past 10 bytes, or the input ended mid-varint.
    #[error("malformed varint")]
    MalformedVarint,

    /// A length prefix or fixed-width payload needs more bytes than remain.
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        /// Bytes the payload declared.
        needed: usize,
        /// Bytes actually left in the input.
        remaining: usize,
    },

    /// The low 3 bits of a tag are not one of 0, 1, 2 or 5.
    ///
    /// Groups (3 and 4) are deprecated and not supported.
    #[error("unknown wire type {0}")]
    UnknownWireType(u8),

    /// A tag carried field number 0, or one above the 29-bit maximum.
    #[error("invalid field number {0}")]
    InvalidFieldNumber(u64),
}
