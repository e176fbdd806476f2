//! Wire-format primitives for Dynaproto.
//!
//! This crate knows how bytes are framed on the wire and nothing about
//! what they mean:
//!
//! - **Varints** ([`encode_varint`], [`decode_varint`], zig-zag helpers)
//! - **Reading** ([`WireReader`]): a single-pass iterator of
//!   `(field number, payload)` entries over a borrowed slice
//! - **Writing** ([`WireWriter`]): accumulates tag/payload pairs in
//!   ascending or declaration [`FieldOrder`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Codec (above)   ← interprets payloads using message descriptors
//!     ↕
//! Wire (this crate)   ← tags, varints, lengths, fixed-width values
//! ```

mod cursor;
mod error;
mod reader;
mod varint;
mod writer;

pub use cursor::Cursor;
pub use error::WireError;
pub use reader::{Payload, WireEntry, WireReader, WireType};
pub use varint::{
    MAX_VARINT_LEN, decode_varint, encode_varint, encoded_len, zigzag_decode32,
    zigzag_decode64, zigzag_encode32, zigzag_encode64,
};
pub use writer::{FieldOrder, PackedBuffer, WireWriter};

/// The largest field number a tag can carry (`2^29 - 1`).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
