//! A forward-only read position over a borrowed byte slice.

use crate::WireError;
use crate::varint::{decode_varint, zigzag_decode32, zigzag_decode64};

/// Reads primitive wire values from a byte slice, advancing as it goes.
///
/// Every read either consumes exactly the bytes it returns or fails
/// without moving. Slices handed out borrow from the original input, so
/// nothing is copied until the caller decides to keep a value.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Starts reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns `true` once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads one varint as an unsigned 64-bit value.
    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        let (value, used) = decode_varint(&self.buf[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Reads a varint and zig-zag decodes it as `sint32`.
    ///
    /// The varint is truncated to 32 bits first.
    pub fn read_zigzag32(&mut self) -> Result<i32, WireError> {
        Ok(zigzag_decode32(self.read_varint()? as u32))
    }

    /// Reads a varint and zig-zag decodes it as `sint64`.
    pub fn read_zigzag64(&mut self) -> Result<i64, WireError> {
        Ok(zigzag_decode64(self.read_varint()?))
    }

    /// Reads 4 little-endian bytes.
    pub fn read_fixed32(&mut self) -> Result<u32, WireError> {
        let bytes = self.read_array::<4>()?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads 8 little-endian bytes.
    pub fn read_fixed64(&mut self) -> Result<u64, WireError> {
        let bytes = self.read_array::<8>()?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Reads exactly `len` bytes as a borrowed slice.
    ///
    /// # Errors
    /// [`WireError::TruncatedInput`] if fewer than `len` bytes remain.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(WireError::TruncatedInput {
                needed: len,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads a varint length prefix followed by that many bytes.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], WireError> {
        let start = self.pos;
        let len = self.read_varint()?;
        // A length that doesn't even fit in usize can't fit in memory.
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        self.read_slice(len).inspect_err(|_| self.pos = start)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let slice = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}
