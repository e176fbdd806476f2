//! Base-128 variable-length integers.
//!
//! A varint stores 7 bits per byte, least significant group first. The
//! high bit of each byte is the continuation flag: set means "more bytes
//! follow". A `u64` needs at most 10 bytes.
//!
//! ```text
//! 300 = 0b1_0010_1100
//!     → [0b1010_1100, 0b0000_0010]
//!        ^ more       ^ last
//! ```
//!
//! Signed types that are expected to be negative use zig-zag encoding
//! first, which maps small magnitudes (of either sign) to small unsigned
//! values: `0 → 0, -1 → 1, 1 → 2, -2 → 3, ...`.

use crate::WireError;

/// The longest valid varint, in bytes.
pub const MAX_VARINT_LEN: usize = 10;

/// Appends `value` to `buf` using the minimal number of bytes.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Returns how many bytes [`encode_varint`] writes for `value`.
pub fn encoded_len(value: u64) -> usize {
    // Each byte carries 7 bits; zero still takes one byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decodes one varint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed. Bits beyond the
/// 64th are discarded (two's-complement wraparound), matching how the
/// wire format treats over-long encodings of negative numbers.
///
/// # Errors
/// [`WireError::MalformedVarint`] if the input ends before a terminating
/// byte, or if 10 bytes are consumed without one.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), WireError> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(WireError::MalformedVarint)
}

/// Zig-zag encodes a 32-bit signed integer.
pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Zig-zag encodes a 64-bit signed integer.
pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Reverses [`zigzag_encode32`]: `(n >> 1) ^ -(n & 1)`.
pub fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Reverses [`zigzag_encode64`].
pub fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
