//! The wire writer: accumulates tag/payload pairs into a byte buffer.

use serde::{Deserialize, Serialize};

use crate::reader::WireType;
use crate::varint::{encode_varint, encoded_len};

/// The order in which a [`WireWriter`] emits fields.
///
/// The wire format doesn't mandate an order and every conforming parser
/// accepts either, but byte-level comparisons of two encodings only work
/// when both sides agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrder {
    /// Ascending field number. Repeated entries of one field keep the
    /// order they were written in (the sort is stable).
    #[default]
    Ascending,

    /// Exactly the order the fields were written in. The encode engine
    /// writes fields in descriptor declaration order.
    Declaration,
}

/// One written field: its number and where its bytes live in `buf`.
#[derive(Debug, Clone, Copy)]
struct Span {
    field_number: u32,
    start: usize,
    end: usize,
}

/// Accumulates encoded fields for one message.
///
/// Nested messages are written by encoding them into their own writer
/// and passing the finished bytes to [`write_bytes`](Self::write_bytes).
///
/// ```
/// use dynaproto_wire::{FieldOrder, WireWriter};
///
/// let mut w = WireWriter::new(FieldOrder::Ascending);
/// w.write_bytes(2, b"hi");
/// w.write_varint(1, 150);
/// assert_eq!(w.finish(), [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i']);
/// ```
#[derive(Debug)]
pub struct WireWriter {
    buf: Vec<u8>,
    order: FieldOrder,
    spans: Vec<Span>,
    in_order: bool,
}

impl WireWriter {
    /// Creates an empty writer.
    pub fn new(order: FieldOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
            spans: Vec::new(),
            in_order: true,
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a varint-typed field.
    pub fn write_varint(&mut self, field_number: u32, value: u64) {
        let start = self.write_tag(field_number, WireType::Varint);
        encode_varint(value, &mut self.buf);
        self.close(field_number, start);
    }

    /// Writes a 4-byte little-endian field.
    pub fn write_fixed32(&mut self, field_number: u32, value: u32) {
        let start = self.write_tag(field_number, WireType::Fixed32);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self.close(field_number, start);
    }

    /// Writes an 8-byte little-endian field.
    pub fn write_fixed64(&mut self, field_number: u32, value: u64) {
        let start = self.write_tag(field_number, WireType::Fixed64);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self.close(field_number, start);
    }

    /// Writes a length-delimited field: strings, bytes, nested messages
    /// and packed repeated scalars all share this framing.
    pub fn write_bytes(&mut self, field_number: u32, payload: &[u8]) {
        let start = self.write_tag(field_number, WireType::LengthDelimited);
        encode_varint(payload.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(payload);
        self.close(field_number, start);
    }

    /// Consumes the writer and returns the encoded message.
    pub fn finish(self) -> Vec<u8> {
        if self.order == FieldOrder::Declaration || self.in_order {
            return self.buf;
        }

        let mut spans = self.spans;
        spans.sort_by_key(|span| span.field_number);
        let mut out = Vec::with_capacity(self.buf.len());
        for span in spans {
            out.extend_from_slice(&self.buf[span.start..span.end]);
        }
        out
    }

    fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> usize {
        let start = self.buf.len();
        let tag = (u64::from(field_number) << 3) | u64::from(wire_type.code());
        self.buf.reserve(encoded_len(tag));
        encode_varint(tag, &mut self.buf);
        start
    }

    fn close(&mut self, field_number: u32, start: usize) {
        if let Some(last) = self.spans.last() {
            if field_number < last.field_number {
                self.in_order = false;
            }
        }
        self.spans.push(Span {
            field_number,
            start,
            end: self.buf.len(),
        });
    }
}

/// Appends packed-repeated payload bytes to a scratch buffer.
///
/// Packed fields concatenate their elements with no tags in between;
/// the whole buffer then goes out through [`WireWriter::write_bytes`].
#[derive(Debug, Default)]
pub struct PackedBuffer {
    buf: Vec<u8>,
}

impl PackedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_varint(&mut self, value: u64) {
        encode_varint(value, &mut self.buf);
    }

    pub fn push_fixed32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_fixed64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
