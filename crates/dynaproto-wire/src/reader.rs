//! The wire reader: turns a byte slice into a stream of field entries.

use std::fmt;

use crate::cursor::Cursor;
use crate::{MAX_FIELD_NUMBER, WireError};

/// How a field's payload is framed on the wire (the low 3 bits of a tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// A single varint.
    Varint = 0,
    /// 8 little-endian bytes.
    Fixed64 = 1,
    /// A varint length followed by that many bytes.
    LengthDelimited = 2,
    /// 4 little-endian bytes.
    Fixed32 = 5,
}

impl WireType {
    /// Returns the 3-bit code written into tags.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WireType {
    type Error = WireError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(WireError::UnknownWireType(other)),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Varint => write!(f, "varint"),
            Self::Fixed64 => write!(f, "fixed64"),
            Self::LengthDelimited => write!(f, "length-delimited"),
            Self::Fixed32 => write!(f, "fixed32"),
        }
    }
}

/// The raw payload of one entry, already framed but not yet interpreted.
///
/// Interpreting it (signed or unsigned, float or integer, text or bytes
/// or nested message) needs the field's descriptor, which the reader
/// doesn't have.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    Varint(u64),
    Fixed64(u64),
    LengthDelimited(&'a [u8]),
    Fixed32(u32),
}

impl Payload<'_> {
    /// The wire type this payload was framed with.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Varint(_) => WireType::Varint,
            Self::Fixed64(_) => WireType::Fixed64,
            Self::LengthDelimited(_) => WireType::LengthDelimited,
            Self::Fixed32(_) => WireType::Fixed32,
        }
    }
}

/// One `(field number, payload)` pair read from the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireEntry<'a> {
    pub field_number: u32,
    pub payload: Payload<'a>,
}

impl WireEntry<'_> {
    /// Shorthand for `self.payload.wire_type()`.
    pub fn wire_type(&self) -> WireType {
        self.payload.wire_type()
    }
}

/// A single-pass iterator over the entries of one encoded message.
///
/// Each call to [`next`](Iterator::next) reads one tag and its payload
/// and advances irreversibly. The reader is not `Clone`: once consumed,
/// the entries are gone. After the first error it yields `None`, so a
/// `for` loop with `?` never sees entries past corruption.
///
/// ```
/// use dynaproto_wire::{Payload, WireReader};
///
/// // field 1 = varint 150
/// let mut reader = WireReader::new(&[0x08, 0x96, 0x01]);
/// let entry = reader.next().unwrap().unwrap();
/// assert_eq!(entry.field_number, 1);
/// assert_eq!(entry.payload, Payload::Varint(150));
/// assert!(reader.next().is_none());
/// ```
#[derive(Debug)]
pub struct WireReader<'a> {
    cursor: Cursor<'a>,
    failed: bool,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over one message's bytes.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(buf),
            failed: false,
        }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Reads the next entry, or `Ok(None)` at the end of input.
    pub fn next_entry(&mut self) -> Result<Option<WireEntry<'a>>, WireError> {
        if self.cursor.is_empty() {
            return Ok(None);
        }

        let tag = self.cursor.read_varint()?;
        let field_number = tag >> 3;
        if field_number == 0 || field_number > u64::from(MAX_FIELD_NUMBER) {
            return Err(WireError::InvalidFieldNumber(field_number));
        }
        let wire_type = WireType::try_from((tag & 0x7) as u8)?;

        let payload = match wire_type {
            WireType::Varint => Payload::Varint(self.cursor.read_varint()?),
            WireType::Fixed64 => Payload::Fixed64(self.cursor.read_fixed64()?),
            WireType::LengthDelimited => {
                Payload::LengthDelimited(self.cursor.read_length_delimited()?)
            }
            WireType::Fixed32 => Payload::Fixed32(self.cursor.read_fixed32()?),
        };

        Ok(Some(WireEntry {
            field_number: field_number as u32,
            payload,
        }))
    }
}

impl<'a> Iterator for WireReader<'a> {
    type Item = Result<WireEntry<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_entry() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for WireReader<'_> {}
