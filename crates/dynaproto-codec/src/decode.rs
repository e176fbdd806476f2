//! The decode engine: wire bytes → [`Message`].

use dynaproto_schema::{FieldDescriptor, FieldType, MessageDescriptor, Registry};
use dynaproto_wire::{Cursor, Payload, WireReader, WireType, zigzag_decode32, zigzag_decode64};
use tracing::trace;

use crate::{CodecConfig, DecodeError, FieldNames, Message, Utf8Policy, Value};

/// Decodes messages against the descriptors of one registry.
///
/// The decoder borrows the registry and owns nothing else worth sharing,
/// so build one per call site or per request; both are cheap.
#[derive(Debug, Clone)]
pub struct Decoder<'r> {
    registry: &'r Registry,
    config: CodecConfig,
}

impl<'r> Decoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: &'r Registry, config: CodecConfig) -> Self {
        Self {
            registry,
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Decodes `bytes` as one `descriptor` message.
    ///
    /// Fields not in the descriptor are skipped. So are known fields that
    /// arrive with the wrong wire type. Singular fields keep the last
    /// value seen; repeated fields collect every value in wire order,
    /// packed or not.
    ///
    /// # Errors
    /// - [`DecodeError::Wire`] if the bytes are malformed
    /// - [`DecodeError::NestingTooDeep`] past `max_depth` nested messages
    /// - [`DecodeError::InvalidUtf8`] under [`Utf8Policy::Strict`]
    pub fn decode(
        &self,
        descriptor: &MessageDescriptor,
        bytes: &[u8],
    ) -> Result<Message, DecodeError> {
        self.decode_message(descriptor, bytes, 0)
    }

    fn decode_message(
        &self,
        descriptor: &MessageDescriptor,
        bytes: &[u8],
        depth: usize,
    ) -> Result<Message, DecodeError> {
        if depth > self.config.max_depth {
            return Err(DecodeError::NestingTooDeep {
                max_depth: self.config.max_depth,
            });
        }

        let mut message = Message::new();
        for entry in WireReader::new(bytes) {
            let entry = entry?;
            let Some(field) = descriptor.field(entry.field_number) else {
                trace!(
                    message_type = descriptor.full_name(),
                    field_number = entry.field_number,
                    wire_type = %entry.wire_type(),
                    "skipping unknown field"
                );
                continue;
            };
            let key = self.key(field);

            if field.is_repeated() {
                match entry.payload {
                    Payload::LengthDelimited(packed) if field.field_type().is_packable() => {
                        for value in self.unpack(field, packed)? {
                            message.push(key, value);
                        }
                    }
                    payload => {
                        if let Some(value) = self.field_value(field, payload, depth)? {
                            message.push(key, value);
                        }
                    }
                }
            } else if let Some(value) = self.field_value(field, entry.payload, depth)? {
                message.insert(key, value);
            }
        }
        Ok(message)
    }

    fn key<'f>(&self, field: &'f FieldDescriptor) -> &'f str {
        match self.config.field_names {
            FieldNames::Proto => field.name(),
            FieldNames::Json => field.json_name(),
        }
    }

    /// Splits a packed payload into individual values.
    fn unpack(&self, field: &FieldDescriptor, packed: &[u8]) -> Result<Vec<Value>, DecodeError> {
        let mut cursor = Cursor::new(packed);
        let mut values = Vec::new();
        while !cursor.is_empty() {
            let payload = match field.wire_type() {
                WireType::Varint => Payload::Varint(cursor.read_varint()?),
                WireType::Fixed32 => Payload::Fixed32(cursor.read_fixed32()?),
                WireType::Fixed64 => Payload::Fixed64(cursor.read_fixed64()?),
                // Not packable; callers check first.
                WireType::LengthDelimited => break,
            };
            // Packed scalars never nest, so depth is irrelevant here.
            if let Some(value) = self.field_value(field, payload, 0)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Converts one payload according to the field's declared type.
    /// Returns `None` when the payload's wire type doesn't fit the field.
    fn field_value(
        &self,
        field: &FieldDescriptor,
        payload: Payload<'_>,
        depth: usize,
    ) -> Result<Option<Value>, DecodeError> {
        let value = match (field.field_type(), payload) {
            (FieldType::Int32, Payload::Varint(v)) => Value::Int(i64::from(v as i32)),
            (FieldType::Int64, Payload::Varint(v)) => Value::Int(v as i64),
            (FieldType::Uint32, Payload::Varint(v)) => Value::UInt(u64::from(v as u32)),
            (FieldType::Uint64, Payload::Varint(v)) => Value::UInt(v),
            (FieldType::Sint32, Payload::Varint(v)) => {
                Value::Int(i64::from(zigzag_decode32(v as u32)))
            }
            (FieldType::Sint64, Payload::Varint(v)) => Value::Int(zigzag_decode64(v)),
            (FieldType::Bool, Payload::Varint(v)) => Value::Bool(v != 0),
            (FieldType::Enum(name), Payload::Varint(v)) => self.enum_value(name, v as i32),

            (FieldType::Fixed32, Payload::Fixed32(v)) => Value::UInt(u64::from(v)),
            (FieldType::Sfixed32, Payload::Fixed32(v)) => Value::Int(i64::from(v as i32)),
            (FieldType::Float, Payload::Fixed32(v)) => Value::Float(f64::from(f32::from_bits(v))),

            (FieldType::Fixed64, Payload::Fixed64(v)) => Value::UInt(v),
            (FieldType::Sfixed64, Payload::Fixed64(v)) => Value::Int(v as i64),
            (FieldType::Double, Payload::Fixed64(v)) => Value::Float(f64::from_bits(v)),

            (FieldType::String, Payload::LengthDelimited(bytes)) => self.text(field, bytes)?,
            (FieldType::Bytes, Payload::LengthDelimited(bytes)) => Value::Bytes(bytes.to_vec()),
            (FieldType::Message(name), Payload::LengthDelimited(bytes)) => {
                let nested = self
                    .registry
                    .message_type(name)
                    .map_err(|_| DecodeError::UnknownType(name.clone()))?;
                Value::Message(self.decode_message(nested, bytes, depth + 1)?)
            }

            (field_type, payload) => {
                trace!(
                    field = field.name(),
                    expected = %field_type.wire_type(),
                    actual = %payload.wire_type(),
                    "skipping field with mismatched wire type"
                );
                return Ok(None);
            }
        };
        Ok(Some(value))
    }

    fn enum_value(&self, enum_name: &str, number: i32) -> Value {
        if self.config.enums_as_names {
            let name = self
                .registry
                .enum_type(enum_name)
                .ok()
                .and_then(|e| e.name_of(number));
            if let Some(name) = name {
                return Value::String(name.to_string());
            }
        }
        Value::Enum(number)
    }

    fn text(&self, field: &FieldDescriptor, bytes: &[u8]) -> Result<Value, DecodeError> {
        match self.config.utf8 {
            Utf8Policy::Permissive => Ok(match String::from_utf8(bytes.to_vec()) {
                Ok(s) => Value::String(s),
                Err(invalid) => Value::Bytes(invalid.into_bytes()),
            }),
            Utf8Policy::Lossy => Ok(Value::String(String::from_utf8_lossy(bytes).into_owned())),
            Utf8Policy::Strict => std::str::from_utf8(bytes)
                .map(|s| Value::String(s.to_string()))
                .map_err(|_| DecodeError::InvalidUtf8 {
                    field: field.name().to_string(),
                }),
        }
    }
}

/// Decodes with the default configuration.
pub fn decode(
    registry: &Registry,
    descriptor: &MessageDescriptor,
    bytes: &[u8],
) -> Result<Message, DecodeError> {
    Decoder::new(registry).decode(descriptor, bytes)
}
