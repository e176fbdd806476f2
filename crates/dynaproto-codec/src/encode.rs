//! The encode engine: [`Message`] → wire bytes.

use dynaproto_schema::{FieldDescriptor, FieldType, MessageDescriptor, Registry};
use dynaproto_wire::{PackedBuffer, WireWriter, zigzag_encode32, zigzag_encode64};
use tracing::trace;

use crate::coerce::{to_bool, to_enum, to_f64, to_i64, to_text, to_u64};
use crate::{CodecConfig, EncodeError, Message, Value};

/// A coerced scalar, ready to be written.
enum Scalar {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
}

/// Encodes messages against the descriptors of one registry.
#[derive(Debug, Clone)]
pub struct Encoder<'r> {
    registry: &'r Registry,
    config: CodecConfig,
}

impl<'r> Encoder<'r> {
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

    /// Encodes `message` as a `descriptor` message.
    ///
    /// Each input key is matched against the field's proto name, then its
    /// JSON name. Keys matching no field are ignored, and so are fields
    /// set to [`Value::Null`]. Nothing is written for absent fields.
    ///
    /// # Errors
    /// Any [`EncodeError`]. The first failing field aborts the whole call.
    pub fn encode(
        &self,
        descriptor: &MessageDescriptor,
        message: &Message,
    ) -> Result<Vec<u8>, EncodeError> {
        self.encode_message(descriptor, message, 0)
    }

    /// Like [`encode`](Self::encode), for input that is a [`Value`]; it
    /// must be a [`Value::Message`].
    pub fn encode_value(
        &self,
        descriptor: &MessageDescriptor,
        value: &Value,
    ) -> Result<Vec<u8>, EncodeError> {
        match value {
            Value::Message(message) => self.encode(descriptor, message),
            _ => Err(EncodeError::NotAMessage {
                field: descriptor.full_name().to_string(),
            }),
        }
    }

    fn encode_message(
        &self,
        descriptor: &MessageDescriptor,
        message: &Message,
        depth: usize,
    ) -> Result<Vec<u8>, EncodeError> {
        if depth > self.config.max_depth {
            return Err(EncodeError::NestingTooDeep {
                max_depth: self.config.max_depth,
            });
        }

        for key in message.keys() {
            if descriptor.field_by_name(key).is_none() {
                trace!(message_type = descriptor.full_name(), key, "ignoring unknown input key");
            }
        }

        // Declaration order in, and the writer reorders when asked to.
        let mut w = WireWriter::new(self.config.field_order);
        for field in descriptor.fields() {
            let value = message
                .get(field.name())
                .or_else(|| message.get(field.json_name()));
            match value {
                None | Some(Value::Null) => {}
                Some(value) if field.is_repeated() => {
                    self.write_repeated(&mut w, field, value, depth)?;
                }
                Some(value) => self.write_single(&mut w, field, value, depth)?,
            }
        }
        Ok(w.finish())
    }

    fn write_repeated(
        &self,
        w: &mut WireWriter,
        field: &FieldDescriptor,
        value: &Value,
        depth: usize,
    ) -> Result<(), EncodeError> {
        let Value::List(items) = value else {
            return Err(EncodeError::NotARepeatedField {
                field: field.name().to_string(),
            });
        };
        // Null elements are skipped, like null fields.
        let items = items.iter().filter(|item| !item.is_null());

        let packable = field.field_type().is_packable();
        if packable && (field.is_packed() || self.config.pack_repeated) {
            let mut packed = PackedBuffer::new();
            for item in items {
                match self.scalar(field, item)? {
                    Scalar::Varint(v) => packed.push_varint(v),
                    Scalar::Fixed32(v) => packed.push_fixed32(v),
                    Scalar::Fixed64(v) => packed.push_fixed64(v),
                }
            }
            if !packed.is_empty() {
                w.write_bytes(field.number(), packed.as_slice());
            }
        } else {
            for item in items {
                self.write_single(w, field, item, depth)?;
            }
        }
        Ok(())
    }

    fn write_single(
        &self,
        w: &mut WireWriter,
        field: &FieldDescriptor,
        value: &Value,
        depth: usize,
    ) -> Result<(), EncodeError> {
        let number = field.number();
        match field.field_type() {
            FieldType::String | FieldType::Bytes => {
                w.write_bytes(number, &to_text(value, field.name())?);
            }
            FieldType::Message(name) => {
                let Value::Message(nested) = value else {
                    return Err(EncodeError::NotAMessage {
                        field: field.name().to_string(),
                    });
                };
                let descriptor = self
                    .registry
                    .message_type(name)
                    .map_err(|_| EncodeError::UnknownType(name.clone()))?;
                let bytes = self.encode_message(descriptor, nested, depth + 1)?;
                w.write_bytes(number, &bytes);
            }
            _ => match self.scalar(field, value)? {
                Scalar::Varint(v) => w.write_varint(number, v),
                Scalar::Fixed32(v) => w.write_fixed32(number, v),
                Scalar::Fixed64(v) => w.write_fixed64(number, v),
            },
        }
        Ok(())
    }

    /// Coerces a value for a numeric, bool, or enum field.
    fn scalar(&self, field: &FieldDescriptor, value: &Value) -> Result<Scalar, EncodeError> {
        let scalar = match field.field_type() {
            // Negative int32 values are sign-extended to ten bytes.
            FieldType::Int32 => Scalar::Varint(i64::from(to_i64(value) as i32) as u64),
            FieldType::Int64 => Scalar::Varint(to_i64(value) as u64),
            FieldType::Uint32 => Scalar::Varint(u64::from(to_u64(value) as u32)),
            FieldType::Uint64 => Scalar::Varint(to_u64(value)),
            FieldType::Sint32 => {
                Scalar::Varint(u64::from(zigzag_encode32(to_i64(value) as i32)))
            }
            FieldType::Sint64 => Scalar::Varint(zigzag_encode64(to_i64(value))),
            FieldType::Bool => Scalar::Varint(u64::from(to_bool(value))),
            FieldType::Enum(name) => {
                let enumeration = self
                    .registry
                    .enum_type(name)
                    .map_err(|_| EncodeError::UnknownType(name.clone()))?;
                let number = to_enum(value, enumeration, field.name())?;
                Scalar::Varint(i64::from(number) as u64)
            }
            FieldType::Fixed32 => Scalar::Fixed32(to_u64(value) as u32),
            FieldType::Sfixed32 => Scalar::Fixed32(to_i64(value) as i32 as u32),
            FieldType::Float => Scalar::Fixed32((to_f64(value) as f32).to_bits()),
            FieldType::Fixed64 => Scalar::Fixed64(to_u64(value)),
            FieldType::Sfixed64 => Scalar::Fixed64(to_i64(value) as u64),
            FieldType::Double => Scalar::Fixed64(to_f64(value).to_bits()),
            FieldType::String | FieldType::Bytes | FieldType::Message(_) => {
                return Err(EncodeError::NotAScalar {
                    field: field.name().to_string(),
                });
            }
        };
        Ok(scalar)
    }
}

/// Encodes with the default configuration.
pub fn encode(
    registry: &Registry,
    descriptor: &MessageDescriptor,
    message: &Message,
) -> Result<Vec<u8>, EncodeError> {
    Encoder::new(registry).encode(descriptor, message)
}

#[cfg(test)]
mod tests {
    use dynaproto_schema::bootstrap::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
        TYPE_DOUBLE, TYPE_INT32, TYPE_SINT64, TYPE_STRING,
    };
    use dynaproto_wire::FieldOrder;

    use super::*;

    fn registry() -> Registry {
        let file = FileDescriptorProto::new("t.proto", "t").with_message(
            DescriptorProto::new("M")
                .with_field(FieldDescriptorProto::new("b", 2, TYPE_STRING))
                .with_field(FieldDescriptorProto::new("a", 1, TYPE_INT32))
                .with_field(FieldDescriptorProto::new("nums", 3, TYPE_INT32).repeated())
                .with_field(FieldDescriptorProto::new("delta", 4, TYPE_SINT64))
                .with_field(FieldDescriptorProto::new("ratio", 5, TYPE_DOUBLE)),
        );
        Registry::from_descriptor_set(&FileDescriptorSet::new([file])).unwrap()
    }

    #[test]
    fn test_ascending_order_by_default() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let msg = Message::new().with("a", 1).with("b", "x");
        assert_eq!(
            encode(&reg, m, &msg).unwrap(),
            [0x08, 0x01, 0x12, 0x01, b'x']
        );
    }

    #[test]
    fn test_declaration_order_when_configured() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let msg = Message::new().with("a", 1).with("b", "x");
        let config = CodecConfig::default().with_field_order(FieldOrder::Declaration);
        assert_eq!(
            Encoder::with_config(&reg, config).encode(m, &msg).unwrap(),
            [0x12, 0x01, b'x', 0x08, 0x01]
        );
    }

    #[test]
    fn test_negative_int32_takes_ten_bytes() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let bytes = encode(&reg, m, &Message::new().with("a", -1)).unwrap();
        assert_eq!(bytes.len(), 11);
        assert_eq!(bytes[0], 0x08);
    }

    #[test]
    fn test_sint64_uses_zigzag() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let bytes = encode(&reg, m, &Message::new().with("delta", -2)).unwrap();
        assert_eq!(bytes, [0x20, 0x03]);
    }

    #[test]
    fn test_repeated_unpacked_then_packed() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let msg = Message::new().with("nums", vec![Value::Int(1), Value::Null, Value::Int(2)]);

        assert_eq!(encode(&reg, m, &msg).unwrap(), [0x18, 0x01, 0x18, 0x02]);

        let config = CodecConfig::default().with_packed_repeated(true);
        assert_eq!(
            Encoder::with_config(&reg, config).encode(m, &msg).unwrap(),
            [0x1a, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn test_empty_list_writes_nothing() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let config = CodecConfig::default().with_packed_repeated(true);
        let msg = Message::new().with("nums", Vec::<Value>::new());
        assert!(Encoder::with_config(&reg, config).encode(m, &msg).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_keys_and_nulls_are_ignored() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let msg = Message::new().with("nope", 9).with("a", Value::Null);
        assert!(encode(&reg, m, &msg).unwrap().is_empty());
    }

    #[test]
    fn test_double_is_little_endian() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let bytes = encode(&reg, m, &Message::new().with("ratio", 1.5)).unwrap();
        let mut expected = vec![0x29];
        expected.extend_from_slice(&1.5f64.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_top_level_value_must_be_a_message() {
        let reg = registry();
        let m = reg.message_type("t.M").unwrap();
        let err = Encoder::new(&reg).encode_value(m, &Value::Int(3)).unwrap_err();
        assert_eq!(err, EncodeError::NotAMessage { field: "t.M".into() });
    }
}
