//! End-to-end decode/encode behavior against a unittest-style schema.

#![cfg(feature = "json")]

use dynaproto_codec::{
    CodecConfig, DecodeError, Decoder, EncodeError, Encoder, FieldNames, Message, Value, decode,
    encode,
};
use dynaproto_schema::bootstrap::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet, TYPE_BOOL, TYPE_BYTES, TYPE_DOUBLE, TYPE_FIXED32, TYPE_FIXED64, TYPE_FLOAT,
    TYPE_INT32, TYPE_INT64, TYPE_SFIXED32, TYPE_SFIXED64, TYPE_SINT32, TYPE_SINT64, TYPE_STRING,
    TYPE_UINT32, TYPE_UINT64,
};
use dynaproto_schema::{MessageDescriptor, Registry};
use dynaproto_wire::{FieldOrder, WireError, WireWriter, encode_varint};
use rand::Rng;
use serde_json::json;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn unittest_registry() -> Registry {
    let all_types = DescriptorProto::new("TestAllTypes")
        .with_nested(
            DescriptorProto::new("NestedMessage")
                .with_field(FieldDescriptorProto::new("bb", 1, TYPE_INT32)),
        )
        .with_enum(
            EnumDescriptorProto::new("NestedEnum")
                .with_value("FOO", 1)
                .with_value("BAR", 2)
                .with_value("BAZ", 3)
                .with_value("NEG", -1),
        )
        .with_field(FieldDescriptorProto::new("optional_int32", 1, TYPE_INT32))
        .with_field(FieldDescriptorProto::new("optional_int64", 2, TYPE_INT64))
        .with_field(FieldDescriptorProto::new("optional_uint32", 3, TYPE_UINT32))
        .with_field(FieldDescriptorProto::new("optional_uint64", 4, TYPE_UINT64))
        .with_field(FieldDescriptorProto::new("optional_sint32", 5, TYPE_SINT32))
        .with_field(FieldDescriptorProto::new("optional_sint64", 6, TYPE_SINT64))
        .with_field(FieldDescriptorProto::new("optional_fixed32", 7, TYPE_FIXED32))
        .with_field(FieldDescriptorProto::new("optional_fixed64", 8, TYPE_FIXED64))
        .with_field(FieldDescriptorProto::new("optional_sfixed32", 9, TYPE_SFIXED32))
        .with_field(FieldDescriptorProto::new("optional_sfixed64", 10, TYPE_SFIXED64))
        .with_field(FieldDescriptorProto::new("optional_float", 11, TYPE_FLOAT))
        .with_field(FieldDescriptorProto::new("optional_double", 12, TYPE_DOUBLE))
        .with_field(FieldDescriptorProto::new("optional_bool", 13, TYPE_BOOL))
        .with_field(FieldDescriptorProto::new("optional_string", 14, TYPE_STRING))
        .with_field(FieldDescriptorProto::new("optional_bytes", 15, TYPE_BYTES))
        .with_field(FieldDescriptorProto::message(
            "optional_nested_message",
            18,
            "NestedMessage",
        ))
        .with_field(FieldDescriptorProto::enumeration(
            "optional_nested_enum",
            21,
            "NestedEnum",
        ))
        .with_field(FieldDescriptorProto::new("repeated_int32", 31, TYPE_INT32).repeated())
        .with_field(FieldDescriptorProto::new("repeated_string", 44, TYPE_STRING).repeated())
        .with_field(
            FieldDescriptorProto::message("repeated_nested_message", 48, "NestedMessage")
                .repeated(),
        )
        .with_field(
            FieldDescriptorProto::enumeration("repeated_nested_enum", 51, "NestedEnum")
                .repeated(),
        );

    let nested_all_types = DescriptorProto::new("NestedTestAllTypes")
        .with_field(FieldDescriptorProto::message("child", 1, "NestedTestAllTypes"))
        .with_field(FieldDescriptorProto::message("payload", 2, "TestAllTypes"));

    let unittest = FileDescriptorProto::new("unittest.proto", "protobuf_unittest")
        .with_message(all_types)
        .with_message(nested_all_types);

    let packed = FileDescriptorProto::new("packed.proto", "packed")
        .with_syntax("proto3")
        .with_message(
            DescriptorProto::new("Samples")
                .with_field(FieldDescriptorProto::new("values", 1, TYPE_INT32).repeated())
                .with_field(FieldDescriptorProto::new("weights", 2, TYPE_DOUBLE).repeated()),
        );

    Registry::from_descriptor_set(&FileDescriptorSet::new([unittest, packed])).unwrap()
}

fn all_types(registry: &Registry) -> &MessageDescriptor {
    registry.message_type("protobuf_unittest.TestAllTypes").unwrap()
}

/// JSON object → encode input.
fn input(json: serde_json::Value) -> Message {
    match Value::from(json) {
        Value::Message(message) => message,
        other => panic!("fixture is not an object: {other:?}"),
    }
}

fn encode_decode(registry: &Registry, message: Message) -> Message {
    let descriptor = all_types(registry);
    let bytes = encode(registry, descriptor, &message).unwrap();
    decode(registry, descriptor, &bytes).unwrap()
}

// ===========================================================================
// Round trips
// ===========================================================================

#[test]
fn test_random_scalars_round_trip() {
    let registry = unittest_registry();
    let mut rng = rand::rng();

    for _ in 0..200 {
        let len = rng.random_range(0..24);
        let text: String = (0..len)
            .map(|_| char::from(rng.random_range(b'a'..=b'z')))
            .collect();
        let blob: Vec<u8> = (0..len).map(|_| rng.random()).collect();

        let message = Message::new()
            .with("optional_int32", rng.random::<i32>())
            .with("optional_int64", rng.random::<i64>())
            .with("optional_uint32", rng.random::<u32>())
            .with("optional_uint64", rng.random::<u64>())
            .with("optional_sint32", rng.random::<i32>())
            .with("optional_sint64", rng.random::<i64>())
            .with("optional_fixed32", rng.random::<u32>())
            .with("optional_fixed64", rng.random::<u64>())
            .with("optional_sfixed32", rng.random::<i32>())
            .with("optional_sfixed64", rng.random::<i64>())
            .with("optional_float", rng.random::<f32>() * 1000.0 - 500.0)
            .with("optional_double", rng.random::<f64>() * 1e9 - 5e8)
            .with("optional_bool", rng.random::<bool>())
            .with("optional_string", text)
            .with("optional_bytes", Value::Bytes(blob))
            .with("optional_nested_enum", Value::Enum(rng.random_range(1..=3)));

        assert_eq!(encode_decode(&registry, message.clone()), message);
    }
}

#[test]
fn test_nested_and_repeated_round_trip() {
    let registry = unittest_registry();
    let message = Message::new()
        .with("optional_nested_message", Message::new().with("bb", 118))
        .with(
            "repeated_int32",
            vec![Value::Int(-5), Value::Int(0), Value::Int(7)],
        )
        .with("repeated_string", vec![Value::from("a"), Value::from("")])
        .with(
            "repeated_nested_message",
            vec![
                Value::from(Message::new().with("bb", 1)),
                Value::from(Message::new()),
                Value::from(Message::new().with("bb", 3)),
            ],
        )
        .with(
            "repeated_nested_enum",
            vec![Value::Enum(3), Value::Enum(-1), Value::Enum(3)],
        );

    assert_eq!(encode_decode(&registry, message.clone()), message);
}

#[test]
fn test_varint_boundaries_round_trip() {
    let registry = unittest_registry();
    for value in [0, 127, 128, u64::from(u32::MAX), u64::MAX] {
        let decoded = encode_decode(&registry, Message::new().with("optional_uint64", value));
        assert_eq!(decoded.get("optional_uint64"), Some(&Value::UInt(value)));
    }
    for value in [0, 127, 128, u32::MAX] {
        let decoded = encode_decode(&registry, Message::new().with("optional_uint32", value));
        assert_eq!(decoded.get("optional_uint32"), Some(&Value::UInt(u64::from(value))));
    }
}

#[test]
fn test_unterminated_varint_fails() {
    let registry = unittest_registry();
    // Tag for optional_uint64, then ten continuation bytes.
    let mut bytes = vec![0x20];
    bytes.extend_from_slice(&[0x80; 10]);
    let err = decode(&registry, all_types(&registry), &bytes).unwrap_err();
    assert_eq!(err, DecodeError::Wire(WireError::MalformedVarint));
}

// ===========================================================================
// Forward compatibility
// ===========================================================================

#[test]
fn test_unknown_fields_are_tolerated() {
    let registry = unittest_registry();
    let descriptor = all_types(&registry);

    let mut bytes = encode(
        &registry,
        descriptor,
        &Message::new().with("optional_int32", 42),
    )
    .unwrap();
    // Field 999 in each wire type.
    let mut extra = WireWriter::new(FieldOrder::Declaration);
    extra.write_varint(999, 1);
    extra.write_fixed32(999, 2);
    extra.write_fixed64(999, 3);
    extra.write_bytes(999, b"ignored");
    bytes.extend_from_slice(&extra.finish());

    let decoded = decode(&registry, descriptor, &bytes).unwrap();
    assert_eq!(decoded, Message::new().with("optional_int32", 42));
}

#[test]
fn test_field_number_zero_is_rejected() {
    let registry = unittest_registry();
    let err = decode(&registry, all_types(&registry), &[0x00, 0x01]).unwrap_err();
    assert_eq!(err, DecodeError::Wire(WireError::InvalidFieldNumber(0)));
}

#[test]
fn test_groups_are_rejected() {
    let registry = unittest_registry();
    // Field 1, wire type 3 (start group).
    let err = decode(&registry, all_types(&registry), &[0x0b]).unwrap_err();
    assert_eq!(err, DecodeError::Wire(WireError::UnknownWireType(3)));
}

// ===========================================================================
// Coercion
// ===========================================================================

#[test]
fn test_enum_coercion_by_name() {
    let registry = unittest_registry();
    let decoded = encode_decode(&registry, input(json!({ "optional_nested_enum": "FOO" })));
    assert_eq!(decoded.get("optional_nested_enum"), Some(&Value::Enum(1)));

    let err = encode(
        &registry,
        all_types(&registry),
        &input(json!({ "optional_nested_enum": "NOTAVALUE" })),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        EncodeError::UnknownEnumValue { ref field, ref enum_type, .. }
            if field == "optional_nested_enum"
                && enum_type == "protobuf_unittest.TestAllTypes.NestedEnum"
    ));
}

#[test]
fn test_enum_coercion_by_number() {
    let registry = unittest_registry();
    let decoded = encode_decode(&registry, input(json!({ "optional_nested_enum": -1 })));
    assert_eq!(decoded.get("optional_nested_enum"), Some(&Value::Enum(-1)));

    let err = encode(
        &registry,
        all_types(&registry),
        &input(json!({ "optional_nested_enum": 7 })),
    )
    .unwrap_err();
    assert!(matches!(err, EncodeError::UnknownEnumValue { .. }));
}

#[test]
fn test_undeclared_enum_numbers_survive_decode() {
    let registry = unittest_registry();
    // optional_nested_enum = 9
    let decoded = decode(&registry, all_types(&registry), &[0xa8, 0x01, 0x09]).unwrap();
    assert_eq!(decoded.get("optional_nested_enum"), Some(&Value::Enum(9)));
}

#[test]
fn test_numeric_coercion_from_strings() {
    let registry = unittest_registry();
    let cases = [
        (json!("3"), Some(Value::Int(3))),
        (json!(""), Some(Value::Int(0))),
        (json!("foo"), Some(Value::Int(0))),
        (json!(null), None),
    ];
    for (given, expected) in cases {
        let decoded = encode_decode(&registry, input(json!({ "optionalInt32": given.clone() })));
        assert_eq!(decoded.get("optional_int32").cloned(), expected, "input {given}");
    }
}

#[test]
fn test_message_field_rejects_scalars() {
    let registry = unittest_registry();
    let err = encode(
        &registry,
        all_types(&registry),
        &input(json!({ "optionalNestedMessage": 3 })),
    )
    .unwrap_err();
    assert_eq!(
        err,
        EncodeError::NotAMessage {
            field: "optional_nested_message".into()
        }
    );
}

#[test]
fn test_repeated_field_rejects_scalars() {
    let registry = unittest_registry();
    let err = encode(
        &registry,
        all_types(&registry),
        &input(json!({ "repeatedNestedMessage": "" })),
    )
    .unwrap_err();
    assert_eq!(
        err,
        EncodeError::NotARepeatedField {
            field: "repeated_nested_message".into()
        }
    );
}

#[test]
fn test_bytes_from_string() {
    let registry = unittest_registry();
    let decoded = encode_decode(&registry, input(json!({ "optionalBytes": "foo" })));
    assert_eq!(decoded.get("optional_bytes"), Some(&Value::Bytes(b"foo".to_vec())));
}

#[test]
fn test_string_from_number_and_bool() {
    let registry = unittest_registry();
    let decoded = encode_decode(
        &registry,
        input(json!({ "optional_string": 12, "repeated_string": [true, 1.5] })),
    );
    assert_eq!(decoded.get("optional_string"), Some(&Value::from("12")));
    assert_eq!(
        decoded.get("repeated_string"),
        Some(&Value::List(vec![Value::from("true"), Value::from("1.5")]))
    );
}

#[test]
fn test_bool_from_strings_and_numbers() {
    let registry = unittest_registry();
    for (given, expected) in [
        (json!("true"), true),
        (json!("False"), false),
        (json!(2), true),
        (json!(0), false),
    ] {
        let decoded = encode_decode(&registry, input(json!({ "optional_bool": given })));
        assert_eq!(decoded.get("optional_bool"), Some(&Value::Bool(expected)));
    }
}

// ===========================================================================
// Nesting cap
// ===========================================================================

/// `levels` nested `child` messages, innermost empty.
fn nested_bytes(levels: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    for _ in 0..levels {
        let mut outer = vec![0x0a];
        encode_varint(bytes.len() as u64, &mut outer);
        outer.extend_from_slice(&bytes);
        bytes = outer;
    }
    bytes
}

#[test]
fn test_decode_nesting_cap() {
    let registry = unittest_registry();
    let descriptor = registry
        .message_type("protobuf_unittest.NestedTestAllTypes")
        .unwrap();

    assert!(decode(&registry, descriptor, &nested_bytes(100)).is_ok());
    assert_eq!(
        decode(&registry, descriptor, &nested_bytes(101)).unwrap_err(),
        DecodeError::NestingTooDeep { max_depth: 100 }
    );
    // Far past the cap still fails cleanly instead of overflowing the stack.
    assert!(matches!(
        decode(&registry, descriptor, &nested_bytes(5_000)),
        Err(DecodeError::NestingTooDeep { .. })
    ));
}

#[test]
fn test_encode_nesting_cap() {
    let registry = unittest_registry();
    let descriptor = registry
        .message_type("protobuf_unittest.NestedTestAllTypes")
        .unwrap();
    let config = CodecConfig::default().with_max_depth(8);

    let mut message = Message::new();
    for _ in 0..9 {
        message = Message::new().with("child", message);
    }
    let err = Encoder::with_config(&registry, config.clone())
        .encode(descriptor, &message)
        .unwrap_err();
    assert_eq!(err, EncodeError::NestingTooDeep { max_depth: 8 });

    let Some(Value::Message(shallower)) = message.get("child") else {
        panic!("fixture has a child");
    };
    let bytes = Encoder::with_config(&registry, config.clone())
        .encode(descriptor, shallower)
        .unwrap();
    assert_eq!(
        Decoder::with_config(&registry, config).decode(descriptor, &bytes).unwrap(),
        *shallower
    );
}

#[test]
fn test_deepest_allowed_nesting_fits_on_the_test_thread() {
    let registry = unittest_registry();
    let descriptor = registry
        .message_type("protobuf_unittest.NestedTestAllTypes")
        .unwrap();
    let limit = CodecConfig::MAX_DEPTH_LIMIT;
    let config = CodecConfig::default().with_max_depth(limit);

    let mut message = Message::new();
    for _ in 0..limit {
        message = Message::new().with("child", message);
    }
    let bytes = Encoder::with_config(&registry, config.clone())
        .encode(descriptor, &message)
        .unwrap();
    assert_eq!(bytes, nested_bytes(limit));

    let decoder = Decoder::with_config(&registry, config);
    assert_eq!(decoder.decode(descriptor, &bytes).unwrap(), message);
    assert_eq!(
        decoder.decode(descriptor, &nested_bytes(limit + 1)).unwrap_err(),
        DecodeError::NestingTooDeep { max_depth: limit }
    );
}

// ===========================================================================
// Packing
// ===========================================================================

#[test]
fn test_proto3_repeated_scalars_are_packed() {
    let registry = unittest_registry();
    let samples = registry.message_type("packed.Samples").unwrap();
    let message = Message::new().with(
        "values",
        vec![Value::Int(3), Value::Int(270), Value::Int(86942)],
    );

    let bytes = encode(&registry, samples, &message).unwrap();
    assert_eq!(bytes, [0x0a, 0x06, 0x03, 0x8e, 0x02, 0x9e, 0xa7, 0x05]);
    assert_eq!(decode(&registry, samples, &bytes).unwrap(), message);
}

#[test]
fn test_packed_input_for_unpacked_field() {
    let registry = unittest_registry();
    // repeated_int32 is declared unpacked but a packed payload is accepted.
    let decoded = decode(&registry, all_types(&registry), &[0xfa, 0x01, 0x02, 0x01, 0x02])
        .unwrap();
    assert_eq!(
        decoded.get("repeated_int32"),
        Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
    );
}

#[test]
fn test_packed_doubles_round_trip() {
    let registry = unittest_registry();
    let samples = registry.message_type("packed.Samples").unwrap();
    let message = Message::new().with(
        "weights",
        vec![Value::Float(0.25), Value::Float(-1e300), Value::Float(0.0)],
    );
    let bytes = encode(&registry, samples, &message).unwrap();
    assert_eq!(bytes.len(), 2 + 24);
    assert_eq!(decode(&registry, samples, &bytes).unwrap(), message);
}

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn test_json_field_names_on_decode() {
    let registry = unittest_registry();
    let descriptor = all_types(&registry);
    let bytes = encode(
        &registry,
        descriptor,
        &input(json!({ "optional_int32": 5, "optionalNestedMessage": { "bb": 2 } })),
    )
    .unwrap();

    let config = CodecConfig::default().with_field_names(FieldNames::Json);
    let decoded = Decoder::with_config(&registry, config)
        .decode(descriptor, &bytes)
        .unwrap();
    assert_eq!(
        serde_json::to_value(&decoded).unwrap(),
        json!({ "optionalInt32": 5, "optionalNestedMessage": { "bb": 2 } })
    );
}

#[test]
fn test_enums_as_names_on_decode() {
    let registry = unittest_registry();
    let descriptor = all_types(&registry);
    let bytes = encode(
        &registry,
        descriptor,
        &input(json!({ "repeated_nested_enum": ["BAR", 3] })),
    )
    .unwrap();

    let config = CodecConfig::default().with_enums_as_names(true);
    let decoded = Decoder::with_config(&registry, config)
        .decode(descriptor, &bytes)
        .unwrap();
    assert_eq!(
        decoded.get("repeated_nested_enum"),
        Some(&Value::List(vec![Value::from("BAR"), Value::from("BAZ")]))
    );

    // Names decoded this way encode back to the same bytes.
    assert_eq!(encode(&registry, descriptor, &decoded).unwrap(), bytes);
}

#[test]
fn test_invalid_utf8_passes_through() {
    let registry = unittest_registry();
    let descriptor = all_types(&registry);
    // optional_string = [0xff, 0xfe]
    let bytes = [0x72, 0x02, 0xff, 0xfe];

    let decoded = decode(&registry, descriptor, &bytes).unwrap();
    assert_eq!(decoded.get("optional_string"), Some(&Value::Bytes(vec![0xff, 0xfe])));
    assert_eq!(encode(&registry, descriptor, &decoded).unwrap(), bytes);
}
