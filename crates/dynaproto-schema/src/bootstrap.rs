//! The descriptor-of-descriptors.
//!
//! A compiled schema arrives as a serialized `FileDescriptorSet`, which is
//! itself a wire-format message. Decoding it needs a schema too, so the
//! part of `google/protobuf/descriptor.proto` we rely on is written out
//! here by hand as plain structs, much like generated code would be.
//!
//! Only the fields the registry uses are modeled. Everything else
//! (services, options we don't read, source info) is skipped as unknown
//! fields on decode and never written on encode.
//!
//! Each type can also [`encode`](DescriptorMessage::encode) itself, which
//! lets tests and wrappers author descriptor sets without a schema
//! compiler.

use dynaproto_wire::{FieldOrder, Payload, WireReader, WireWriter};

use crate::SchemaError;

/// Deepest `nested_type` chain accepted while decoding a descriptor set.
pub const MAX_DESCRIPTOR_DEPTH: usize = 100;

/// A message type from `descriptor.proto` with a hand-written codec.
pub trait DescriptorMessage: Default {
    /// Merges one decoded entry into `self`. Unknown field numbers are
    /// ignored.
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        depth: usize,
    ) -> Result<(), SchemaError>;

    /// Writes every set field to `w`.
    fn write_fields(&self, w: &mut WireWriter);

    /// Decodes a top-level message.
    ///
    /// # Errors
    /// [`SchemaError::InvalidSchema`] on malformed bytes, a known field
    /// framed with the wrong wire type, invalid UTF-8 in a name, or
    /// nesting deeper than [`MAX_DESCRIPTOR_DEPTH`].
    fn decode(buf: &[u8]) -> Result<Self, SchemaError> {
        Self::decode_at(buf, 0)
    }

    /// Decodes a message found `depth` levels below the top.
    fn decode_at(buf: &[u8], depth: usize) -> Result<Self, SchemaError> {
        if depth > MAX_DESCRIPTOR_DEPTH {
            return Err(SchemaError::InvalidSchema(format!(
                "descriptors nested deeper than {MAX_DESCRIPTOR_DEPTH} levels"
            )));
        }
        let mut msg = Self::default();
        for entry in WireReader::new(buf) {
            let entry = entry?;
            msg.merge_field(entry.field_number, entry.payload, depth)?;
        }
        Ok(msg)
    }

    /// Encodes `self` in ascending field order.
    fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new(FieldOrder::Ascending);
        self.write_fields(&mut w);
        w.finish()
    }
}

// ---------------------------------------------------------------------------
// FileDescriptorSet
// ---------------------------------------------------------------------------

/// The top-level compiled schema: one entry per `.proto` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDescriptorSet {
    pub file: Vec<FileDescriptorProto>,
}

impl DescriptorMessage for FileDescriptorSet {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        depth: usize,
    ) -> Result<(), SchemaError> {
        if field_number == 1 {
            self.file.push(nested(payload, depth, "FileDescriptorSet.file")?);
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        for file in &self.file {
            w.write_bytes(1, &file.encode());
        }
    }
}

// ---------------------------------------------------------------------------
// FileDescriptorProto
// ---------------------------------------------------------------------------

/// One compiled `.proto` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDescriptorProto {
    pub name: Option<String>,
    pub package: Option<String>,
    pub dependency: Vec<String>,
    pub message_type: Vec<DescriptorProto>,
    pub enum_type: Vec<EnumDescriptorProto>,
    /// `"proto2"`, `"proto3"`, or absent (which means proto2).
    pub syntax: Option<String>,
}

impl FileDescriptorProto {
    /// Returns `true` for files declared with `syntax = "proto3"`.
    pub fn is_proto3(&self) -> bool {
        self.syntax.as_deref() == Some("proto3")
    }
}

impl DescriptorMessage for FileDescriptorProto {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        depth: usize,
    ) -> Result<(), SchemaError> {
        match field_number {
            1 => self.name = Some(text(payload, "FileDescriptorProto.name")?),
            2 => self.package = Some(text(payload, "FileDescriptorProto.package")?),
            3 => self
                .dependency
                .push(text(payload, "FileDescriptorProto.dependency")?),
            4 => self
                .message_type
                .push(nested(payload, depth, "FileDescriptorProto.message_type")?),
            5 => self
                .enum_type
                .push(nested(payload, depth, "FileDescriptorProto.enum_type")?),
            12 => self.syntax = Some(text(payload, "FileDescriptorProto.syntax")?),
            _ => {}
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        write_text(w, 1, &self.name);
        write_text(w, 2, &self.package);
        for dep in &self.dependency {
            w.write_bytes(3, dep.as_bytes());
        }
        for msg in &self.message_type {
            w.write_bytes(4, &msg.encode());
        }
        for en in &self.enum_type {
            w.write_bytes(5, &en.encode());
        }
        write_text(w, 12, &self.syntax);
    }
}

// ---------------------------------------------------------------------------
// DescriptorProto
// ---------------------------------------------------------------------------

/// A message type, possibly with nested messages and enums.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorProto {
    pub name: Option<String>,
    pub field: Vec<FieldDescriptorProto>,
    pub nested_type: Vec<DescriptorProto>,
    pub enum_type: Vec<EnumDescriptorProto>,
    pub reserved_range: Vec<ReservedRange>,
    pub reserved_name: Vec<String>,
}

impl DescriptorMessage for DescriptorProto {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        depth: usize,
    ) -> Result<(), SchemaError> {
        match field_number {
            1 => self.name = Some(text(payload, "DescriptorProto.name")?),
            2 => self.field.push(nested(payload, depth, "DescriptorProto.field")?),
            3 => self
                .nested_type
                .push(nested(payload, depth, "DescriptorProto.nested_type")?),
            4 => self
                .enum_type
                .push(nested(payload, depth, "DescriptorProto.enum_type")?),
            9 => self
                .reserved_range
                .push(nested(payload, depth, "DescriptorProto.reserved_range")?),
            10 => self
                .reserved_name
                .push(text(payload, "DescriptorProto.reserved_name")?),
            _ => {}
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        write_text(w, 1, &self.name);
        for field in &self.field {
            w.write_bytes(2, &field.encode());
        }
        for msg in &self.nested_type {
            w.write_bytes(3, &msg.encode());
        }
        for en in &self.enum_type {
            w.write_bytes(4, &en.encode());
        }
        for range in &self.reserved_range {
            w.write_bytes(9, &range.encode());
        }
        for name in &self.reserved_name {
            w.write_bytes(10, name.as_bytes());
        }
    }
}

/// A range of field numbers a message reserves. `end` is exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservedRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl DescriptorMessage for ReservedRange {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        _depth: usize,
    ) -> Result<(), SchemaError> {
        match field_number {
            1 => self.start = Some(int32(payload, "ReservedRange.start")?),
            2 => self.end = Some(int32(payload, "ReservedRange.end")?),
            _ => {}
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        write_int32(w, 1, self.start);
        write_int32(w, 2, self.end);
    }
}

// ---------------------------------------------------------------------------
// FieldDescriptorProto
// ---------------------------------------------------------------------------

/// One field of a message.
///
/// `label` and `type` are kept as the raw numeric codes from
/// `descriptor.proto`; the registry validates and converts them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDescriptorProto {
    pub name: Option<String>,
    pub number: Option<i32>,
    pub label: Option<i32>,
    pub r#type: Option<i32>,
    /// `.pkg.Type` (fully qualified) or a name relative to the
    /// enclosing scope.
    pub type_name: Option<String>,
    pub options: Option<FieldOptions>,
    pub json_name: Option<String>,
}

impl DescriptorMessage for FieldDescriptorProto {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        depth: usize,
    ) -> Result<(), SchemaError> {
        match field_number {
            1 => self.name = Some(text(payload, "FieldDescriptorProto.name")?),
            3 => self.number = Some(int32(payload, "FieldDescriptorProto.number")?),
            4 => self.label = Some(int32(payload, "FieldDescriptorProto.label")?),
            5 => self.r#type = Some(int32(payload, "FieldDescriptorProto.type")?),
            6 => self.type_name = Some(text(payload, "FieldDescriptorProto.type_name")?),
            8 => {
                // Repeated occurrences of a singular message field merge.
                let more: FieldOptions = nested(payload, depth, "FieldDescriptorProto.options")?;
                let options = self.options.get_or_insert_with(FieldOptions::default);
                if more.packed.is_some() {
                    options.packed = more.packed;
                }
            }
            10 => self.json_name = Some(text(payload, "FieldDescriptorProto.json_name")?),
            _ => {}
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        write_text(w, 1, &self.name);
        write_int32(w, 3, self.number);
        write_int32(w, 4, self.label);
        write_int32(w, 5, self.r#type);
        write_text(w, 6, &self.type_name);
        if let Some(options) = &self.options {
            w.write_bytes(8, &options.encode());
        }
        write_text(w, 10, &self.json_name);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    pub packed: Option<bool>,
}

impl DescriptorMessage for FieldOptions {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        _depth: usize,
    ) -> Result<(), SchemaError> {
        if field_number == 2 {
            self.packed = Some(boolean(payload, "FieldOptions.packed")?);
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        if let Some(packed) = self.packed {
            w.write_varint(2, u64::from(packed));
        }
    }
}

// ---------------------------------------------------------------------------
// EnumDescriptorProto
// ---------------------------------------------------------------------------

/// An enum type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumDescriptorProto {
    pub name: Option<String>,
    pub value: Vec<EnumValueDescriptorProto>,
    pub options: Option<EnumOptions>,
}

impl DescriptorMessage for EnumDescriptorProto {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        depth: usize,
    ) -> Result<(), SchemaError> {
        match field_number {
            1 => self.name = Some(text(payload, "EnumDescriptorProto.name")?),
            2 => self
                .value
                .push(nested(payload, depth, "EnumDescriptorProto.value")?),
            3 => {
                let more: EnumOptions = nested(payload, depth, "EnumDescriptorProto.options")?;
                let options = self.options.get_or_insert_with(EnumOptions::default);
                if more.allow_alias.is_some() {
                    options.allow_alias = more.allow_alias;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        write_text(w, 1, &self.name);
        for value in &self.value {
            w.write_bytes(2, &value.encode());
        }
        if let Some(options) = &self.options {
            w.write_bytes(3, &options.encode());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumOptions {
    /// Permits several names to share one number.
    pub allow_alias: Option<bool>,
}

impl DescriptorMessage for EnumOptions {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        _depth: usize,
    ) -> Result<(), SchemaError> {
        if field_number == 2 {
            self.allow_alias = Some(boolean(payload, "EnumOptions.allow_alias")?);
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        if let Some(allow) = self.allow_alias {
            w.write_varint(2, u64::from(allow));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumValueDescriptorProto {
    pub name: Option<String>,
    pub number: Option<i32>,
}

impl DescriptorMessage for EnumValueDescriptorProto {
    fn merge_field(
        &mut self,
        field_number: u32,
        payload: Payload<'_>,
        _depth: usize,
    ) -> Result<(), SchemaError> {
        match field_number {
            1 => self.name = Some(text(payload, "EnumValueDescriptorProto.name")?),
            2 => self.number = Some(int32(payload, "EnumValueDescriptorProto.number")?),
            _ => {}
        }
        Ok(())
    }

    fn write_fields(&self, w: &mut WireWriter) {
        write_text(w, 1, &self.name);
        write_int32(w, 2, self.number);
    }
}

// ---------------------------------------------------------------------------
// Type and label codes
// ---------------------------------------------------------------------------

pub const TYPE_DOUBLE: i32 = 1;
pub const TYPE_FLOAT: i32 = 2;
pub const TYPE_INT64: i32 = 3;
pub const TYPE_UINT64: i32 = 4;
pub const TYPE_INT32: i32 = 5;
pub const TYPE_FIXED64: i32 = 6;
pub const TYPE_FIXED32: i32 = 7;
pub const TYPE_BOOL: i32 = 8;
pub const TYPE_STRING: i32 = 9;
pub const TYPE_GROUP: i32 = 10;
pub const TYPE_MESSAGE: i32 = 11;
pub const TYPE_BYTES: i32 = 12;
pub const TYPE_UINT32: i32 = 13;
pub const TYPE_ENUM: i32 = 14;
pub const TYPE_SFIXED32: i32 = 15;
pub const TYPE_SFIXED64: i32 = 16;
pub const TYPE_SINT32: i32 = 17;
pub const TYPE_SINT64: i32 = 18;

pub const LABEL_OPTIONAL: i32 = 1;
pub const LABEL_REQUIRED: i32 = 2;
pub const LABEL_REPEATED: i32 = 3;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

// Chainable constructors for authoring descriptor sets in code. They
// produce exactly what protoc would emit for the equivalent `.proto`.

impl FileDescriptorSet {
    pub fn new(files: impl IntoIterator<Item = FileDescriptorProto>) -> Self {
        Self {
            file: files.into_iter().collect(),
        }
    }
}

impl FileDescriptorProto {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            package: Some(package.into()),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: DescriptorProto) -> Self {
        self.message_type.push(message);
        self
    }

    pub fn with_enum(mut self, enumeration: EnumDescriptorProto) -> Self {
        self.enum_type.push(enumeration);
        self
    }

    pub fn with_dependency(mut self, file: impl Into<String>) -> Self {
        self.dependency.push(file.into());
        self
    }

    pub fn with_syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = Some(syntax.into());
        self
    }
}

impl DescriptorProto {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: FieldDescriptorProto) -> Self {
        self.field.push(field);
        self
    }

    pub fn with_nested(mut self, message: DescriptorProto) -> Self {
        self.nested_type.push(message);
        self
    }

    pub fn with_enum(mut self, enumeration: EnumDescriptorProto) -> Self {
        self.enum_type.push(enumeration);
        self
    }

    /// Reserves field numbers `start..end` (end exclusive).
    pub fn with_reserved_range(mut self, start: i32, end: i32) -> Self {
        self.reserved_range.push(ReservedRange {
            start: Some(start),
            end: Some(end),
        });
        self
    }

    pub fn with_reserved_name(mut self, name: impl Into<String>) -> Self {
        self.reserved_name.push(name.into());
        self
    }
}

impl FieldDescriptorProto {
    /// An optional field of a non-reference type (`TYPE_INT32`, ...).
    pub fn new(name: impl Into<String>, number: i32, r#type: i32) -> Self {
        Self {
            name: Some(name.into()),
            number: Some(number),
            label: Some(LABEL_OPTIONAL),
            r#type: Some(r#type),
            ..Default::default()
        }
    }

    /// An optional field referencing a message type by name.
    pub fn message(name: impl Into<String>, number: i32, type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::new(name, number, TYPE_MESSAGE)
        }
    }

    /// An optional field referencing an enum type by name.
    pub fn enumeration(
        name: impl Into<String>,
        number: i32,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::new(name, number, TYPE_ENUM)
        }
    }

    pub fn repeated(mut self) -> Self {
        self.label = Some(LABEL_REPEATED);
        self
    }

    pub fn required(mut self) -> Self {
        self.label = Some(LABEL_REQUIRED);
        self
    }

    pub fn packed(mut self, packed: bool) -> Self {
        self.options = Some(FieldOptions {
            packed: Some(packed),
        });
        self
    }

    pub fn with_json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = Some(json_name.into());
        self
    }
}

impl EnumDescriptorProto {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.value.push(EnumValueDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
        });
        self
    }

    pub fn allow_alias(mut self) -> Self {
        self.options = Some(EnumOptions {
            allow_alias: Some(true),
        });
        self
    }
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

fn wrong_wire_type(field: &str, payload: &Payload<'_>) -> SchemaError {
    SchemaError::InvalidSchema(format!(
        "{field}: unexpected {} payload",
        payload.wire_type()
    ))
}

fn text(payload: Payload<'_>, field: &str) -> Result<String, SchemaError> {
    match payload {
        Payload::LengthDelimited(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|_| SchemaError::InvalidSchema(format!("{field}: invalid UTF-8"))),
        other => Err(wrong_wire_type(field, &other)),
    }
}

fn int32(payload: Payload<'_>, field: &str) -> Result<i32, SchemaError> {
    match payload {
        // int32 is sign-extended to 64 bits on the wire; truncate back.
        Payload::Varint(v) => Ok(v as i32),
        other => Err(wrong_wire_type(field, &other)),
    }
}

fn boolean(payload: Payload<'_>, field: &str) -> Result<bool, SchemaError> {
    match payload {
        Payload::Varint(v) => Ok(v != 0),
        other => Err(wrong_wire_type(field, &other)),
    }
}

fn nested<M: DescriptorMessage>(
    payload: Payload<'_>,
    depth: usize,
    field: &str,
) -> Result<M, SchemaError> {
    match payload {
        Payload::LengthDelimited(bytes) => M::decode_at(bytes, depth + 1),
        other => Err(wrong_wire_type(field, &other)),
    }
}

fn write_text(w: &mut WireWriter, field_number: u32, value: &Option<String>) {
    if let Some(value) = value {
        w.write_bytes(field_number, value.as_bytes());
    }
}

fn write_int32(w: &mut WireWriter, field_number: u32, value: Option<i32>) {
    if let Some(value) = value {
        w.write_varint(field_number, i64::from(value) as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("demo.proto".into()),
            package: Some("demo".into()),
            message_type: vec![DescriptorProto {
                name: Some("Point".into()),
                field: vec![FieldDescriptorProto {
                    name: Some("x".into()),
                    number: Some(1),
                    label: Some(1),
                    r#type: Some(17),
                    options: Some(FieldOptions { packed: Some(true) }),
                    ..Default::default()
                }],
                reserved_range: vec![ReservedRange {
                    start: Some(5),
                    end: Some(10),
                }],
                ..Default::default()
            }],
            enum_type: vec![EnumDescriptorProto {
                name: Some("Color".into()),
                value: vec![EnumValueDescriptorProto {
                    name: Some("RED".into()),
                    number: Some(-1),
                }],
                options: Some(EnumOptions {
                    allow_alias: Some(true),
                }),
            }],
            syntax: Some("proto3".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_descriptor_set_survives_encode_decode() {
        let set = FileDescriptorSet {
            file: vec![sample_file()],
        };
        let decoded = FileDescriptorSet::decode(&set.encode()).unwrap();
        assert_eq!(decoded, set);
        assert!(decoded.file[0].is_proto3());
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut bytes = sample_file().encode();
        // field 8 (FileOptions) is not modeled here.
        bytes.extend_from_slice(&[0x42, 0x02, 0x08, 0x01]);
        let decoded = FileDescriptorProto::decode(&bytes).unwrap();
        assert_eq!(decoded, sample_file());
    }

    #[test]
    fn test_wrong_wire_type_is_invalid_schema() {
        // DescriptorProto.name (field 1) as a varint.
        let err = DescriptorProto::decode(&[0x08, 0x01]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
        assert!(err.to_string().contains("DescriptorProto.name"));
    }

    #[test]
    fn test_invalid_utf8_name_is_rejected() {
        let err = DescriptorProto::decode(&[0x0a, 0x01, 0xff]).unwrap_err();
        assert!(err.to_string().contains("invalid UTF-8"));
    }

    #[test]
    fn test_truncated_bytes_are_invalid_schema() {
        let err = FileDescriptorSet::decode(&[0x0a, 0x10, 0x00]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let mut msg = DescriptorProto {
            name: Some("Leaf".into()),
            ..Default::default()
        };
        for _ in 0..=MAX_DESCRIPTOR_DEPTH {
            msg = DescriptorProto {
                name: Some("Outer".into()),
                nested_type: vec![msg],
                ..Default::default()
            };
        }
        let err = DescriptorProto::decode(&msg.encode()).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn test_negative_enum_number_round_trips() {
        let value = EnumValueDescriptorProto {
            name: Some("NEG".into()),
            number: Some(-5),
        };
        let decoded = EnumValueDescriptorProto::decode(&value.encode()).unwrap();
        assert_eq!(decoded.number, Some(-5));
    }
}
