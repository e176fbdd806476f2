//! Runtime descriptors: the validated, resolved form of a compiled schema.
//!
//! These are what the codec works from. Unlike the raw bootstrap types
//! they have no optional-everything fields: every descriptor held by a
//! [`Registry`](crate::Registry) has passed validation.

use std::collections::HashMap;
use std::fmt;

use dynaproto_wire::WireType;

// ---------------------------------------------------------------------------
// FieldType / Label
// ---------------------------------------------------------------------------

/// The declared type of a field.
///
/// `Enum` and `Message` carry the qualified name of the referenced type,
/// so "a type reference is present exactly when the type is enum or
/// message" holds by construction. References are resolved by name
/// through the registry when they are used, never materialized as an
/// object graph; that is what makes recursive message types (`A` holds
/// a `B` holds an `A`) harmless.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    Bool,
    String,
    Bytes,
    Enum(String),
    Message(String),
}

impl FieldType {
    /// The wire type this field is written with (unpacked).
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Int32
            | Self::Int64
            | Self::Uint32
            | Self::Uint64
            | Self::Sint32
            | Self::Sint64
            | Self::Bool
            | Self::Enum(_) => WireType::Varint,
            Self::Fixed32 | Self::Sfixed32 | Self::Float => WireType::Fixed32,
            Self::Fixed64 | Self::Sfixed64 | Self::Double => WireType::Fixed64,
            Self::String | Self::Bytes | Self::Message(_) => WireType::LengthDelimited,
        }
    }

    /// Returns `true` if repeated values of this type may be packed.
    pub fn is_packable(&self) -> bool {
        self.wire_type() != WireType::LengthDelimited
    }

    /// The `.proto` spelling of the type (`"sint32"`, `"message"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Enum(_) => "enum",
            Self::Message(_) => "message",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum(name) | Self::Message(name) => write!(f, "{name}"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Field cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

// ---------------------------------------------------------------------------
// FieldDescriptor
// ---------------------------------------------------------------------------

/// One field of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub(crate) number: u32,
    pub(crate) name: String,
    pub(crate) json_name: String,
    pub(crate) field_type: FieldType,
    pub(crate) label: Label,
    pub(crate) packed: bool,
}

impl FieldDescriptor {
    /// The field number, unique within its message.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The name as declared in the `.proto` file (`optional_int32`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lowerCamelCase name (`optionalInt32`), or the explicit
    /// `json_name` from the schema.
    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    /// Returns `true` if repeated values are written as one packed
    /// payload by default (`[packed = true]`, or proto3 scalars).
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn wire_type(&self) -> WireType {
        self.field_type.wire_type()
    }

    /// The qualified name of the referenced message type, if any.
    pub fn message_type(&self) -> Option<&str> {
        match &self.field_type {
            FieldType::Message(name) => Some(name),
            _ => None,
        }
    }

    /// The qualified name of the referenced enum type, if any.
    pub fn enum_type(&self) -> Option<&str> {
        match &self.field_type {
            FieldType::Enum(name) => Some(name),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MessageDescriptor
// ---------------------------------------------------------------------------

/// A message type: its fields in declaration order plus lookup indexes.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub(crate) full_name: String,
    pub(crate) fields: Vec<FieldDescriptor>,
    /// Field number → index into `fields`.
    pub(crate) by_number: HashMap<u32, usize>,
    /// Proto name and JSON name → index into `fields`.
    pub(crate) by_name: HashMap<String, usize>,
    pub(crate) nested_messages: Vec<String>,
    pub(crate) nested_enums: Vec<String>,
}

impl MessageDescriptor {
    /// The qualified name, e.g. `protobuf_unittest.TestAllTypes`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The unqualified name (the last path component).
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map_or(self.full_name.as_str(), |(_, name)| name)
    }

    /// All fields, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by number.
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    /// Looks up a field by its proto name or its JSON name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Qualified names of the message types declared inside this one.
    pub fn nested_messages(&self) -> &[String] {
        &self.nested_messages
    }

    /// Qualified names of the enum types declared inside this one.
    pub fn nested_enums(&self) -> &[String] {
        &self.nested_enums
    }
}

impl fmt::Display for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

// ---------------------------------------------------------------------------
// EnumDescriptor
// ---------------------------------------------------------------------------

/// One named value of an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

/// An enum type.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    pub(crate) full_name: String,
    pub(crate) values: Vec<EnumValue>,
    /// Number → name. With aliases, the first declared name wins.
    pub(crate) by_number: HashMap<i32, usize>,
    pub(crate) by_name: HashMap<String, i32>,
}

impl EnumDescriptor {
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// All values, in declaration order.
    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    /// The name declared for `number`, if any.
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.by_number
            .get(&number)
            .map(|&i| self.values[i].name.as_str())
    }

    /// The number declared for `name`, if any.
    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    /// Returns `true` if `number` is a declared value.
    pub fn contains(&self, number: i32) -> bool {
        self.by_number.contains_key(&number)
    }
}

impl fmt::Display for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

/// Converts `snake_case` to `lowerCamelCase` the way protoc derives
/// default JSON names: drop each underscore and capitalize what follows.
pub(crate) fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
