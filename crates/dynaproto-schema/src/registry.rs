//! The descriptor registry: every message and enum of a compiled schema,
//! indexed by qualified name.
//!
//! # Lifecycle
//!
//! ```text
//! descriptor-set bytes ──→ FileDescriptorSet ──→ Registry (frozen)
//!                  bootstrap decode       validate + resolve
//! ```
//!
//! Construction is all-or-nothing: any problem aborts with
//! [`SchemaError::InvalidSchema`] and nothing is returned. After that the
//! registry is immutable. There are no `&mut self` methods, so it can be
//! wrapped in an `Arc` and read from any number of threads without
//! locking. Loading a different schema means building a new registry.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use dynaproto_wire::MAX_FIELD_NUMBER;

use crate::SchemaError;
use crate::bootstrap::{
    DescriptorMessage, DescriptorProto, EnumDescriptorProto, FieldDescriptorProto,
    FileDescriptorSet, LABEL_OPTIONAL, LABEL_REPEATED, LABEL_REQUIRED, TYPE_BOOL, TYPE_BYTES,
    TYPE_DOUBLE, TYPE_ENUM, TYPE_FIXED32, TYPE_FIXED64, TYPE_FLOAT, TYPE_GROUP, TYPE_INT32,
    TYPE_INT64, TYPE_MESSAGE, TYPE_SFIXED32, TYPE_SFIXED64, TYPE_SINT32, TYPE_SINT64,
    TYPE_STRING, TYPE_UINT32, TYPE_UINT64,
};
use crate::descriptor::{
    EnumDescriptor, EnumValue, FieldDescriptor, FieldType, Label, MessageDescriptor,
    to_json_name,
};

/// A resolved type: either a message or an enum.
#[derive(Debug, Clone, Copy)]
pub enum TypeDescriptor<'a> {
    Message(&'a MessageDescriptor),
    Enum(&'a EnumDescriptor),
}

impl TypeDescriptor<'_> {
    pub fn full_name(&self) -> &str {
        match self {
            Self::Message(m) => m.full_name(),
            Self::Enum(e) => e.full_name(),
        }
    }
}

/// All message and enum descriptors of one compiled schema.
///
/// ```
/// use dynaproto_schema::Registry;
/// use dynaproto_schema::bootstrap::{
///     DescriptorMessage, DescriptorProto, FieldDescriptorProto, FileDescriptorProto,
///     FileDescriptorSet, TYPE_STRING,
/// };
///
/// let set = FileDescriptorSet::new([FileDescriptorProto::new("greet.proto", "greet")
///     .with_message(
///         DescriptorProto::new("Hello")
///             .with_field(FieldDescriptorProto::new("name", 1, TYPE_STRING)),
///     )]);
///
/// let registry = Registry::from_descriptor_set_bytes(&set.encode()).unwrap();
/// let hello = registry.message_type("greet.Hello").unwrap();
/// assert_eq!(registry.fields_of(hello), ["name"]);
/// ```
#[derive(Debug)]
pub struct Registry {
    files: Vec<String>,
    messages: HashMap<String, MessageDescriptor>,
    enums: HashMap<String, EnumDescriptor>,
    /// Top-level messages in load order.
    top_level: Vec<String>,
}

impl Registry {
    /// Builds a registry from a serialized `FileDescriptorSet`.
    ///
    /// # Errors
    /// [`SchemaError::InvalidSchema`] if the bytes are malformed or the
    /// schema they describe is inconsistent.
    pub fn from_descriptor_set_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        let set = FileDescriptorSet::decode(bytes)?;
        Self::from_descriptor_set(&set)
    }

    /// Builds a registry from an already decoded `FileDescriptorSet`.
    ///
    /// Files may reference each other's types in any order; references
    /// are resolved after every file's names are known.
    pub fn from_descriptor_set(set: &FileDescriptorSet) -> Result<Self, SchemaError> {
        Builder::default().build(set)
    }

    /// Looks up a message or enum by qualified name. A leading `.` is
    /// accepted, matching how descriptors spell type references.
    pub fn resolve(&self, name: &str) -> Result<TypeDescriptor<'_>, SchemaError> {
        let name = name.strip_prefix('.').unwrap_or(name);
        if let Some(message) = self.messages.get(name) {
            return Ok(TypeDescriptor::Message(message));
        }
        if let Some(enumeration) = self.enums.get(name) {
            return Ok(TypeDescriptor::Enum(enumeration));
        }
        Err(SchemaError::UnknownType(name.to_string()))
    }

    /// Looks up a message type by qualified name.
    ///
    /// # Errors
    /// [`SchemaError::UnknownType`] if no message has this name (an enum
    /// with this name doesn't count).
    pub fn message_type(&self, name: &str) -> Result<&MessageDescriptor, SchemaError> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.messages
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Looks up an enum type by qualified name.
    pub fn enum_type(&self, name: &str) -> Result<&EnumDescriptor, SchemaError> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.enums
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// The field names of `message`, in declaration order.
    pub fn fields_of<'m>(&self, message: &'m MessageDescriptor) -> Vec<&'m str> {
        message.fields().iter().map(|f| f.name()).collect()
    }

    /// Qualified names of the top-level messages of every file, in load
    /// order.
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.top_level.iter().map(String::as_str)
    }

    /// Every message descriptor, nested ones included, in no particular
    /// order.
    pub fn messages(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.messages.values()
    }

    /// Every enum descriptor, in no particular order.
    pub fn enums(&self) -> impl Iterator<Item = &EnumDescriptor> {
        self.enums.values()
    }

    /// Names of the files this registry was built from.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Total number of message and enum types.
    pub fn len(&self) -> usize {
        self.messages.len() + self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Message,
    Enum,
}

struct PendingMessage<'s> {
    full_name: String,
    proto: &'s DescriptorProto,
    proto3: bool,
    nested_messages: Vec<String>,
    nested_enums: Vec<String>,
}

struct PendingEnum<'s> {
    full_name: String,
    proto: &'s EnumDescriptorProto,
}

/// Two passes: first collect every qualified name (so references can
/// point forward or across files), then validate and resolve fields.
#[derive(Default)]
struct Builder<'s> {
    kinds: HashMap<String, Kind>,
    /// Every package and each of its dotted prefixes.
    packages: HashSet<String>,
    messages: Vec<PendingMessage<'s>>,
    enums: Vec<PendingEnum<'s>>,
}

impl<'s> Builder<'s> {
    fn build(mut self, set: &'s FileDescriptorSet) -> Result<Registry, SchemaError> {
        let mut files = Vec::with_capacity(set.file.len());
        let mut top_level = Vec::new();

        for file in &set.file {
            let file_name = file.name.clone().unwrap_or_default();
            let package = file.package.as_deref().unwrap_or("");
            self.note_package(package);
            for message in &file.message_type {
                top_level.push(self.collect_message(package, message, file.is_proto3())?);
            }
            for enumeration in &file.enum_type {
                self.collect_enum(package, enumeration)?;
            }
            tracing::debug!(
                file = %file_name,
                package,
                messages = file.message_type.len(),
                enums = file.enum_type.len(),
                "descriptor file collected"
            );
            files.push(file_name);
        }

        let mut messages = HashMap::with_capacity(self.messages.len());
        for pending in &self.messages {
            let descriptor = self.build_message(pending)?;
            messages.insert(pending.full_name.clone(), descriptor);
        }

        let mut enums = HashMap::with_capacity(self.enums.len());
        for pending in &self.enums {
            let descriptor = build_enum(pending)?;
            enums.insert(pending.full_name.clone(), descriptor);
        }

        tracing::info!(
            files = files.len(),
            messages = messages.len(),
            enums = enums.len(),
            "registry built"
        );

        Ok(Registry {
            files,
            messages,
            enums,
            top_level,
        })
    }

    fn note_package(&mut self, package: &str) {
        let mut prefix = package;
        while !prefix.is_empty() && self.packages.insert(prefix.to_string()) {
            prefix = prefix.rsplit_once('.').map_or("", |(parent, _)| parent);
        }
    }

    fn register(&mut self, full_name: &str, kind: Kind) -> Result<(), SchemaError> {
        if self.kinds.insert(full_name.to_string(), kind).is_some() {
            return Err(invalid(format!("duplicate type name {full_name}")));
        }
        Ok(())
    }

    /// Registers `proto` and everything nested in it. Returns its
    /// qualified name.
    fn collect_message(
        &mut self,
        scope: &str,
        proto: &'s DescriptorProto,
        proto3: bool,
    ) -> Result<String, SchemaError> {
        let name = required_name(&proto.name, || format!("message in scope '{scope}'"))?;
        let full_name = qualify(scope, name);
        self.register(&full_name, Kind::Message)?;

        let index = self.messages.len();
        self.messages.push(PendingMessage {
            full_name: full_name.clone(),
            proto,
            proto3,
            nested_messages: Vec::new(),
            nested_enums: Vec::new(),
        });

        for nested in &proto.nested_type {
            let nested_name = self.collect_message(&full_name, nested, proto3)?;
            self.messages[index].nested_messages.push(nested_name);
        }
        for enumeration in &proto.enum_type {
            let enum_name = self.collect_enum(&full_name, enumeration)?;
            self.messages[index].nested_enums.push(enum_name);
        }
        Ok(full_name)
    }

    fn collect_enum(
        &mut self,
        scope: &str,
        proto: &'s EnumDescriptorProto,
    ) -> Result<String, SchemaError> {
        let name = required_name(&proto.name, || format!("enum in scope '{scope}'"))?;
        let full_name = qualify(scope, name);
        self.register(&full_name, Kind::Enum)?;
        self.enums.push(PendingEnum {
            full_name: full_name.clone(),
            proto,
        });
        Ok(full_name)
    }

    fn build_message(&self, pending: &PendingMessage<'s>) -> Result<MessageDescriptor, SchemaError> {
        let message = pending.full_name.as_str();
        let proto = pending.proto;
        let reserved_names: HashSet<&str> =
            proto.reserved_name.iter().map(String::as_str).collect();

        let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(proto.field.len());
        let mut by_number = HashMap::with_capacity(proto.field.len());
        let mut by_name = HashMap::with_capacity(proto.field.len() * 2);

        for field in &proto.field {
            let name = required_name(&field.name, || format!("field in {message}"))?;
            let number = field_number(message, name, field.number)?;

            let Some(field_type) = self.resolve_field_type(message, name, field)? else {
                tracing::warn!(
                    message_type = message,
                    field = name,
                    "group fields are not supported; field skipped"
                );
                continue;
            };

            let label = match field.label {
                None | Some(LABEL_OPTIONAL) => Label::Optional,
                Some(LABEL_REQUIRED) => Label::Required,
                Some(LABEL_REPEATED) => Label::Repeated,
                Some(other) => {
                    return Err(invalid(format!("{message}.{name}: unknown label {other}")));
                }
            };

            let in_reserved_range = proto.reserved_range.iter().any(|range| {
                let start = range.start.unwrap_or(0);
                let end = range.end.unwrap_or(start);
                (start..end).contains(&(number as i32))
            });
            if in_reserved_range {
                return Err(invalid(format!(
                    "{message}.{name}: field number {number} is reserved"
                )));
            }
            if reserved_names.contains(name) {
                return Err(invalid(format!("{message}: field name '{name}' is reserved")));
            }

            let index = fields.len();
            if by_number.insert(number, index).is_some() {
                return Err(invalid(format!(
                    "{message}: duplicate field number {number}"
                )));
            }
            if by_name.insert(name.to_string(), index).is_some() {
                return Err(invalid(format!("{message}: duplicate field name '{name}'")));
            }

            let packed = label == Label::Repeated
                && field_type.is_packable()
                && field
                    .options
                    .as_ref()
                    .and_then(|o| o.packed)
                    .unwrap_or(pending.proto3);

            fields.push(FieldDescriptor {
                number,
                name: name.to_string(),
                json_name: field
                    .json_name
                    .clone()
                    .unwrap_or_else(|| to_json_name(name)),
                field_type,
                label,
                packed,
            });
        }

        // JSON names are secondary keys: a proto name always wins a clash.
        for (index, field) in fields.iter().enumerate() {
            by_name.entry(field.json_name.clone()).or_insert(index);
        }

        Ok(MessageDescriptor {
            full_name: pending.full_name.clone(),
            fields,
            by_number,
            by_name,
            nested_messages: pending.nested_messages.clone(),
            nested_enums: pending.nested_enums.clone(),
        })
    }

    /// Returns `Ok(None)` for group fields, which are skipped.
    fn resolve_field_type(
        &self,
        message: &str,
        field: &str,
        proto: &FieldDescriptorProto,
    ) -> Result<Option<FieldType>, SchemaError> {
        let field_type = match proto.r#type {
            Some(TYPE_DOUBLE) => FieldType::Double,
            Some(TYPE_FLOAT) => FieldType::Float,
            Some(TYPE_INT64) => FieldType::Int64,
            Some(TYPE_UINT64) => FieldType::Uint64,
            Some(TYPE_INT32) => FieldType::Int32,
            Some(TYPE_FIXED64) => FieldType::Fixed64,
            Some(TYPE_FIXED32) => FieldType::Fixed32,
            Some(TYPE_BOOL) => FieldType::Bool,
            Some(TYPE_STRING) => FieldType::String,
            Some(TYPE_GROUP) => return Ok(None),
            Some(TYPE_BYTES) => FieldType::Bytes,
            Some(TYPE_UINT32) => FieldType::Uint32,
            Some(TYPE_SFIXED32) => FieldType::Sfixed32,
            Some(TYPE_SFIXED64) => FieldType::Sfixed64,
            Some(TYPE_SINT32) => FieldType::Sint32,
            Some(TYPE_SINT64) => FieldType::Sint64,
            Some(TYPE_MESSAGE) => {
                let (name, kind) = self.resolve_reference(message, field, proto)?;
                if kind != Kind::Message {
                    return Err(invalid(format!(
                        "{message}.{field}: {name} is an enum, not a message"
                    )));
                }
                FieldType::Message(name)
            }
            Some(TYPE_ENUM) => {
                let (name, kind) = self.resolve_reference(message, field, proto)?;
                if kind != Kind::Enum {
                    return Err(invalid(format!(
                        "{message}.{field}: {name} is a message, not an enum"
                    )));
                }
                FieldType::Enum(name)
            }
            // No type code: the referenced name decides.
            None => match self.resolve_reference(message, field, proto)? {
                (name, Kind::Message) => FieldType::Message(name),
                (name, Kind::Enum) => FieldType::Enum(name),
            },
            Some(other) => {
                return Err(invalid(format!("{message}.{field}: unknown type {other}")));
            }
        };
        Ok(Some(field_type))
    }

    /// Resolves `type_name` as seen from inside `scope`.
    ///
    /// `.pkg.Type` is absolute. A relative name binds its first component
    /// in the innermost enclosing scope that declares it (a type or a
    /// package), and the remaining components must then exist below that
    /// binding. A single-component name only binds to a type.
    fn resolve_reference(
        &self,
        scope: &str,
        field: &str,
        proto: &FieldDescriptorProto,
    ) -> Result<(String, Kind), SchemaError> {
        let Some(type_name) = proto.type_name.as_deref() else {
            return Err(invalid(format!("{scope}.{field}: missing type_name")));
        };

        if let Some(absolute) = type_name.strip_prefix('.') {
            return self
                .kinds
                .get(absolute)
                .map(|&kind| (absolute.to_string(), kind))
                .ok_or_else(|| {
                    invalid(format!("{scope}.{field}: unresolved type {type_name}"))
                });
        }

        let (first, rest) = match type_name.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (type_name, None),
        };

        let mut current = scope;
        loop {
            let bound = qualify(current, first);
            match rest {
                None => {
                    if let Some(&kind) = self.kinds.get(&bound) {
                        return Ok((bound, kind));
                    }
                }
                Some(rest) if self.kinds.contains_key(&bound) || self.packages.contains(&bound) => {
                    let candidate = format!("{bound}.{rest}");
                    return match self.kinds.get(&candidate) {
                        Some(&kind) => Ok((candidate, kind)),
                        None => Err(invalid(format!(
                            "{scope}.{field}: unresolved type {type_name} ('{first}' binds to {bound}, which has no {rest})"
                        ))),
                    };
                }
                Some(_) => {}
            }
            if current.is_empty() {
                break;
            }
            current = current.rsplit_once('.').map_or("", |(parent, _)| parent);
        }
        Err(invalid(format!(
            "{scope}.{field}: unresolved type {type_name}"
        )))
    }
}

fn build_enum(pending: &PendingEnum<'_>) -> Result<EnumDescriptor, SchemaError> {
    let enum_name = pending.full_name.as_str();
    let proto = pending.proto;
    let allow_alias = proto
        .options
        .as_ref()
        .and_then(|o| o.allow_alias)
        .unwrap_or(false);

    let mut values = Vec::with_capacity(proto.value.len());
    let mut by_number = HashMap::with_capacity(proto.value.len());
    let mut by_name = HashMap::with_capacity(proto.value.len());

    for value in &proto.value {
        let name = required_name(&value.name, || format!("value of {enum_name}"))?;
        let number = value
            .number
            .ok_or_else(|| invalid(format!("{enum_name}.{name}: missing number")))?;

        if by_name.insert(name.to_string(), number).is_some() {
            return Err(invalid(format!("{enum_name}: duplicate value name '{name}'")));
        }
        let index = values.len();
        if by_number.contains_key(&number) {
            if !allow_alias {
                return Err(invalid(format!(
                    "{enum_name}: duplicate value number {number} without allow_alias"
                )));
            }
        } else {
            by_number.insert(number, index);
        }
        values.push(EnumValue {
            name: name.to_string(),
            number,
        });
    }

    Ok(EnumDescriptor {
        full_name: pending.full_name.clone(),
        values,
        by_number,
        by_name,
    })
}

fn invalid(message: String) -> SchemaError {
    SchemaError::InvalidSchema(message)
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn required_name<'a>(
    name: &'a Option<String>,
    what: impl FnOnce() -> String,
) -> Result<&'a str, SchemaError> {
    match name.as_deref() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(invalid(format!("{} has no name", what()))),
    }
}

/// Field numbers protobuf keeps for itself.
const IMPLEMENTATION_RESERVED: RangeInclusive<u32> = 19_000..=19_999;

fn field_number(message: &str, field: &str, number: Option<i32>) -> Result<u32, SchemaError> {
    match number {
        Some(n) if n > 0 && n as u32 <= MAX_FIELD_NUMBER => {
            let n = n as u32;
            if IMPLEMENTATION_RESERVED.contains(&n) {
                return Err(invalid(format!(
                    "{message}.{field}: field number {n} is reserved for the protobuf implementation"
                )));
            }
            Ok(n)
        }
        Some(n) => Err(invalid(format!(
            "{message}.{field}: field number {n} out of range"
        ))),
        None => Err(invalid(format!("{message}.{field}: missing field number"))),
    }
}
