//! # Dynaproto
//!
//! Protocol Buffers wire-format encoding and decoding driven by a schema
//! loaded at runtime. No generated code: load a compiled descriptor set,
//! pick a message type by name, and convert between bytes and a dynamic
//! [`Message`].
//!
//! ## Quick Start
//!
//! ```rust
//! use dynaproto::prelude::*;
//! use dynaproto::bootstrap::{
//!     DescriptorMessage, DescriptorProto, FieldDescriptorProto, FileDescriptorProto,
//!     FileDescriptorSet, TYPE_INT32, TYPE_STRING,
//! };
//!
//! # fn main() -> Result<(), DynaprotoError> {
//! // Usually these bytes come from `protoc --descriptor_set_out`.
//! let descriptor_set = FileDescriptorSet::new([FileDescriptorProto::new("user.proto", "app")
//!     .with_message(
//!         DescriptorProto::new("User")
//!             .with_field(FieldDescriptorProto::new("id", 1, TYPE_INT32))
//!             .with_field(FieldDescriptorProto::new("display_name", 2, TYPE_STRING)),
//!     )])
//! .encode();
//!
//! let schema = Schema::load(&descriptor_set)?;
//! let user = schema.message_type("app.User")?;
//!
//! // Input keys may use the proto name or the JSON name.
//! let bytes = user.encode(&Message::new().with("id", 7).with("displayName", "Ada"))?;
//! let decoded = user.decode(&bytes)?;
//!
//! assert_eq!(decoded.get("id"), Some(&Value::Int(7)));
//! assert_eq!(decoded.get("display_name"), Some(&Value::from("Ada")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | crate              | role                                              |
//! |--------------------|---------------------------------------------------|
//! | `dynaproto-wire`   | varints, wire reader and writer                   |
//! | `dynaproto-schema` | descriptor-set loading, validation, type registry |
//! | `dynaproto-codec`  | value model, coercion, decode and encode engines  |
//! | `dynaproto`        | this facade                                       |

mod error;
mod schema;

pub use error::DynaprotoError;
pub use schema::{MessageType, Schema};

pub use dynaproto_codec::{
    CodecConfig, DecodeError, Decoder, EncodeError, Encoder, FieldNames, FieldOrder, Message,
    Utf8Policy, Value,
};
pub use dynaproto_schema::{
    EnumDescriptor, EnumValue, FieldDescriptor, FieldType, Label, MessageDescriptor, Registry,
    SchemaError, TypeDescriptor, bootstrap,
};
pub use dynaproto_wire as wire;

/// The handful of types most callers need.
pub mod prelude {
    pub use crate::{CodecConfig, DynaprotoError, Message, MessageType, Schema, Value};
}
