//! Schema-driven decode and encode engines for Dynaproto.
//!
//! Given a [`MessageDescriptor`](dynaproto_schema::MessageDescriptor) from a
//! [`Registry`](dynaproto_schema::Registry), this crate converts between wire
//! bytes and the dynamic [`Message`] model:
//!
//! - **Decoding** ([`Decoder`]): unknown fields are skipped, packed and
//!   unpacked repeated fields both accepted, nesting depth capped
//! - **Encoding** ([`Encoder`]): loosely typed input is coerced to each
//!   field's declared type, then written in a deterministic order
//!
//! # Example
//!
//! ```
//! use dynaproto_codec::{Message, Value, decode, encode};
//! use dynaproto_schema::Registry;
//! use dynaproto_schema::bootstrap::{
//!     DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
//!     TYPE_INT32,
//! };
//!
//! let set = FileDescriptorSet::new([FileDescriptorProto::new("p.proto", "demo")
//!     .with_message(
//!         DescriptorProto::new("Point")
//!             .with_field(FieldDescriptorProto::new("x", 1, TYPE_INT32))
//!             .with_field(FieldDescriptorProto::new("y", 2, TYPE_INT32)),
//!     )]);
//! let registry = Registry::from_descriptor_set(&set).unwrap();
//! let point = registry.message_type("demo.Point").unwrap();
//!
//! // "3" is coerced to the number 3.
//! let input = Message::new().with("x", "3").with("y", -4);
//! let bytes = encode(&registry, point, &input).unwrap();
//!
//! let decoded = decode(&registry, point, &bytes).unwrap();
//! assert_eq!(decoded.get("x"), Some(&Value::Int(3)));
//! assert_eq!(decoded.get("y"), Some(&Value::Int(-4)));
//! ```
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)   ← owns the registry, hands out per-type handles
//!     ↕
//! Codec (this crate)   ← Value model, coercion, decode/encode engines
//!     ↕
//! Schema + Wire (below)   ← descriptors; tags, varints, lengths
//! ```

mod coerce;
mod config;
mod decode;
mod encode;
mod error;
mod value;

pub use config::{CodecConfig, FieldNames, FieldOrder, Utf8Policy};
pub use decode::{Decoder, decode};
pub use encode::{Encoder, encode};
pub use error::{DecodeError, EncodeError};
pub use value::{Message, Value};
