//! Loaded schemas and per-message-type handles.
//!
//! A [`Schema`] is the thing applications keep around: a frozen registry
//! plus the codec settings to use with it. Cloning is cheap (the registry
//! sits behind an `Arc`), and a clone can move to another thread, so one
//! schema can be loaded at startup and shared by every request handler.
//!
//! ```text
//! Schema ──message_type("pkg.Msg")──→ MessageType ──decode / encode──→ Message / bytes
//! ```

use std::fmt;
use std::sync::Arc;

use dynaproto_codec::{CodecConfig, Decoder, Encoder, Message, Value};
use dynaproto_schema::{MessageDescriptor, Registry};
use tracing::debug;

use crate::DynaprotoError;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// A compiled schema, ready to decode and encode its message types.
#[derive(Debug, Clone)]
pub struct Schema {
    registry: Arc<Registry>,
    config: CodecConfig,
}

impl Schema {
    /// Loads a serialized `FileDescriptorSet` (as written by
    /// `protoc --descriptor_set_out`) with the default codec settings.
    ///
    /// # Errors
    /// [`DynaprotoError::Schema`] if the bytes are malformed or describe an
    /// inconsistent schema. Nothing is loaded in that case.
    pub fn load(descriptor_set: &[u8]) -> Result<Self, DynaprotoError> {
        Self::with_config(descriptor_set, CodecConfig::default())
    }

    /// Like [`load`](Self::load), with explicit codec settings.
    pub fn with_config(descriptor_set: &[u8], config: CodecConfig) -> Result<Self, DynaprotoError> {
        let registry = Registry::from_descriptor_set_bytes(descriptor_set)?;
        Ok(Self::from_registry(registry, config))
    }

    /// Wraps an already built registry.
    pub fn from_registry(registry: Registry, config: CodecConfig) -> Self {
        let config = config.validated();
        debug!(
            types = registry.len(),
            max_depth = config.max_depth,
            field_order = ?config.field_order,
            "schema ready"
        );
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// The handle for one message type, by qualified name.
    ///
    /// # Errors
    /// [`DynaprotoError::Schema`] wrapping `UnknownType` if there is no
    /// such message.
    pub fn message_type(&self, name: &str) -> Result<MessageType<'_>, DynaprotoError> {
        let descriptor = self.registry.message_type(name)?;
        Ok(MessageType {
            schema: self,
            descriptor,
        })
    }

    /// One handle per top-level message of every file, in load order.
    pub fn message_types(&self) -> impl Iterator<Item = MessageType<'_>> {
        self.registry
            .message_names()
            .filter_map(|name| self.message_type(name).ok())
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// One message type of a [`Schema`], with decode and encode bound to it.
#[derive(Debug, Clone, Copy)]
pub struct MessageType<'s> {
    schema: &'s Schema,
    descriptor: &'s MessageDescriptor,
}

impl<'s> MessageType<'s> {
    /// The qualified name, e.g. `protobuf_unittest.TestAllTypes`.
    pub fn name(&self) -> &'s str {
        self.descriptor.full_name()
    }

    pub fn descriptor(&self) -> &'s MessageDescriptor {
        self.descriptor
    }

    /// Field names in declaration order.
    pub fn fields(&self) -> Vec<&'s str> {
        self.schema.registry.fields_of(self.descriptor)
    }

    /// Decodes one message of this type.
    pub fn decode(&self, bytes: &[u8]) -> Result<Message, DynaprotoError> {
        let decoder = Decoder::with_config(&self.schema.registry, self.schema.config.clone());
        Ok(decoder.decode(self.descriptor, bytes)?)
    }

    /// Encodes one message of this type.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, DynaprotoError> {
        let encoder = Encoder::with_config(&self.schema.registry, self.schema.config.clone());
        Ok(encoder.encode(self.descriptor, message)?)
    }

    /// Encodes input held as a [`Value`], which must be a
    /// [`Value::Message`].
    pub fn encode_value(&self, value: &Value) -> Result<Vec<u8>, DynaprotoError> {
        let encoder = Encoder::with_config(&self.schema.registry, self.schema.config.clone());
        Ok(encoder.encode_value(self.descriptor, value)?)
    }
}

impl fmt::Display for MessageType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
