//! Schema layer for Dynaproto.
//!
//! Turns a compiled `FileDescriptorSet` (what `protoc --descriptor_set_out`
//! writes) into a [`Registry`] of validated message and enum descriptors:
//!
//! 1. **Bootstrap decoding**: the descriptor set is itself a protobuf
//!    message, read by the hand-written decoders in [`bootstrap`]
//! 2. **Validation and resolution**: field numbers, reserved ranges,
//!    duplicate names, and type references are checked once, up front
//! 3. **Lookup**: the frozen [`Registry`] answers name queries for the codec
//!
//! # How it fits in the stack
//!
//! ```text
//! Codec (above)   ← walks messages field by field using these descriptors
//!     ↕
//! Schema (this crate)   ← descriptors, type resolution, validation
//!     ↕
//! Wire (below)   ← reads the descriptor-set bytes themselves
//! ```

pub mod bootstrap;
mod descriptor;
mod error;
mod registry;

pub use descriptor::{
    EnumDescriptor, EnumValue, FieldDescriptor, FieldType, Label, MessageDescriptor,
};
pub use error::SchemaError;
pub use registry::{Registry, TypeDescriptor};
