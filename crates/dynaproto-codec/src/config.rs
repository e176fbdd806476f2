//! Codec configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use dynaproto_wire::FieldOrder;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What decode does with a `string` field whose bytes aren't valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Utf8Policy {
    /// Keep the bytes untouched as [`Value::Bytes`](crate::Value::Bytes).
    /// Re-encoding writes them back byte for byte.
    #[default]
    Permissive,
    /// Replace invalid sequences with U+FFFD.
    Lossy,
    /// Fail with [`DecodeError::InvalidUtf8`](crate::DecodeError::InvalidUtf8).
    Strict,
}

/// Which name decoded messages are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldNames {
    /// As declared in the `.proto` file: `optional_int32`.
    #[default]
    Proto,
    /// lowerCamelCase (or the explicit `json_name`): `optionalInt32`.
    Json,
}

// ---------------------------------------------------------------------------
// CodecConfig
// ---------------------------------------------------------------------------

/// Settings shared by the decode and encode engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Deepest message nesting accepted, in either direction. Default: 100.
    pub max_depth: usize,
    /// Order in which encode emits fields. Default: ascending number.
    pub field_order: FieldOrder,
    /// Pack every packable repeated field on encode, not just the ones the
    /// schema marks packed. Default: false.
    pub pack_repeated: bool,
    /// Handling of invalid UTF-8 in `string` fields on decode.
    pub utf8: Utf8Policy,
    /// Key decoded messages by proto name or JSON name. Encode accepts
    /// both regardless.
    pub field_names: FieldNames,
    /// Decode declared enum numbers to their names. Unknown numbers stay
    /// numeric either way. Default: false.
    pub enums_as_names: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            field_order: FieldOrder::default(),
            pack_repeated: false,
            utf8: Utf8Policy::default(),
            field_names: FieldNames::default(),
            enums_as_names: false,
        }
    }
}

impl CodecConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 100;

    /// Upper bound for `max_depth`. Each level costs a few stack frames,
    /// and the limit must fit on a 2 MiB thread stack in a debug build.
    pub const MAX_DEPTH_LIMIT: usize = 256;

    /// Clamps out-of-range settings to the nearest accepted value.
    pub fn validated(mut self) -> Self {
        if self.max_depth == 0 {
            warn!("max_depth of 0 would reject every nested message, using 1");
            self.max_depth = 1;
        } else if self.max_depth > Self::MAX_DEPTH_LIMIT {
            warn!(
                depth = self.max_depth,
                max = Self::MAX_DEPTH_LIMIT,
                "max_depth exceeds limit, clamping"
            );
            self.max_depth = Self::MAX_DEPTH_LIMIT;
        }
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_field_order(mut self, order: FieldOrder) -> Self {
        self.field_order = order;
        self
    }

    pub fn with_utf8(mut self, policy: Utf8Policy) -> Self {
        self.utf8 = policy;
        self
    }

    pub fn with_field_names(mut self, names: FieldNames) -> Self {
        self.field_names = names;
        self
    }

    pub fn with_packed_repeated(mut self, pack: bool) -> Self {
        self.pack_repeated = pack;
        self
    }

    pub fn with_enums_as_names(mut self, as_names: bool) -> Self {
        self.enums_as_names = as_names;
        self
    }
}
