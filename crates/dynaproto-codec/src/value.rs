//! The dynamic value model: what decode produces and encode consumes.
//!
//! There are no generated structs. A decoded message is a [`Message`], a
//! map from field name to [`Value`], and encode input has the same shape.
//! On the input side the model is deliberately loose (a number may arrive
//! as a string, bytes as text) and the coercion layer sorts it out against
//! the field's declared type.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// One field value.
///
/// Decoding picks the variant from the declared field type:
///
/// | field type                                       | variant    |
/// |--------------------------------------------------|------------|
/// | `int32` `int64` `sint32` `sint64` `sfixed32` `sfixed64` | `Int`  |
/// | `uint32` `uint64` `fixed32` `fixed64`            | `UInt`     |
/// | `float` `double`                                 | `Float`    |
/// | `bool`                                           | `Bool`     |
/// | `string`                                         | `String` (or `Bytes` for invalid UTF-8, see [`Utf8Policy`](crate::Utf8Policy)) |
/// | `bytes`                                          | `Bytes`    |
/// | enum                                             | `Enum` (or `String` with `enums_as_names`) |
/// | message                                          | `Message`  |
/// | any repeated field                               | `List`     |
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value. On encode, a null field is treated as absent.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// An enum number. Decoding keeps numbers the enum doesn't declare.
    Enum(i32),
    List(Vec<Value>),
    Message(Message),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The value as a signed integer, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(n) => Some(n),
            Self::UInt(n) => i64::try_from(n).ok(),
            Self::Enum(n) => Some(i64::from(n)),
            _ => None,
        }
    }

    /// The value as an unsigned integer, if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::UInt(n) => Some(n),
            Self::Int(n) => u64::try_from(n).ok(),
            Self::Enum(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(n) => Some(n),
            Self::Int(n) => Some(n as f64),
            Self::UInt(n) => Some(n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The raw bytes of a `Bytes` or `String` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    /// A short description of the value for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::UInt(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::String(s) => format!("{s:?}"),
            Self::Bytes(b) => format!("<{} bytes>", b.len()),
            Self::Enum(n) => n.to_string(),
            Self::List(items) => format!("<list of {}>", items.len()),
            Self::Message(_) => "<message>".to_string(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Message> for Value {
    fn from(v: Message) -> Self {
        Self::Message(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::UInt(n) => serializer.serialize_u64(*n),
            Self::Float(n) => serializer.serialize_f64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.serialize_bytes(b),
            Self::Enum(n) => serializer.serialize_i32(*n),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Message(m) => m.serialize(serializer),
        }
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Value> for Value {
    /// Objects become messages, arrays lists. Integral numbers become
    /// `Int` (or `UInt` above `i64::MAX`), everything else `Float`.
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Message(Message::from(map)),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A decoded message, or encode input: field name → value.
///
/// Keys iterate in sorted order. Fields that were absent on the wire are
/// absent here; there are no implicit defaults.
///
/// ```
/// use dynaproto_codec::{Message, Value};
///
/// let msg = Message::new()
///     .with("optional_int32", 7)
///     .with("optional_string", "hi");
///
/// assert_eq!(msg.get("optional_int32"), Some(&Value::Int(7)));
/// assert!(msg.get("optional_bytes").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    fields: BTreeMap<String, Value>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Appends to a repeated field, creating the list on first use.
    pub(crate) fn push(&mut self, name: &str, value: Value) {
        match self.fields.get_mut(name) {
            Some(Value::List(items)) => items.push(value),
            _ => {
                self.fields.insert(name.to_string(), Value::List(vec![value]));
            }
        }
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for Message {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Message {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Map<String, serde_json::Value>> for Message {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_maps_none_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3u32)), Value::UInt(3));
    }

    #[test]
    fn test_push_creates_then_appends() {
        let mut msg = Message::new();
        msg.push("xs", Value::Int(1));
        msg.push("xs", Value::Int(2));
        assert_eq!(
            msg.get("xs"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn test_integer_accessors_check_range() {
        assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Enum(4).as_i64(), Some(4));
        assert_eq!(Value::String("4".into()).as_i64(), None);
    }

    #[test]
    fn test_message_serializes_as_json_object() {
        let msg = Message::new()
            .with("id", 7)
            .with("tags", vec![Value::from("a"), Value::from("b")])
            .with("child", Message::new().with("ok", true))
            .with("missing", Value::Null);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "tags": ["a", "b"],
                "child": { "ok": true },
                "missing": null,
            })
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_input_conversion() {
        let value = Value::from(serde_json::json!({
            "small": -3,
            "huge": u64::MAX,
            "ratio": 0.5,
            "name": "x",
            "items": [1, null],
            "nested": { "flag": false },
        }));
        let Value::Message(msg) = value else {
            panic!("expected a message");
        };
        assert_eq!(msg.get("small"), Some(&Value::Int(-3)));
        assert_eq!(msg.get("huge"), Some(&Value::UInt(u64::MAX)));
        assert_eq!(msg.get("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(msg.get("name"), Some(&Value::String("x".into())));
        assert_eq!(
            msg.get("items"),
            Some(&Value::List(vec![Value::Int(1), Value::Null]))
        );
        assert_eq!(
            msg.get("nested").and_then(Value::as_message),
            Some(&Message::new().with("flag", false))
        );
    }
}
