//! Type coercion for encode input.
//!
//! Callers hand the encoder loosely typed values (often straight from
//! JSON) and these rules decide what gets written for each declared field
//! type. They are part of the encoding contract, so they are spelled out
//! here rather than left to whatever `as` happens to do:
//!
//! | target            | input                  | result                         |
//! |-------------------|------------------------|--------------------------------|
//! | integer / float   | numeric string         | parsed                         |
//! | integer / float   | `0x`, `0o`, `0b` text  | parsed in that radix, unsigned |
//! | integer / float   | `""`, non-numeric text | `0`                            |
//! | integer / float   | bool                   | `0` or `1`                     |
//! | integer / float   | list, message, bytes   | `0`                            |
//! | integer           | float                  | truncated toward zero, wrapped |
//! | bool              | `"true"` / `"false"`   | case-insensitive match         |
//! | bool              | anything else          | numeric value `!= 0`           |
//! | string / bytes    | text or bytes          | passed through                 |
//! | string / bytes    | number or bool         | its textual form               |
//! | string / bytes    | list, message          | [`EncodeError::NotAScalar`]    |
//! | enum              | declared name/number   | the number                     |
//! | enum              | anything else          | [`EncodeError::UnknownEnumValue`] |
//!
//! Null never reaches these functions: the encoder treats a null field as
//! absent.

use std::borrow::Cow;

use dynaproto_schema::EnumDescriptor;

use crate::{EncodeError, Value};

/// A loosely typed input reduced to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

fn number(value: &Value) -> Number {
    match value {
        Value::Bool(b) => Number::Int(i64::from(*b)),
        Value::Int(n) => Number::Int(*n),
        Value::UInt(n) => Number::UInt(*n),
        Value::Float(n) => Number::Float(*n),
        Value::Enum(n) => Number::Int(i64::from(*n)),
        Value::String(s) => parse_number(s),
        Value::Null | Value::Bytes(_) | Value::List(_) | Value::Message(_) => Number::Int(0),
    }
}

fn parse_number(text: &str) -> Number {
    let text = text.trim();
    if let Some(n) = parse_prefixed(text) {
        n
    } else if let Ok(n) = text.parse::<i64>() {
        Number::Int(n)
    } else if let Ok(n) = text.parse::<u64>() {
        Number::UInt(n)
    } else if let Ok(n) = text.parse::<f64>() {
        Number::Float(n)
    } else {
        Number::Int(0)
    }
}

/// `0x1f`, `0o17`, `0b101` (prefix case-insensitive, no sign). Values past
/// `u64::MAX` become the nearest float.
fn parse_prefixed(text: &str) -> Option<Number> {
    let prefix = text.get(..2)?;
    let radix = match prefix.to_ascii_lowercase().as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Some(Number::Int(0));
    }
    Some(match u64::from_str_radix(digits, radix) {
        Ok(n) => Number::UInt(n),
        Err(_) => Number::Float(digits.chars().fold(0.0, |acc, c| {
            acc * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0))
        })),
    })
}

/// Truncates toward zero. Non-finite values become 0.
fn truncate(f: f64) -> i128 {
    if f.is_finite() { f.trunc() as i128 } else { 0 }
}

/// Coerces to a signed 64-bit integer. Narrower targets truncate the
/// result again with `as`, which wraps.
pub(crate) fn to_i64(value: &Value) -> i64 {
    match number(value) {
        Number::Int(n) => n,
        Number::UInt(n) => n as i64,
        Number::Float(f) => truncate(f) as i64,
    }
}

pub(crate) fn to_u64(value: &Value) -> u64 {
    match number(value) {
        Number::Int(n) => n as u64,
        Number::UInt(n) => n,
        Number::Float(f) => truncate(f) as u64,
    }
}

pub(crate) fn to_f64(value: &Value) -> f64 {
    match number(value) {
        Number::Int(n) => n as f64,
        Number::UInt(n) => n as f64,
        Number::Float(f) => f,
    }
}

pub(crate) fn to_bool(value: &Value) -> bool {
    if let Value::String(s) = value {
        let s = s.trim();
        if s.eq_ignore_ascii_case("true") {
            return true;
        }
        if s.eq_ignore_ascii_case("false") {
            return false;
        }
    }
    match number(value) {
        Number::Int(n) => n != 0,
        Number::UInt(n) => n != 0,
        Number::Float(f) => f != 0.0 && !f.is_nan(),
    }
}

/// The payload for a `string` or `bytes` field.
pub(crate) fn to_text<'v>(value: &'v Value, field: &str) -> Result<Cow<'v, [u8]>, EncodeError> {
    let text = match value {
        Value::String(s) => return Ok(Cow::Borrowed(s.as_bytes())),
        Value::Bytes(b) => return Ok(Cow::Borrowed(b)),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Enum(n) => n.to_string(),
        Value::List(_) | Value::Message(_) => {
            return Err(EncodeError::NotAScalar {
                field: field.to_string(),
            });
        }
    };
    Ok(Cow::Owned(text.into_bytes()))
}

/// Resolves an enum field's input to a declared number.
pub(crate) fn to_enum(
    value: &Value,
    enumeration: &EnumDescriptor,
    field: &str,
) -> Result<i32, EncodeError> {
    let declared = match *value {
        Value::String(ref name) => enumeration.number_of(name),
        Value::Int(n) => i32::try_from(n).ok(),
        Value::UInt(n) => i32::try_from(n).ok(),
        Value::Enum(n) => Some(n),
        Value::Float(f) if f.fract() == 0.0 => i32::try_from(truncate(f)).ok(),
        _ => None,
    }
    .filter(|&n| enumeration.contains(n));

    declared.ok_or_else(|| EncodeError::UnknownEnumValue {
        field: field.to_string(),
        enum_type: enumeration.full_name().to_string(),
        value: value.describe(),
    })
}
