//! Field values.

use super::MessageInstance;
use crate::descriptor::FieldKind;
use bytes::Bytes;

/// A typed field value.
///
/// Kinds sharing a Rust representation share a variant: `sint32` and
/// `sfixed32` fields hold [`Value::Int32`], `fixed64` fields hold
/// [`Value::UInt64`], and so on.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `bool`
    Bool(bool),
    /// `int32`, `sint32`, `sfixed32`
    Int32(i32),
    /// `int64`, `sint64`, `sfixed64`
    Int64(i64),
    /// `uint32`, `fixed32`
    UInt32(u32),
    /// `uint64`, `fixed64`
    UInt64(u64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Enum number
    Enum(i32),
    /// `string`
    String(String),
    /// `bytes`
    Bytes(Bytes),
    /// Embedded message
    Message(MessageInstance),
    /// Elements of a repeated field
    List(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Enum(_) => "enum",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
            Value::List(_) => "list",
        }
    }

    /// Returns true if this single value can be stored in a field of `kind`
    pub fn matches_kind(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Value::Int32(_), FieldKind::Int32 | FieldKind::SInt32 | FieldKind::SFixed32) => true,
            (Value::Int64(_), FieldKind::Int64 | FieldKind::SInt64 | FieldKind::SFixed64) => true,
            (Value::UInt32(_), FieldKind::UInt32 | FieldKind::Fixed32) => true,
            (Value::UInt64(_), FieldKind::UInt64 | FieldKind::Fixed64) => true,
            (Value::Bool(_), FieldKind::Bool) => true,
            (Value::Float(_), FieldKind::Float) => true,
            (Value::Double(_), FieldKind::Double) => true,
            (Value::Enum(_), FieldKind::Enum(_)) => true,
            (Value::String(_), FieldKind::String) => true,
            (Value::Bytes(_), FieldKind::Bytes) => true,
            (Value::Message(m), FieldKind::Message(d)) => m.type_name() == d.name(),
            _ => false,
        }
    }

    /// Returns true for the zero value of a scalar kind or an empty list.
    ///
    /// Floats count as zero only for `+0.0`; `-0.0` is kept on the wire.
    /// Messages are never considered zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Bool(v) => !v,
            Value::Int32(v) | Value::Enum(v) => *v == 0,
            Value::Int64(v) => *v == 0,
            Value::UInt32(v) => *v == 0,
            Value::UInt64(v) => *v == 0,
            Value::Float(v) => v.to_bits() == 0,
            Value::Double(v) => v.to_bits() == 0,
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::List(v) => v.is_empty(),
            Value::Message(_) => false,
        }
    }

    /// Returns the value as `bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `i32` (int32 kinds and enums)
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) | Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `u32`
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `u64`
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `f32`
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as raw bytes
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the embedded message
    pub fn as_message(&self) -> Option<&MessageInstance> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the elements of a repeated field
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<MessageInstance> for Value {
    fn from(v: MessageInstance) -> Self {
        Value::Message(v)
    }
}
