//! Message serialization.
//!
//! Known fields are written in declaration order, then unknown fields in the
//! order they were decoded. Implicit-presence fields holding their zero value
//! are omitted; repeated numeric fields marked packed are written as one
//! length-delimited block.

use super::DEFAULT_MAX_MESSAGE_SIZE;
use crate::descriptor::{Cardinality, FieldDescriptor, FieldKind};
use crate::message::{MessageInstance, Value};
use crate::wire::{
    encode_fixed32, encode_fixed64, encode_length_delimited, encode_tag, encode_varint,
    encode_zigzag32, encode_zigzag64, encoded_len_tag, encoded_len_varint, WireType,
};
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Serializes a message into a new buffer
pub fn encode(message: &MessageInstance) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(message));
    encode_to(message, &mut buf);
    buf.freeze()
}

/// Serializes a message, failing if it would exceed [`DEFAULT_MAX_MESSAGE_SIZE`]
pub fn try_encode(message: &MessageInstance) -> Result<Bytes> {
    try_encode_with_limit(message, DEFAULT_MAX_MESSAGE_SIZE)
}

/// Serializes a message, failing with [`Error::MessageTooLarge`] if its
/// encoded size is over `limit` bytes
pub fn try_encode_with_limit(message: &MessageInstance, limit: usize) -> Result<Bytes> {
    let len = encoded_len(message);
    if len > limit {
        return Err(Error::message_too_large(message.type_name(), len, limit));
    }
    let mut buf = BytesMut::with_capacity(len);
    encode_to(message, &mut buf);
    Ok(buf.freeze())
}

/// Serializes a message preceded by its varint length
pub fn encode_length_delimited_message(message: &MessageInstance) -> Bytes {
    let len = encoded_len(message);
    let mut buf = BytesMut::with_capacity(encoded_len_varint(len as u64) + len);
    encode_varint(len as u64, &mut buf);
    encode_to(message, &mut buf);
    buf.freeze()
}

/// Serializes a message into an existing buffer
pub fn encode_to(message: &MessageInstance, buf: &mut impl BufMut) {
    for (field, value) in message.present_fields() {
        encode_field(field, value, buf);
    }
    for unknown in message.unknown_fields() {
        unknown.encode(buf);
    }
}

/// Number of bytes [`encode`] produces for `message`
pub fn encoded_len(message: &MessageInstance) -> usize {
    let known: usize = message
        .present_fields()
        .map(|(field, value)| field_len(field, value))
        .sum();
    let unknown: usize = message
        .unknown_fields()
        .iter()
        .map(|f| f.encoded_len())
        .sum();
    known + unknown
}

fn omitted(field: &FieldDescriptor, value: &Value) -> bool {
    field.cardinality() != Cardinality::Optional && value.is_zero()
}

fn encode_field(field: &FieldDescriptor, value: &Value, buf: &mut impl BufMut) {
    if omitted(field, value) {
        return;
    }
    let number = field.number();
    let kind = field.kind();

    match value {
        Value::List(items) if field.is_packed() => {
            encode_tag(number, WireType::Len, buf);
            let payload: usize = items.iter().map(|item| value_len(kind, item)).sum();
            encode_varint(payload as u64, buf);
            for item in items {
                encode_value(kind, item, buf);
            }
        }
        Value::List(items) => {
            for item in items {
                encode_tag(number, kind.wire_type(), buf);
                encode_value(kind, item, buf);
            }
        }
        single => {
            encode_tag(number, kind.wire_type(), buf);
            encode_value(kind, single, buf);
        }
    }
}

fn field_len(field: &FieldDescriptor, value: &Value) -> usize {
    if omitted(field, value) {
        return 0;
    }
    let tag_len = encoded_len_tag(field.number());
    let kind = field.kind();

    match value {
        Value::List(items) if field.is_packed() => {
            let payload: usize = items.iter().map(|item| value_len(kind, item)).sum();
            tag_len + encoded_len_varint(payload as u64) + payload
        }
        Value::List(items) => items
            .iter()
            .map(|item| tag_len + value_len(kind, item))
            .sum(),
        single => tag_len + value_len(kind, single),
    }
}

/// Writes one value without its tag
fn encode_value(kind: &FieldKind, value: &Value, buf: &mut impl BufMut) {
    match (kind, value) {
        (FieldKind::Int32, Value::Int32(v)) => encode_varint(*v as i64 as u64, buf),
        (FieldKind::SInt32, Value::Int32(v)) => encode_varint(encode_zigzag32(*v) as u64, buf),
        (FieldKind::SFixed32, Value::Int32(v)) => encode_fixed32(*v as u32, buf),
        (FieldKind::Int64, Value::Int64(v)) => encode_varint(*v as u64, buf),
        (FieldKind::SInt64, Value::Int64(v)) => encode_varint(encode_zigzag64(*v), buf),
        (FieldKind::SFixed64, Value::Int64(v)) => encode_fixed64(*v as u64, buf),
        (FieldKind::UInt32, Value::UInt32(v)) => encode_varint(*v as u64, buf),
        (FieldKind::Fixed32, Value::UInt32(v)) => encode_fixed32(*v, buf),
        (FieldKind::UInt64, Value::UInt64(v)) => encode_varint(*v, buf),
        (FieldKind::Fixed64, Value::UInt64(v)) => encode_fixed64(*v, buf),
        (FieldKind::Bool, Value::Bool(v)) => encode_varint(*v as u64, buf),
        (FieldKind::Enum(_), Value::Enum(v)) => encode_varint(*v as i64 as u64, buf),
        (FieldKind::Float, Value::Float(v)) => encode_fixed32(v.to_bits(), buf),
        (FieldKind::Double, Value::Double(v)) => encode_fixed64(v.to_bits(), buf),
        (FieldKind::String, Value::String(v)) => encode_length_delimited(v.as_bytes(), buf),
        (FieldKind::Bytes, Value::Bytes(v)) => encode_length_delimited(v, buf),
        (FieldKind::Message(_), Value::Message(m)) => {
            encode_varint(encoded_len(m) as u64, buf);
            encode_to(m, buf);
        }
        // setters and the decoder only store values matching the kind
        _ => debug_assert!(false, "{} value stored in {} field", value.type_name(), kind),
    }
}

/// Size of one value without its tag
fn value_len(kind: &FieldKind, value: &Value) -> usize {
    match (kind, value) {
        (FieldKind::Int32, Value::Int32(v)) => encoded_len_varint(*v as i64 as u64),
        (FieldKind::SInt32, Value::Int32(v)) => encoded_len_varint(encode_zigzag32(*v) as u64),
        (FieldKind::Int64, Value::Int64(v)) => encoded_len_varint(*v as u64),
        (FieldKind::SInt64, Value::Int64(v)) => encoded_len_varint(encode_zigzag64(*v)),
        (FieldKind::UInt32, Value::UInt32(v)) => encoded_len_varint(*v as u64),
        (FieldKind::UInt64, Value::UInt64(v)) => encoded_len_varint(*v),
        (FieldKind::Bool, _) => 1,
        (FieldKind::Enum(_), Value::Enum(v)) => encoded_len_varint(*v as i64 as u64),
        (FieldKind::SFixed32 | FieldKind::Fixed32 | FieldKind::Float, _) => 4,
        (FieldKind::SFixed64 | FieldKind::Fixed64 | FieldKind::Double, _) => 8,
        (FieldKind::String, Value::String(v)) => encoded_len_varint(v.len() as u64) + v.len(),
        (FieldKind::Bytes, Value::Bytes(v)) => encoded_len_varint(v.len() as u64) + v.len(),
        (FieldKind::Message(_), Value::Message(m)) => {
            let len = encoded_len(m);
            encoded_len_varint(len as u64) + len
        }
        _ => 0,
    }
}
