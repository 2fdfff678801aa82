//! Message parsing.

use super::DecoderConfig;
use crate::descriptor::{FieldDescriptor, FieldKind, MessageDescriptor};
use crate::error::{Error, Result};
use crate::message::{MessageInstance, UnknownField, Value};
use crate::wire::{
    decode_fixed32, decode_fixed64, decode_length_delimited, decode_tag, decode_varint,
    decode_zigzag32, decode_zigzag64, skip_field, WireType,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Parses wire-format bytes into [`MessageInstance`]s.
///
/// Declared fields are decoded according to their descriptor. Repeated
/// numeric fields accept both the packed and the expanded encoding.
/// A singular field seen more than once keeps the last value, except
/// embedded messages, which are merged. Everything else is kept as an
/// [`UnknownField`].
///
/// Decoding is all-or-nothing: on error no partial instance is returned.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Creates a decoder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with the given settings
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// The decoder's settings
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes a complete message
    pub fn decode(&self, data: &[u8], descriptor: &Arc<MessageDescriptor>) -> Result<MessageInstance> {
        if data.len() > self.config.max_message_size {
            return Err(Error::malformed(
                0,
                format!(
                    "message of {} bytes exceeds limit of {} bytes",
                    data.len(),
                    self.config.max_message_size
                ),
            ));
        }

        let mut message = MessageInstance::new(Arc::clone(descriptor));
        self.merge_into(&mut message, data, self.config.recursion_limit)?;

        debug!(
            "Decoded {} from {} bytes ({} unknown fields)",
            descriptor.name(),
            data.len(),
            message.unknown_fields().len()
        );
        Ok(message)
    }

    /// Decodes a message preceded by its varint length.
    ///
    /// Returns the message and the total bytes consumed, prefix included.
    pub fn decode_length_delimited(
        &self,
        data: &[u8],
        descriptor: &Arc<MessageDescriptor>,
    ) -> Result<(MessageInstance, usize)> {
        let (payload, consumed) = decode_length_delimited(data)?;
        let message = self
            .decode(payload, descriptor)
            .map_err(|e| e.shift_offset(consumed - payload.len()))?;
        Ok((message, consumed))
    }

    /// Merges the fields in `data` into an existing instance
    pub fn merge(&self, message: &mut MessageInstance, data: &[u8]) -> Result<()> {
        let mut scratch = message.clone();
        self.merge_into(&mut scratch, data, self.config.recursion_limit)?;
        *message = scratch;
        Ok(())
    }

    fn merge_into(&self, message: &mut MessageInstance, data: &[u8], depth: u32) -> Result<()> {
        let descriptor = Arc::clone(message.descriptor());
        let mut position = 0;

        while position < data.len() {
            let (number, wire_type, tag_len) =
                decode_tag(&data[position..]).map_err(|e| e.shift_offset(position))?;
            let value_start = position + tag_len;
            let rest = &data[value_start..];

            let consumed = match descriptor.field(number) {
                Some(field) if accepts(field, wire_type) => self
                    .decode_field(message, field, wire_type, rest, depth)
                    .map_err(|e| e.shift_offset(value_start))?,
                _ => {
                    let len =
                        skip_field(number, wire_type, rest).map_err(|e| e.shift_offset(value_start))?;
                    trace!(
                        "Unknown field {} ({}) in {}, {} bytes",
                        number,
                        wire_type,
                        descriptor.name(),
                        len
                    );
                    if !self.config.discard_unknown_fields {
                        message.push_unknown(UnknownField::new(
                            number,
                            wire_type,
                            Bytes::copy_from_slice(&rest[..len]),
                        ));
                    }
                    len
                }
            };
            position = value_start + consumed;
        }

        Ok(())
    }

    /// Decodes one occurrence of a declared field; `data` starts after the tag
    fn decode_field(
        &self,
        message: &mut MessageInstance,
        field: &FieldDescriptor,
        wire_type: WireType,
        data: &[u8],
        depth: u32,
    ) -> Result<usize> {
        let kind = field.kind();

        if wire_type == WireType::Len && kind.is_packable() {
            let (payload, consumed) = decode_length_delimited(data)?;
            let prefix = consumed - payload.len();

            let mut items = Vec::new();
            let mut position = 0;
            while position < payload.len() {
                let (item, len) = decode_scalar(kind, &payload[position..])
                    .map_err(|e| e.shift_offset(prefix + position))?;
                items.push(item);
                position += len;
            }
            trace!("Packed field {}: {} elements", field.name(), items.len());
            message.merge_value(field, Value::List(items));
            return Ok(consumed);
        }

        let (value, consumed) = match kind {
            FieldKind::String => {
                let (payload, consumed) = decode_length_delimited(data)?;
                let text = std::str::from_utf8(payload).map_err(|e| {
                    Error::malformed(
                        consumed - payload.len() + e.valid_up_to(),
                        format!("invalid UTF-8 in string field '{}'", field.name()),
                    )
                })?;
                (Value::String(text.to_string()), consumed)
            }
            FieldKind::Bytes => {
                let (payload, consumed) = decode_length_delimited(data)?;
                (Value::Bytes(Bytes::copy_from_slice(payload)), consumed)
            }
            FieldKind::Message(inner) => {
                if depth == 0 {
                    return Err(Error::malformed(
                        0,
                        format!(
                            "nesting exceeds recursion limit of {} at field '{}'",
                            self.config.recursion_limit,
                            field.name()
                        ),
                    ));
                }
                let (payload, consumed) = decode_length_delimited(data)?;
                let mut nested = MessageInstance::new(Arc::clone(inner));
                self.merge_into(&mut nested, payload, depth - 1)
                    .map_err(|e| e.shift_offset(consumed - payload.len()))?;
                (Value::Message(nested), consumed)
            }
            scalar => decode_scalar(scalar, data)?,
        };

        message.merge_value(field, value);
        Ok(consumed)
    }
}

/// Whether a declared field may be read from a value of `wire_type`
fn accepts(field: &FieldDescriptor, wire_type: WireType) -> bool {
    wire_type == field.wire_type()
        || (field.is_repeated() && field.kind().is_packable() && wire_type == WireType::Len)
}

/// Decodes one numeric value, returning it with the bytes consumed
fn decode_scalar(kind: &FieldKind, data: &[u8]) -> Result<(Value, usize)> {
    match kind {
        FieldKind::Int32 => decode_varint(data).map(|(v, n)| (Value::Int32(v as i32), n)),
        FieldKind::Int64 => decode_varint(data).map(|(v, n)| (Value::Int64(v as i64), n)),
        FieldKind::UInt32 => decode_varint(data).map(|(v, n)| (Value::UInt32(v as u32), n)),
        FieldKind::UInt64 => decode_varint(data).map(|(v, n)| (Value::UInt64(v), n)),
        FieldKind::SInt32 => {
            decode_varint(data).map(|(v, n)| (Value::Int32(decode_zigzag32(v as u32)), n))
        }
        FieldKind::SInt64 => decode_varint(data).map(|(v, n)| (Value::Int64(decode_zigzag64(v)), n)),
        FieldKind::Bool => decode_varint(data).map(|(v, n)| (Value::Bool(v != 0), n)),
        FieldKind::Enum(_) => decode_varint(data).map(|(v, n)| (Value::Enum(v as i32), n)),
        FieldKind::Fixed32 => decode_fixed32(data).map(|(v, n)| (Value::UInt32(v), n)),
        FieldKind::SFixed32 => decode_fixed32(data).map(|(v, n)| (Value::Int32(v as i32), n)),
        FieldKind::Float => decode_fixed32(data).map(|(v, n)| (Value::Float(f32::from_bits(v)), n)),
        FieldKind::Fixed64 => decode_fixed64(data).map(|(v, n)| (Value::UInt64(v), n)),
        FieldKind::SFixed64 => decode_fixed64(data).map(|(v, n)| (Value::Int64(v as i64), n)),
        FieldKind::Double => {
            decode_fixed64(data).map(|(v, n)| (Value::Double(f64::from_bits(v)), n))
        }
        FieldKind::String | FieldKind::Bytes | FieldKind::Message(_) => Err(Error::internal(
            format!("{} is not a scalar kind", kind),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::descriptor::EnumDescriptor;
    use pretty_assertions::assert_eq;

    fn sample() -> Arc<MessageDescriptor> {
        let inner = Arc::new(
            MessageDescriptor::builder("test.Inner")
                .field(FieldDescriptor::new(1, "a", FieldKind::Int32))
                .field(FieldDescriptor::new(2, "b", FieldKind::Int32))
                .build()
                .unwrap(),
        );
        let color = Arc::new(EnumDescriptor::new("test.Color", [("RED", 0), ("BLUE", 1)]));
        Arc::new(
            MessageDescriptor::builder("test.Sample")
                .field(FieldDescriptor::new(1, "id", FieldKind::Int32))
                .field(FieldDescriptor::new(2, "name", FieldKind::String))
                .field(FieldDescriptor::new(3, "inner", FieldKind::Message(inner)))
                .field(FieldDescriptor::new(4, "values", FieldKind::SInt32).repeated())
                .field(FieldDescriptor::new(5, "color", FieldKind::Enum(color)))
                .field(FieldDescriptor::new(6, "blob", FieldKind::Bytes))
                .field(FieldDescriptor::new(7, "ratio", FieldKind::Float))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_decode_varint_field() {
        // Field 1, wire type 0 (varint), 300
        let message = Decoder::new().decode(&[0x08, 0xAC, 0x02], &sample()).unwrap();
        assert_eq!(message.get(1).unwrap().as_i32(), Some(300));
        assert!(message.unknown_fields().is_empty());
    }

    #[test]
    fn test_empty_input_is_default_instance() {
        let message = Decoder::new().decode(&[], &sample()).unwrap();
        assert_eq!(message, MessageInstance::new(sample()));
    }

    #[test]
    fn test_last_value_wins() {
        // Field 1 = 5, then field 1 = 7
        let message = Decoder::new()
            .decode(&[0x08, 0x05, 0x08, 0x07], &sample())
            .unwrap();
        assert_eq!(message.get(1).unwrap().as_i32(), Some(7));
    }

    #[test]
    fn test_negative_int32_truncates() {
        // Field 1, -1 sign-extended to a 10-byte varint
        let mut data = vec![0x08];
        data.extend([0xFF; 9]);
        data.push(0x01);
        let message = Decoder::new().decode(&data, &sample()).unwrap();
        assert_eq!(message.get(1).unwrap().as_i32(), Some(-1));
    }

    #[test]
    fn test_repeated_messages_merge() {
        // inner { a: 1 } inner { b: 2 }
        let data = [0x1A, 0x02, 0x08, 0x01, 0x1A, 0x02, 0x10, 0x02];
        let message = Decoder::new().decode(&data, &sample()).unwrap();
        let inner = message.get(3).unwrap().into_owned();
        let inner = inner.as_message().unwrap();
        assert_eq!(inner.get(1).unwrap().as_i32(), Some(1));
        assert_eq!(inner.get(2).unwrap().as_i32(), Some(2));
    }

    #[test]
    fn test_packed_and_unpacked_accepted() {
        let expected = Value::List(vec![Value::Int32(1), Value::Int32(-1), Value::Int32(2)]);

        // Field 4, wire type 2 (len), length 3, zig-zag 1, -1, 2
        let packed = [0x22, 0x03, 0x02, 0x01, 0x04];
        let message = Decoder::new().decode(&packed, &sample()).unwrap();
        assert_eq!(message.get(4).unwrap().into_owned(), expected);

        // Field 4, wire type 0, once per element
        let expanded = [0x20, 0x02, 0x20, 0x01, 0x20, 0x04];
        let message = Decoder::new().decode(&expanded, &sample()).unwrap();
        assert_eq!(message.get(4).unwrap().into_owned(), expected);

        // One expanded element, then a packed block of two
        let mixed = [0x20, 0x02, 0x22, 0x02, 0x01, 0x04];
        let message = Decoder::new().decode(&mixed, &sample()).unwrap();
        assert_eq!(message.get(4).unwrap().into_owned(), expected);
    }

    #[test]
    fn test_unknown_fields_preserved_verbatim() {
        // id: 1, field 99 varint 5, field 100 "ab", field 101 fixed32
        let data = [
            0x08, 0x01, 0x98, 0x06, 0x05, 0xA2, 0x06, 0x02, b'a', b'b', 0xAD, 0x06, 1, 2, 3, 4,
        ];
        let message = Decoder::new().decode(&data, &sample()).unwrap();

        assert_eq!(message.unknown_fields().len(), 3);
        assert_eq!(message.unknown_fields()[0].number, 99);
        assert_eq!(message.unknown_fields()[1].data.as_ref(), &[0x02, b'a', b'b']);
        assert_eq!(message.unknown_fields()[2].wire_type, WireType::I32);
        assert_eq!(encode(&message).as_ref(), &data[..]);
    }

    #[test]
    fn test_unknown_group_preserved() {
        // field 9 start group { 1: 5 } end group 9
        let data = [0x4B, 0x08, 0x05, 0x4C];
        let message = Decoder::new().decode(&data, &sample()).unwrap();
        assert_eq!(message.unknown_fields()[0].wire_type, WireType::StartGroup);
        assert_eq!(encode(&message).as_ref(), &data[..]);
    }

    #[test]
    fn test_wrong_wire_type_is_unknown() {
        // id declared as int32 but sent as fixed32
        let data = [0x0D, 1, 0, 0, 0];
        let message = Decoder::new().decode(&data, &sample()).unwrap();
        assert!(!message.has(1));
        assert_eq!(message.unknown_fields().len(), 1);
    }

    #[test]
    fn test_discard_unknown_fields() {
        // Field 99, wire type 0, 5
        let decoder = Decoder::with_config(DecoderConfig::default().discard_unknown_fields(true));
        let message = decoder.decode(&[0x98, 0x06, 0x05], &sample()).unwrap();
        assert!(message.unknown_fields().is_empty());
    }

    #[test]
    fn test_truncated_input() {
        // Field 1 tag with no value
        let err = Decoder::new().decode(&[0x08], &sample()).unwrap_err();
        assert!(err.is_malformed());

        // Field 2, length 5, only 1 byte present
        let err = Decoder::new().decode(&[0x12, 0x05, b'a'], &sample()).unwrap_err();
        assert!(err.is_malformed());

        // Field 7, wire type 5 (fixed32), only 2 bytes present
        let err = Decoder::new().decode(&[0x3D, 0, 0], &sample()).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_truncated_tag() {
        // Tag varint with the continuation bit set and nothing after it
        let err = Decoder::new().decode(&[0x80], &sample()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { offset: 0, .. }));

        // Field 1 = 1, then a truncated tag starting at byte 2
        let err = Decoder::new()
            .decode(&[0x08, 0x01, 0x80], &sample())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { offset: 2, .. }));
    }

    #[test]
    fn test_empty_packed_block_leaves_field_unset() {
        // Field 4, wire type 2 (len), length 0
        let message = Decoder::new().decode(&[0x22, 0x00], &sample()).unwrap();
        assert!(!message.has(4));
        assert_eq!(message.get(4).unwrap().into_owned(), Value::List(Vec::new()));
        assert!(encode(&message).is_empty());
        assert_eq!(Decoder::new().decode(&encode(&message), &sample()).unwrap(), message);

        // An empty block after elements keeps what was decoded
        let message = Decoder::new()
            .decode(&[0x20, 0x02, 0x22, 0x00], &sample())
            .unwrap();
        assert_eq!(message.get(4).unwrap().into_owned(), Value::List(vec![Value::Int32(1)]));
    }

    #[test]
    fn test_error_offset_points_into_input() {
        // id: 1, then a truncated string
        let err = Decoder::new()
            .decode(&[0x08, 0x01, 0x12, 0x05, b'a'], &sample())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { offset: 4, .. }));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        // Field 2 (string), length 2, invalid UTF-8 sequence
        let err = Decoder::new()
            .decode(&[0x12, 0x02, 0xC3, 0x28], &sample())
            .unwrap_err();
        assert!(err.is_malformed());

        // Same bytes in field 6 (bytes) are accepted
        let message = Decoder::new()
            .decode(&[0x32, 0x02, 0xC3, 0x28], &sample())
            .unwrap();
        assert_eq!(message.get(6).unwrap().as_bytes().unwrap().as_ref(), &[0xC3, 0x28]);
    }

    #[test]
    fn test_invalid_wire_type_rejected() {
        // Field 1 with wire types 6 and 4 (end group without start)
        assert!(Decoder::new().decode(&[0x0E], &sample()).is_err());
        assert!(Decoder::new().decode(&[0x0C], &sample()).is_err());
    }

    #[test]
    fn test_unknown_enum_number_kept() {
        // Field 5 (enum), number 7 not declared
        let message = Decoder::new().decode(&[0x28, 0x07], &sample()).unwrap();
        assert_eq!(message.get(5).unwrap().into_owned(), Value::Enum(7));
    }

    #[test]
    fn test_recursion_limit() {
        let leaf = Arc::new(
            MessageDescriptor::builder("test.Leaf")
                .field(FieldDescriptor::new(1, "v", FieldKind::Int32))
                .build()
                .unwrap(),
        );
        let mid = Arc::new(
            MessageDescriptor::builder("test.Mid")
                .field(FieldDescriptor::new(1, "leaf", FieldKind::Message(leaf)))
                .build()
                .unwrap(),
        );
        let top = Arc::new(
            MessageDescriptor::builder("test.Top")
                .field(FieldDescriptor::new(1, "mid", FieldKind::Message(mid)))
                .build()
                .unwrap(),
        );
        // mid { leaf { v: 1 } }
        let data = [0x0A, 0x04, 0x0A, 0x02, 0x08, 0x01];

        let shallow = Decoder::with_config(DecoderConfig::default().recursion_limit(1));
        assert!(shallow.decode(&data, &top).unwrap_err().is_malformed());

        let deep = Decoder::with_config(DecoderConfig::default().recursion_limit(2));
        assert!(deep.decode(&data, &top).is_ok());
    }

    #[test]
    fn test_max_message_size() {
        let decoder = Decoder::with_config(DecoderConfig::default().max_message_size(2));
        assert!(decoder.decode(&[0x08, 0xAC, 0x02], &sample()).is_err());
        assert!(decoder.decode(&[0x08, 0x01], &sample()).is_ok());
    }

    #[test]
    fn test_length_delimited() {
        // Length 3, field 1 = 300, then one trailing byte
        let data = [0x03, 0x08, 0xAC, 0x02, 0xFF];
        let (message, consumed) = Decoder::new().decode_length_delimited(&data, &sample()).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(message.get(1).unwrap().as_i32(), Some(300));
    }

    #[test]
    fn test_merge_keeps_existing_on_error() {
        let decoder = Decoder::new();
        let mut message = decoder.decode(&[0x08, 0x01], &sample()).unwrap();

        assert!(decoder.merge(&mut message, &[0x10, 0x02, 0x12]).is_err());
        assert_eq!(message.get(1).unwrap().as_i32(), Some(1));

        decoder.merge(&mut message, &[0x12, 0x01, b'x']).unwrap();
        assert_eq!(message.get(2).unwrap().as_str(), Some("x"));
        assert_eq!(message.get(1).unwrap().as_i32(), Some(1));
    }

    #[test]
    fn test_float_round_trip() {
        let mut message = MessageInstance::new(sample());
        message.set(7, Value::Float(1.5)).unwrap();
        let decoded = Decoder::new().decode(&encode(&message), &sample()).unwrap();
        assert_eq!(decoded.get(7).unwrap().as_f32(), Some(1.5));
    }
}
