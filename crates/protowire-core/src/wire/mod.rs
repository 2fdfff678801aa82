//! Low-level protobuf wire format.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: group start/end (deprecated, only ever skipped)
//! - 5: I32 (fixed32, sfixed32, float)

mod primitive;

use crate::error::{Error, Result};
use bytes::BufMut;
use std::fmt;

pub use primitive::{
    decode_fixed32, decode_fixed64, decode_length_delimited, decode_varint, decode_zigzag32,
    decode_zigzag64, encode_fixed32, encode_fixed64, encode_length_delimited, encode_varint,
    encode_zigzag32, encode_zigzag64, encoded_len_varint, MAX_VARINT_LEN,
};

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Field numbers reserved for the protobuf implementation
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<u32> = 19_000..=19_999;

/// Default nesting limit for messages and groups
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl WireType {
    /// Returns the canonical wire type name
    pub fn as_str(&self) -> &'static str {
        match self {
            WireType::Varint => "VARINT",
            WireType::I64 => "FIXED64",
            WireType::Len => "LENGTH_DELIMITED",
            WireType::StartGroup => "START_GROUP",
            WireType::EndGroup => "END_GROUP",
            WireType::I32 => "FIXED32",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::malformed(0, format!("invalid wire type: {}", value))),
        }
    }
}

/// Returns true if `number` may be declared by a message field.
pub fn is_valid_field_number(number: u32) -> bool {
    (1..=MAX_FIELD_NUMBER).contains(&number) && !RESERVED_FIELD_NUMBERS.contains(&number)
}

/// Encode a field tag.
pub fn encode_tag(number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    encode_varint(((number as u64) << 3) | wire_type as u64, buf);
}

/// Number of bytes `encode_tag` writes for `number`.
pub fn encoded_len_tag(number: u32) -> usize {
    encoded_len_varint((number as u64) << 3)
}

/// Decode a field tag.
///
/// Returns the field number, the wire type and the bytes consumed.
pub fn decode_tag(data: &[u8]) -> Result<(u32, WireType, usize)> {
    if data.is_empty() {
        return Err(Error::malformed(0, "expected field tag, found end of input"));
    }

    let (tag, tag_len) = decode_varint(data)
        .map_err(|_| Error::malformed(0, "failed to decode field tag"))?;

    if tag > u32::MAX as u64 {
        return Err(Error::malformed(0, format!("tag {} out of range", tag)));
    }

    let wire_type = WireType::try_from((tag & 0x07) as u8)?;
    let number = (tag >> 3) as u32;

    if number == 0 || number > MAX_FIELD_NUMBER {
        return Err(Error::malformed(
            0,
            format!("invalid field number {} in tag", number),
        ));
    }

    Ok((number, wire_type, tag_len))
}

/// Skip over one field value whose tag has already been read.
///
/// `data` starts right after the tag. Returns the number of value bytes,
/// which for groups includes the closing end-group tag.
pub fn skip_field(number: u32, wire_type: WireType, data: &[u8]) -> Result<usize> {
    skip_field_nested(number, wire_type, data, DEFAULT_RECURSION_LIMIT)
}

fn skip_field_nested(number: u32, wire_type: WireType, data: &[u8], depth: u32) -> Result<usize> {
    match wire_type {
        WireType::Varint => decode_varint(data).map(|(_, len)| len),
        WireType::I64 => decode_fixed64(data).map(|(_, len)| len),
        WireType::I32 => decode_fixed32(data).map(|(_, len)| len),
        WireType::Len => decode_length_delimited(data).map(|(_, len)| len),
        WireType::StartGroup => {
            if depth == 0 {
                return Err(Error::malformed(0, "group nesting exceeds recursion limit"));
            }

            let mut position = 0;
            loop {
                let (inner_number, inner_type, tag_len) =
                    decode_tag(&data[position..]).map_err(|e| e.shift_offset(position))?;
                position += tag_len;

                if inner_type == WireType::EndGroup {
                    if inner_number != number {
                        return Err(Error::malformed(
                            position - tag_len,
                            format!(
                                "end group {} does not match start group {}",
                                inner_number, number
                            ),
                        ));
                    }
                    return Ok(position);
                }

                position += skip_field_nested(
                    inner_number,
                    inner_type,
                    &data[position..],
                    depth - 1,
                )
                .map_err(|e| e.shift_offset(position))?;
            }
        }
        WireType::EndGroup => Err(Error::malformed(
            0,
            format!("unexpected end group for field {}", number),
        )),
    }
}
