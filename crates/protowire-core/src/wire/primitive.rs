//! Primitive value codec: varints, zig-zag, fixed-width and length-delimited.
//!
//! Decoders take a slice starting at the value and return the decoded value
//! together with the number of bytes consumed. Error offsets are relative to
//! the slice they were given.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut};

/// Longest legal varint encoding of a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

/// Encode a varint into the buffer.
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes `encode_varint` writes for `value`.
pub fn encoded_len_varint(value: u64) -> usize {
    // 7 payload bits per byte, at least one byte
    ((((value | 1).leading_zeros() ^ 63) * 9 + 73) / 64) as usize
}

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(Error::malformed(i, "varint longer than 10 bytes"));
        }
        if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(Error::malformed(i, "varint overflows 64 bits"));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::malformed(data.len(), "truncated varint"))
}

/// Zig-zag encode a signed 32-bit integer.
pub fn encode_zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Zig-zag decode into a signed 32-bit integer.
pub fn decode_zigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Zig-zag encode a signed 64-bit integer.
pub fn encode_zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Zig-zag decode into a signed 64-bit integer.
pub fn decode_zigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Encode a little-endian 32-bit value.
pub fn encode_fixed32(value: u32, buf: &mut impl BufMut) {
    buf.put_u32_le(value);
}

/// Encode a little-endian 64-bit value.
pub fn encode_fixed64(value: u64, buf: &mut impl BufMut) {
    buf.put_u64_le(value);
}

/// Decode a little-endian 32-bit value.
pub fn decode_fixed32(data: &[u8]) -> Result<(u32, usize)> {
    if data.len() < 4 {
        return Err(Error::malformed(
            data.len(),
            format!("need 4 bytes for fixed32, have {}", data.len()),
        ));
    }
    let mut raw = &data[..4];
    Ok((raw.get_u32_le(), 4))
}

/// Decode a little-endian 64-bit value.
pub fn decode_fixed64(data: &[u8]) -> Result<(u64, usize)> {
    if data.len() < 8 {
        return Err(Error::malformed(
            data.len(),
            format!("need 8 bytes for fixed64, have {}", data.len()),
        ));
    }
    let mut raw = &data[..8];
    Ok((raw.get_u64_le(), 8))
}

/// Write a varint length prefix followed by the bytes.
pub fn encode_length_delimited(value: &[u8], buf: &mut impl BufMut) {
    encode_varint(value.len() as u64, buf);
    buf.put_slice(value);
}

/// Decode a length-delimited value.
///
/// Returns the payload and the total bytes consumed (prefix included).
pub fn decode_length_delimited(data: &[u8]) -> Result<(&[u8], usize)> {
    let (length, prefix_len) = decode_varint(data)?;
    let remaining = data.len() - prefix_len;

    if length > remaining as u64 {
        return Err(Error::malformed(
            prefix_len,
            format!("declared length {} exceeds remaining {} bytes", length, remaining),
        ));
    }

    let end = prefix_len + length as usize;
    Ok((&data[prefix_len..end], end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn varint_bytes(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(value, &mut buf);
        buf
    }

    #[test]
    fn test_encode_varint() {
        assert_eq!(varint_bytes(0), vec![0x00]);
        assert_eq!(varint_bytes(1), vec![0x01]);
        assert_eq!(varint_bytes(127), vec![0x7F]);
        assert_eq!(varint_bytes(128), vec![0x80, 0x01]);
        assert_eq!(varint_bytes(300), vec![0xAC, 0x02]);
        assert_eq!(varint_bytes(u64::MAX).len(), 10);
    }

    #[test]
    fn test_encoded_len_matches_encoding() {
        for value in [0, 1, 127, 128, 300, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            assert_eq!(encoded_len_varint(value), varint_bytes(value).len(), "value {value}");
        }
    }

    #[test]
    fn test_decode_varint_single_byte() {
        let (value, len) = decode_varint(&[0x08]).unwrap();
        assert_eq!(value, 8);
        assert_eq!(len, 1);
    }

    #[test]
    fn test_decode_varint_multi_byte() {
        // 300 in two bytes, trailing byte not consumed
        let (value, len) = decode_varint(&[0xAC, 0x02, 0xFF]).unwrap();
        assert_eq!(value, 300);
        assert_eq!(len, 2);
    }

    #[test]
    fn test_decode_varint_max() {
        // Nine continuation bytes, final byte carries bit 63
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, u64::MAX);
        assert_eq!(len, 10);
    }

    #[test]
    fn test_decode_varint_truncated() {
        // Continuation bit set on the last byte
        let err = decode_varint(&[0xAC]).unwrap_err();
        assert!(err.is_malformed());
        assert!(decode_varint(&[]).is_err());
    }

    #[test]
    fn test_decode_varint_too_long() {
        // Eleven bytes, one past the 10-byte limit
        let data = [0xFF; 11];
        assert!(decode_varint(&data).unwrap_err().is_malformed());

        // Tenth byte sets bits above 63
        let overflow = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02];
        assert!(decode_varint(&overflow).is_err());
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(encode_zigzag32(0), 0);
        assert_eq!(encode_zigzag32(-1), 1);
        assert_eq!(encode_zigzag32(1), 2);
        assert_eq!(encode_zigzag32(-2), 3);
        assert_eq!(encode_zigzag32(i32::MAX), 0xFFFF_FFFE);
        assert_eq!(encode_zigzag32(i32::MIN), 0xFFFF_FFFF);
        assert_eq!(decode_zigzag32(0xFFFF_FFFF), i32::MIN);
        assert_eq!(encode_zigzag64(-1), 1);
        assert_eq!(decode_zigzag64(u64::MAX), i64::MIN);
        assert_eq!(decode_zigzag64(encode_zigzag64(-123_456_789)), -123_456_789);
    }

    #[test]
    fn test_fixed_little_endian() {
        let mut buf = Vec::new();
        encode_fixed32(0x0403_0201, &mut buf);
        assert_eq!(buf, vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(decode_fixed32(&buf).unwrap(), (0x0403_0201, 4));

        let mut buf = Vec::new();
        encode_fixed64(1, &mut buf);
        assert_eq!(buf, vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_fixed64(&buf).unwrap(), (1, 8));
    }

    #[test]
    fn test_fixed_truncated() {
        assert!(decode_fixed32(&[0x01, 0x02, 0x03]).unwrap_err().is_malformed());
        assert!(decode_fixed64(&[0x00; 7]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_length_delimited() {
        let mut buf = Vec::new();
        encode_length_delimited(b"hello", &mut buf);
        // Length 5, "hello"
        assert_eq!(buf, vec![0x05, b'h', b'e', b'l', b'l', b'o']);

        let (payload, consumed) = decode_length_delimited(&buf).unwrap();
        assert_eq!(payload, b"hello");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_length_overrun() {
        // Length 5, only 2 bytes follow
        let err = decode_length_delimited(&[0x05, b'h', b'i']).unwrap_err();
        assert!(err.to_string().contains("exceeds remaining"));
    }
}
