//! HAProxy variable-length integers.
//!
//! Values below 240 fit in one byte. Larger values set the top nibble of
//! the first byte and continue in 7-bit groups, high bit meaning "more".

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::spop::FrameError;

/// Longest encoding of a `u64`.
const MAX_VARINT_LEN: usize = 10;

pub fn encode_varint(mut value: u64, buf: &mut BytesMut) {
    if value < 240 {
        buf.put_u8(value as u8);
        return;
    }

    buf.put_u8((value as u8) | 0xF0);
    value = (value - 240) >> 4;
    while value >= 128 {
        buf.put_u8((value as u8) | 0x80);
        value = (value - 128) >> 7;
    }
    buf.put_u8(value as u8);
}

pub fn decode_varint(buf: &mut Bytes) -> Result<u64, FrameError> {
    if !buf.has_remaining() {
        return Err(FrameError::Truncated);
    }

    let first = buf.get_u8();
    let mut value = u64::from(first);
    if first < 240 {
        return Ok(value);
    }

    let mut shift = 4u32;
    for _ in 1..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(FrameError::Truncated);
        }
        let byte = buf.get_u8();
        value = value.wrapping_add(u64::from(byte).wrapping_shl(shift));
        if byte < 128 {
            return Ok(value);
        }
        shift += 7;
    }

    Err(FrameError::VarintOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_varint(value, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(239), vec![0xEF]);
        assert_eq!(encoded(240), vec![0xF0, 0x00]);
        assert_eq!(encoded(2287), vec![0xFF, 0x7F]);
        assert_eq!(encoded(2288), vec![0xF0, 0x80, 0x00]);
    }

    #[test]
    fn boundaries_decode_back() {
        for value in [0, 1, 239, 240, 2287, 2288, 264_431, 264_432, 16_384, u32::MAX as u64, u64::MAX] {
            let mut bytes = Bytes::from(encoded(value));
            assert_eq!(decode_varint(&mut bytes).unwrap(), value, "value {value}");
            assert!(bytes.is_empty());
        }
    }

    #[test]
    fn truncated_input() {
        let mut bytes = Bytes::from_static(&[0xF5, 0x80]);
        assert!(matches!(decode_varint(&mut bytes), Err(FrameError::Truncated)));

        let mut empty = Bytes::new();
        assert!(matches!(decode_varint(&mut empty), Err(FrameError::Truncated)));
    }

    #[test]
    fn overlong_input() {
        let mut bytes = Bytes::from(vec![0xFF; 12]);
        assert!(matches!(decode_varint(&mut bytes), Err(FrameError::VarintOverflow)));
    }
}
