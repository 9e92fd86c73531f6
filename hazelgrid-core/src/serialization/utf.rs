//! Modified UTF-8 text encoding.
//!
//! Text is written as UTF-16 code units, each encoded in one to three bytes:
//! U+0000 becomes `C0 80` so encoded text never contains a zero byte, and
//! supplementary characters are written as two three-byte surrogates.

use super::ByteOrder;
use crate::error::{GridError, Result};

/// Size of the per-stream scratch buffer used to encode text.
pub const UTF_BUFFER_SIZE: usize = 1024;

/// Returns the number of bytes `s` occupies in modified UTF-8.
pub fn encoded_len(s: &str) -> usize {
    s.encode_utf16().map(unit_len).sum()
}

#[inline]
fn unit_len(unit: u16) -> usize {
    match unit {
        0x0001..=0x007F => 1,
        0x0000 | 0x0080..=0x07FF => 2,
        _ => 3,
    }
}

/// Encodes `s` into `dst`, which must be exactly [`encoded_len`] bytes long.
pub fn encode_into(s: &str, dst: &mut [u8]) {
    let mut pos = 0;
    for unit in s.encode_utf16() {
        match unit_len(unit) {
            1 => {
                dst[pos] = unit as u8;
                pos += 1;
            }
            2 => {
                dst[pos] = 0xC0 | ((unit >> 6) & 0x1F) as u8;
                dst[pos + 1] = 0x80 | (unit & 0x3F) as u8;
                pos += 2;
            }
            _ => {
                dst[pos] = 0xE0 | ((unit >> 12) & 0x0F) as u8;
                dst[pos + 1] = 0x80 | ((unit >> 6) & 0x3F) as u8;
                dst[pos + 2] = 0x80 | (unit & 0x3F) as u8;
                pos += 3;
            }
        }
    }
    debug_assert_eq!(pos, dst.len());
}

/// Encodes `s` into a new vector.
pub fn encode(s: &str) -> Vec<u8> {
    let mut buf = vec![0u8; encoded_len(s)];
    encode_into(s, &mut buf);
    buf
}

/// Decodes modified UTF-8 bytes.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = continuation(bytes, i, 1)?;
            units.push((u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = continuation(bytes, i, 1)?;
            let b3 = continuation(bytes, i, 2)?;
            units.push(
                (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F),
            );
            i += 3;
        } else {
            return Err(GridError::CorruptPayload(format!(
                "invalid UTF lead byte 0x{:02x} at offset {}",
                b, i
            )));
        }
    }
    String::from_utf16(&units)
        .map_err(|e| GridError::CorruptPayload(format!("invalid UTF text: {}", e)))
}

fn continuation(bytes: &[u8], start: usize, offset: usize) -> Result<u8> {
    match bytes.get(start + offset) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(b),
        Some(&b) => Err(GridError::CorruptPayload(format!(
            "invalid UTF continuation byte 0x{:02x} at offset {}",
            b,
            start + offset
        ))),
        None => Err(GridError::CorruptPayload(format!(
            "truncated UTF sequence at offset {}",
            start
        ))),
    }
}

/// Writes `[i32 length][modified UTF-8]` through `sink`.
///
/// The text is encoded into `scratch`, which is allocated with
/// [`UTF_BUFFER_SIZE`] bytes on first use and kept by the caller; text longer
/// than the scratch buffer is encoded into a one-off allocation instead.
pub(crate) fn write_with_scratch<F>(
    scratch: &mut Option<Vec<u8>>,
    order: ByteOrder,
    s: &str,
    mut sink: F,
) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    let len = encoded_len(s);
    let prefix = i32::try_from(len).map_err(|_| {
        GridError::Serialization(format!("text of {} bytes exceeds the length prefix", len))
    })?;
    sink(&order.i32_to_bytes(prefix))?;

    let pooled = scratch.get_or_insert_with(|| vec![0u8; UTF_BUFFER_SIZE]);
    if len <= pooled.len() {
        encode_into(s, &mut pooled[..len]);
        sink(&pooled[..len])
    } else {
        sink(&encode(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_one_byte_per_char() {
        assert_eq!(encoded_len("hello"), 5);
        assert_eq!(encode("hello"), b"hello".to_vec());
    }

    #[test]
    fn test_nul_is_two_bytes() {
        assert_eq!(encode("\0"), vec![0xC0, 0x80]);
        assert_eq!(decode(&[0xC0, 0x80]).unwrap(), "\0");
    }

    #[test]
    fn test_two_and_three_byte_chars() {
        assert_eq!(encode("\u{00E9}"), vec![0xC3, 0xA9]);
        assert_eq!(encode("\u{20AC}"), vec![0xE2, 0x82, 0xAC]);
    }

    #[test]
    fn test_supplementary_char_is_surrogate_pair() {
        let s = "\u{1F600}";
        assert_eq!(encoded_len(s), 6);
        assert_eq!(encode(s), vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(decode(&encode(s)).unwrap(), s);
    }

    #[test]
    fn test_mixed_text_roundtrip() {
        let s = "key:\u{0}caf\u{00E9}-\u{20AC}-\u{1F600}!";
        assert_eq!(decode(&encode(s)).unwrap(), s);
    }

    #[test]
    fn test_decode_rejects_bad_lead_byte() {
        assert!(matches!(decode(&[0xFF]), Err(GridError::CorruptPayload(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_sequence() {
        assert!(matches!(decode(&[0xE2, 0x82]), Err(GridError::CorruptPayload(_))));
    }

    #[test]
    fn test_decode_rejects_lone_surrogate() {
        assert!(matches!(
            decode(&[0xED, 0xA0, 0xBD]),
            Err(GridError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_scratch_is_allocated_once_and_reused() {
        let mut scratch = None;
        let mut out = Vec::new();
        write_with_scratch(&mut scratch, ByteOrder::BigEndian, "abc", |b| {
            out.extend_from_slice(b);
            Ok(())
        })
        .unwrap();
        assert_eq!(out, vec![0, 0, 0, 3, b'a', b'b', b'c']);
        let first = scratch.as_ref().map(|b| b.as_ptr()).unwrap();

        write_with_scratch(&mut scratch, ByteOrder::BigEndian, "defg", |_| Ok(())).unwrap();
        assert_eq!(scratch.as_ref().map(|b| b.as_ptr()).unwrap(), first);
        assert_eq!(scratch.as_ref().map(Vec::len), Some(UTF_BUFFER_SIZE));
    }

    #[test]
    fn test_long_text_bypasses_scratch() {
        let text = "x".repeat(UTF_BUFFER_SIZE * 3);
        let mut scratch = None;
        let mut out = Vec::new();
        write_with_scratch(&mut scratch, ByteOrder::LittleEndian, &text, |b| {
            out.extend_from_slice(b);
            Ok(())
        })
        .unwrap();
        assert_eq!(&out[..4], &(text.len() as i32).to_le_bytes());
        assert_eq!(&out[4..], text.as_bytes());
        assert_eq!(scratch.map(|b| b.len()), Some(UTF_BUFFER_SIZE));
    }
}
