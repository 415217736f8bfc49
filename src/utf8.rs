//! Modified UTF-8 string codec.
//!
//! Field names and string payloads use the Java-compatible modified encoding
//! rather than standard UTF-8: `U+0000` is written as the two-byte sequence
//! `C0 80`, and supplementary code points are written as a surrogate pair
//! with each surrogate encoded as a three-byte unit (CESU-8). Plain four-byte
//! UTF-8 sequences never appear on the wire.

use crate::error::{Error, Result};

/// Number of bytes `s` occupies in modified UTF-8.
pub fn encoded_len(s: &str) -> usize {
    s.chars()
        .map(|c| match c as u32 {
            0 => 2,
            0x01..=0x7f => 1,
            0x80..=0x7ff => 2,
            0x800..=0xffff => 3,
            _ => 6,
        })
        .sum()
}

/// Append `s` to `buf` in modified UTF-8.
pub fn encode(buf: &mut Vec<u8>, s: &str) {
    for c in s.chars() {
        let cp = c as u32;
        match cp {
            0 => buf.extend_from_slice(&[0xc0, 0x80]),
            0x01..=0x7f => buf.push(cp as u8),
            0x80..=0x7ff => {
                buf.push(0xc0 | (cp >> 6) as u8);
                buf.push(0x80 | (cp & 0x3f) as u8);
            }
            0x800..=0xffff => {
                buf.push(0xe0 | (cp >> 12) as u8);
                buf.push(0x80 | ((cp >> 6) & 0x3f) as u8);
                buf.push(0x80 | (cp & 0x3f) as u8);
            }
            _ => {
                // Supplementary plane: emit the surrogate pair, three bytes
                // per surrogate.
                let v = cp - 0x1_0000;
                encode_unit(buf, 0xd800 + (v >> 10));
                encode_unit(buf, 0xdc00 + (v & 0x3ff));
            }
        }
    }
}

fn encode_unit(buf: &mut Vec<u8>, unit: u32) {
    buf.push(0xe0 | (unit >> 12) as u8);
    buf.push(0x80 | ((unit >> 6) & 0x3f) as u8);
    buf.push(0x80 | (unit & 0x3f) as u8);
}

/// Decode a modified UTF-8 byte slice into a `String`.
///
/// Accepts both `C0 80` and a bare `00` for `U+0000`, and rejoins CESU-8
/// surrogate pairs into their supplementary code points.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 < 0x80 {
            out.push(b0 as char);
            i += 1;
        } else if b0 & 0xe0 == 0xc0 {
            let b1 = continuation(bytes, i + 1)?;
            let cp = ((b0 as u32 & 0x1f) << 6) | b1;
            // C0 80 is the NUL escape; any other over-long two-byte sequence
            // is invalid.
            if cp < 0x80 && !(b0 == 0xc0 && cp == 0) {
                return Err(Error::malformed("over-long two-byte UTF-8 sequence"));
            }
            out.push(char::from_u32(cp).expect("two-byte range is always valid"));
            i += 2;
        } else if b0 & 0xf0 == 0xe0 {
            let unit = decode_unit(bytes, i)?;
            i += 3;
            match unit {
                0xd800..=0xdbff => {
                    // High surrogate: the low half must follow immediately.
                    if i + 2 >= bytes.len() || bytes[i] & 0xf0 != 0xe0 {
                        return Err(Error::malformed("unpaired high surrogate"));
                    }
                    let low = decode_unit(bytes, i)?;
                    if !(0xdc00..=0xdfff).contains(&low) {
                        return Err(Error::malformed("unpaired high surrogate"));
                    }
                    i += 3;
                    let cp = 0x1_0000 + (((unit - 0xd800) << 10) | (low - 0xdc00));
                    out.push(char::from_u32(cp).ok_or_else(|| {
                        Error::malformed("surrogate pair outside Unicode range")
                    })?);
                }
                0xdc00..=0xdfff => {
                    return Err(Error::malformed("unpaired low surrogate"));
                }
                _ => {
                    if unit < 0x800 {
                        return Err(Error::malformed("over-long three-byte UTF-8 sequence"));
                    }
                    out.push(char::from_u32(unit).expect("BMP non-surrogate is valid"));
                }
            }
        } else {
            return Err(Error::malformed("invalid modified UTF-8 lead byte"));
        }
    }
    Ok(out)
}

fn decode_unit(bytes: &[u8], i: usize) -> Result<u32> {
    let b1 = continuation(bytes, i + 1)?;
    let b2 = continuation(bytes, i + 2)?;
    Ok(((bytes[i] as u32 & 0x0f) << 12) | (b1 << 6) | b2)
}

fn continuation(bytes: &[u8], i: usize) -> Result<u32> {
    match bytes.get(i) {
        Some(&b) if b & 0xc0 == 0x80 => Ok(b as u32 & 0x3f),
        Some(_) => Err(Error::malformed("invalid UTF-8 continuation byte")),
        None => Err(Error::truncated("modified UTF-8 sequence")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn round_trip(s: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        encode(&mut buf, s);
        assert_eq!(buf.len(), encoded_len(s));
        assert_eq!(decode(&buf).unwrap(), s);
        buf
    }

    #[test]
    fn ascii() {
        assert_eq!(round_trip("hello"), b"hello");
    }

    #[test]
    fn nul_encodes_as_two_bytes() {
        let buf = round_trip("a\0b");
        assert_eq!(buf, [0x61, 0xc0, 0x80, 0x62]);
    }

    #[test]
    fn bare_nul_byte_accepted_on_decode() {
        assert_eq!(decode(&[0x61, 0x00, 0x62]).unwrap(), "a\0b");
    }

    #[test]
    fn two_and_three_byte_ranges() {
        assert_eq!(round_trip("é"), [0xc3, 0xa9]);
        assert_eq!(round_trip("€"), [0xe2, 0x82, 0xac]);
    }

    #[test]
    fn supplementary_uses_surrogate_pair() {
        // U+1D11E MUSICAL SYMBOL G CLEF -> D834 DD1E as CESU-8.
        let buf = round_trip("\u{1d11e}");
        assert_eq!(buf, [0xed, 0xa0, 0xb4, 0xed, 0xb4, 0x9e]);
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn four_byte_utf8_rejected() {
        // Standard UTF-8 for U+1D11E; not legal in the modified encoding.
        assert_matches!(
            decode(&[0xf0, 0x9d, 0x84, 0x9e]),
            Err(Error::MalformedStream(_))
        );
    }

    #[test]
    fn unpaired_surrogate_rejected() {
        assert_matches!(
            decode(&[0xed, 0xa0, 0xb4]),
            Err(Error::MalformedStream(_))
        );
        assert_matches!(
            decode(&[0xed, 0xb4, 0x9e]),
            Err(Error::MalformedStream(_))
        );
    }

    #[test]
    fn truncated_sequence() {
        assert_matches!(decode(&[0xc3]), Err(Error::TruncatedStream { .. }));
    }
}
