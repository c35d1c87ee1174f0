//! UTF-16 validator + escaper (C2, 16-bit code-unit arity).
//!
//! Unlike the byte-sequence path, code units are never recombined into a
//! scalar before escaping: `spec.md` §4.1/§4.2 specify that any code unit
//! above `0xFF` is classified as needing escape and reproduced as its own
//! `\uXXXX`, so a surrogate pair in the input naturally round-trips as the
//! two independent `\uXXXX\uXXXX` escapes a conformant JSON parser expects
//! — the same representation `JSON.stringify` produces for astral
//! characters in a UTF-16-native language. The only extra validation this
//! arity needs is surrogate *pairing*, not scalar decoding.

use crate::error::{JsonWriteError, Result};
use crate::escape::lut;
use crate::escape::utf8::write_hex_escape;

/// Worst-case expansion factor, same as the byte-sequence path
/// (`spec.md` §4.5): every code unit can become a 6-byte `\uXXXX` escape.
pub const ESCAPE_EXPANSION_FACTOR: usize = 6;

const HIGH_SURROGATE: core::ops::RangeInclusive<u16> = 0xD800..=0xDBFF;
const LOW_SURROGATE: core::ops::RangeInclusive<u16> = 0xDC00..=0xDFFF;

/// Validate that `units` contains no lone or misordered surrogates. A high
/// surrogate must be immediately followed by a low surrogate; anything
/// else fails with [`JsonWriteError::InvalidUtf16`] at the offending
/// offset.
pub fn validate(units: &[u16]) -> Result<()> {
    let mut i = 0;
    while i < units.len() {
        let u = units[i];
        if HIGH_SURROGATE.contains(&u) {
            match units.get(i + 1) {
                Some(&lo) if LOW_SURROGATE.contains(&lo) => i += 2,
                _ => return Err(JsonWriteError::InvalidUtf16 { offset: i }),
            }
        } else if LOW_SURROGATE.contains(&u) {
            return Err(JsonWriteError::InvalidUtf16 { offset: i });
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Worst-case number of escaped bytes `units` could expand into.
pub fn max_escaped_len(unit_count: usize) -> Result<usize> {
    unit_count
        .checked_mul(ESCAPE_EXPANSION_FACTOR)
        .ok_or(JsonWriteError::ArgumentTooLarge { len: unit_count })
}

#[inline]
fn escape_one_unit(dest: &mut [u8], at: usize, u: u16) -> usize {
    match u {
        0x22 => {
            dest[at] = b'\\';
            dest[at + 1] = b'"';
            2
        }
        0x0A => {
            dest[at] = b'\\';
            dest[at + 1] = b'n';
            2
        }
        0x0D => {
            dest[at] = b'\\';
            dest[at + 1] = b'r';
            2
        }
        0x09 => {
            dest[at] = b'\\';
            dest[at + 1] = b't';
            2
        }
        0x5C => {
            dest[at] = b'\\';
            dest[at + 1] = b'\\';
            2
        }
        0x2F => {
            dest[at] = b'\\';
            dest[at + 1] = lut::SOLIDUS;
            2
        }
        0x08 => {
            dest[at] = b'\\';
            dest[at + 1] = b'b';
            2
        }
        0x0C => {
            dest[at] = b'\\';
            dest[at + 1] = b'f';
            2
        }
        _ => write_hex_escape(dest, at, u),
    }
}

/// C2 contract for 16-bit input: escape `units` into `dest`, given
/// `first_escape_index` (from [`lut::first_escape_index_u16`]). Caller
/// must have already called [`validate`] and sized `dest` to at least
/// [`max_escaped_len`]`(units.len())`.
pub fn escape_into(units: &[u16], first_escape_index: usize, dest: &mut [u8]) -> usize {
    debug_assert!(first_escape_index <= units.len());

    let mut written = 0;
    for &u in &units[..first_escape_index] {
        dest[written] = u as u8;
        written += 1;
    }

    for &u in &units[first_escape_index..] {
        if u <= 0xFF && !lut::byte_needs_escape(u as u8) {
            dest[written] = u as u8;
            written += 1;
        } else {
            written += escape_one_unit(dest, written, u);
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape_units(units: &[u16]) -> String {
        validate(units).unwrap();
        let idx = lut::first_escape_index_u16(units);
        let first = if idx < 0 { units.len() } else { idx as usize };
        let mut dest = vec![0u8; max_escaped_len(units.len()).unwrap()];
        let written = escape_into(units, first, &mut dest);
        dest.truncate(written);
        String::from_utf8(dest).unwrap()
    }

    #[test]
    fn clean_ascii_units_pass_through() {
        let units: Vec<u16> = "hello".encode_utf16().collect();
        assert_eq!(escape_units(&units), "hello");
    }

    #[test]
    fn bmp_non_ascii_unit_is_a_single_escape() {
        let units: Vec<u16> = "\u{03c0}".encode_utf16().collect();
        assert_eq!(escape_units(&units), "\\u03c0");
    }

    #[test]
    fn quote_uses_short_form_not_unicode_escape() {
        let units: Vec<u16> = "a\"b".encode_utf16().collect();
        assert_eq!(escape_units(&units), "a\\\"b");
    }

    #[test]
    fn surrogate_pair_escapes_as_two_units() {
        let units: Vec<u16> = "\u{1F600}".encode_utf16().collect();
        assert_eq!(units.len(), 2);
        assert_eq!(escape_units(&units), "\\ud83d\\ude00");
    }

    #[test]
    fn lone_high_surrogate_is_rejected() {
        let units = [0xD800u16];
        assert_eq!(
            validate(&units).unwrap_err(),
            JsonWriteError::InvalidUtf16 { offset: 0 }
        );
    }

    #[test]
    fn lone_low_surrogate_is_rejected() {
        let units = [0xDC00u16];
        assert_eq!(
            validate(&units).unwrap_err(),
            JsonWriteError::InvalidUtf16 { offset: 0 }
        );
    }

    #[test]
    fn misordered_surrogate_pair_is_rejected() {
        let units = [0xDC00u16, 0xD800u16];
        assert_eq!(
            validate(&units).unwrap_err(),
            JsonWriteError::InvalidUtf16 { offset: 0 }
        );
    }
}
