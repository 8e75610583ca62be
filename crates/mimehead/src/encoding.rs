//! MIME byte-level encoding primitives.
//!
//! `=XX` hex escaping (the quoted-printable family), Base64, and the
//! quoted-printable body codec built on top of them. Decoders are lenient:
//! truncated escapes pass through literally and Base64 junk is skipped.

use crate::charsets;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::fmt::Write as _;

/// Base64 engine that tolerates missing or stray padding on decode.
const PERMISSIVE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Bytes that survive `=XX` escaping unchanged: tab, CR, LF, space and the
/// printable ASCII range minus `"`, `=`, `?` and `_`.
const fn is_safe_byte(byte: u8) -> bool {
    matches!(
        byte,
        0x09 | 0x0A | 0x0D | 0x20 | 0x21 | 0x23..=0x3C | 0x3E | 0x40..=0x5E | 0x60..=0x7E
    )
}

/// Escapes all unsafe bytes to `=XX` form, where `XX` is the byte value in
/// hex. Does not touch line breaks; it only escapes character sequences.
#[must_use]
pub fn mime_encode(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len());
    for &byte in data {
        if is_safe_byte(byte) {
            result.push(byte as char);
        } else {
            let _ = write!(result, "={byte:02X}");
        }
    }
    result
}

/// Converts bytes from the given charset to UTF-8, then escapes them.
#[must_use]
pub fn mime_encode_charset(data: &[u8], from_charset: &str) -> String {
    mime_encode(&charsets::convert(data, from_charset))
}

fn hex_val(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|v| v as u8)
}

/// Reverses `=XX` escaping into raw bytes.
///
/// Truncated or invalid escapes (`=X` at end of input, bad hex digits) are
/// treated as literal characters rather than errors.
#[must_use]
pub fn mime_decode_bytes(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                result.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        result.push(bytes[i]);
        i += 1;
    }
    result
}

/// Decodes an `=XX`-escaped string into Unicode text via the given charset.
#[must_use]
pub fn mime_decode(s: &str, from_charset: &str) -> String {
    charsets::decode(&mime_decode_bytes(s), from_charset)
}

/// Encodes data as Base64.
#[must_use]
pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Converts bytes from the given charset to UTF-8, then Base64-encodes them.
#[must_use]
pub fn base64_encode_charset(data: &[u8], from_charset: &str) -> String {
    STANDARD.encode(charsets::convert(data, from_charset))
}

/// Decodes Base64, silently skipping characters outside the alphabet.
///
/// A trailing partial quantum is dropped rather than reported; this decoder
/// never fails.
#[must_use]
pub fn base64_decode(s: &str) -> Vec<u8> {
    let mut filtered: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/'))
        .collect();
    if filtered.len() % 4 == 1 {
        filtered.pop();
    }
    PERMISSIVE.decode(&filtered).unwrap_or_default()
}

/// Decodes Base64 text of the given charset into a Unicode string.
#[must_use]
pub fn base64_decode_charset(s: &str, from_charset: &str) -> String {
    charsets::decode(&base64_decode(s), from_charset)
}

/// Encodes bytes into quoted-printable.
///
/// Same as [`mime_encode`] except that line breaks are normalized to CRLF
/// and trailing whitespace on each line is escaped as well. Soft line breaks
/// are a separate folding step, see [`crate::fold::add_soft_linebreaks`].
#[must_use]
pub fn qp_encode(data: &[u8]) -> String {
    let escaped = mime_encode(data);

    // fix line breaks, ensure <CR><LF>
    let mut normalized = String::with_capacity(escaped.len());
    let mut chars = escaped.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                normalized.push_str("\r\n");
            }
            '\n' => normalized.push_str("\r\n"),
            other => normalized.push(other),
        }
    }

    // escape whitespace at the end of lines
    normalized
        .split("\r\n")
        .map(escape_trailing_whitespace)
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn escape_trailing_whitespace(line: &str) -> String {
    let trimmed = line.trim_end_matches([' ', '\t']);
    let mut out = trimmed.to_string();
    for c in line[trimmed.len()..].chars() {
        out.push_str(if c == ' ' { "=20" } else { "=09" });
    }
    out
}

/// Converts bytes from the given charset to UTF-8, then quoted-printable
/// encodes them.
#[must_use]
pub fn qp_encode_charset(data: &[u8], from_charset: &str) -> String {
    qp_encode(&charsets::convert(data, from_charset))
}

/// Decodes quoted-printable text of the given charset.
///
/// Strips soft line breaks (`=` immediately before a line break or at end of
/// input) before unescaping.
#[must_use]
pub fn qp_decode(s: &str, from_charset: &str) -> String {
    let mut stripped = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '=' {
            if i + 1 == chars.len() {
                break;
            }
            if chars[i + 1] == '\n' {
                i += 2;
                continue;
            }
            if chars[i + 1] == '\r' && chars.get(i + 2) == Some(&'\n') {
                i += 3;
                continue;
            }
        }
        stripped.push(chars[i]);
        i += 1;
    }
    mime_decode(&stripped, from_charset)
}

/// Checks whether a value uses only printable 7-bit characters (plus tab and
/// line breaks).
#[must_use]
pub fn is_plain_text(value: &str) -> bool {
    value
        .chars()
        .all(|c| matches!(c, '\t' | '\n' | '\r') || (' '..='\u{7F}').contains(&c))
}

/// Checks whether any line of a multi-line string is longer than
/// `line_length` characters.
///
/// Useful when deciding if a value needs any processing at all: short plain
/// text can be emitted untouched, long plain text wants `format=flowed`.
#[must_use]
pub fn has_longer_lines(s: &str, line_length: usize) -> bool {
    s.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .any(|line| line.chars().count() > line_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_encode_utf8() {
        assert_eq!(
            mime_encode("tere ÕÄÖÕ".as_bytes()),
            "tere =C3=95=C3=84=C3=96=C3=95"
        );
    }

    #[test]
    fn test_mime_encode_charset() {
        assert_eq!(mime_encode_charset(&[0xBD, 0xC5], "ks_c_5601-1987"), "=EC=8B=A0");
    }

    #[test]
    fn test_mime_decode_utf8() {
        assert_eq!(
            mime_decode("tere =C3=95=C3=84=C3=96=C3=95", "UTF-8"),
            "tere ÕÄÖÕ"
        );
    }

    #[test]
    fn test_mime_decode_charset() {
        assert_eq!(mime_decode("=BD=C5", "ks_c_5601-1987"), "신");
    }

    #[test]
    fn test_mime_decode_invalid_escape_is_literal() {
        assert_eq!(mime_decode("abc=", "UTF-8"), "abc=");
        assert_eq!(mime_decode("=X1 =4", "UTF-8"), "=X1 =4");
    }

    #[test]
    fn test_base64_encode() {
        assert_eq!(base64_encode("tere ÕÄÖÕ".as_bytes()), "dGVyZSDDlcOEw5bDlQ==");
    }

    #[test]
    fn test_base64_encode_charset() {
        assert_eq!(base64_encode_charset(&[0xBD, 0xC5], "ks_c_5601-1987"), "7Iug");
    }

    #[test]
    fn test_base64_decode() {
        assert_eq!(
            base64_decode_charset("dGVyZSDDlcOEw5bDlQ==", "UTF-8"),
            "tere ÕÄÖÕ"
        );
    }

    #[test]
    fn test_base64_decode_with_spaces() {
        assert_eq!(
            base64_decode_charset(
                " Y W J j M T     \nI z w 5 X D hM O W w 5 z F o M W 9 7 I ug",
                "UTF-8"
            ),
            "abc123ÕÄÖÜŠŽ신"
        );
    }

    #[test]
    fn test_base64_decode_with_invalid_symbols() {
        assert_eq!(
            base64_decode_charset(
                "õYüWŠJŽj M\rT\t\nI$zw5XDhMOWw5\u{8}zFoMW💩97Iug",
                "UTF-8"
            ),
            "abc123ÕÄÖÜŠŽ신"
        );
    }

    #[test]
    fn test_qp_encode() {
        assert_eq!(
            qp_encode("tere ÕÄ \t\nÕÄ \t\nÖÕ".as_bytes()),
            "tere =C3=95=C3=84=20=09\r\n=C3=95=C3=84=20=09\r\n=C3=96=C3=95"
        );
    }

    #[test]
    fn test_qp_encode_surrogate() {
        assert_eq!(qp_encode("💩".as_bytes()), "=F0=9F=92=A9");
    }

    #[test]
    fn test_qp_decode_soft_linebreaks() {
        assert_eq!(qp_decode("Tere =\r\nvana kere=", "UTF-8"), "Tere vana kere");
        assert_eq!(
            qp_decode(
                "tere =C3=95=C3=84=20=09\r\n=C3=95=\r\n=C3=84=\r\n=20=09\r\n=C3=96=C3=95=",
                "UTF-8"
            ),
            "tere ÕÄ \t\r\nÕÄ \t\r\nÖÕ"
        );
    }

    #[test]
    fn test_qp_decode_long_line() {
        let long_line = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789\
            ABCDEFGHIÄÄÄPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789\
            ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789\
            ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let encoded = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHI=\r\n\
            =C3=84=C3=84=C3=84PQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJ=\r\n\
            KLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVW=\r\n\
            XYZabcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(qp_decode(encoded, "UTF-8"), long_line);
    }

    #[test]
    fn test_is_plain_text() {
        assert!(is_plain_text("tere tere"));
        assert!(is_plain_text("line one\r\nline two"));
        assert!(!is_plain_text("tere õkva"));
        assert!(!is_plain_text("bell\u{7}"));
    }

    #[test]
    fn test_has_longer_lines() {
        assert!(!has_longer_lines("short\r\nlines", 10));
        assert!(has_longer_lines("short\r\na considerably longer line", 10));
    }
}
