//! RFC 2047 encoded words.
//!
//! Builds and parses `=?charset?Q|B?payload?=` tokens, splitting oversized
//! payloads into chains of adjacent words without ever dividing an escape
//! sequence or a multi-byte character between chunks.

use crate::charsets;
use crate::encoding;
use crate::error::{Error, Result};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

/// Encoded words always advertise UTF-8; legacy charsets are converted on
/// the way in.
const TARGET_CHARSET: &str = "UTF-8";

/// Fixed overhead of the `=?UTF-8?X?...?=` envelope.
const ENVELOPE: usize = 7 + TARGET_CHARSET.len();

/// Payload encoding of an encoded word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WordEncoding {
    /// Quoted-printable derived encoding, space mapped to `_` (RFC 2047 §4.2).
    #[default]
    Q,
    /// Base64 (RFC 2047 §4.1).
    B,
}

impl WordEncoding {
    fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'q' | 'Q' => Some(Self::Q),
            'b' | 'B' => Some(Self::B),
            _ => None,
        }
    }
}

impl fmt::Display for WordEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Q => write!(f, "Q"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Options for the encoded-word builders.
#[derive(Debug, Clone, Default)]
pub struct WordEncodeOptions {
    /// Payload encoding to use.
    pub encoding: WordEncoding,
    /// When non-zero, split payloads so that no single encoded word exceeds
    /// this many characters (envelope included).
    pub max_length: usize,
    /// Charset of byte input for the `_bytes` variants; `None` means UTF-8.
    pub from_charset: Option<String>,
}

/// A single parsed RFC 2047 encoded word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedWord {
    /// Charset label, possibly carrying an RFC 2231 `*lang` suffix.
    pub charset: String,
    /// Payload encoding.
    pub encoding: WordEncoding,
    /// Raw, still-encoded payload text.
    pub payload: String,
}

impl EncodedWord {
    /// Decodes the payload into Unicode text. Lossy and total.
    #[must_use]
    pub fn decode(&self) -> String {
        decode_word(&self.charset, self.encoding, &self.payload)
    }
}

impl FromStr for EncodedWord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let inner = s
            .strip_prefix("=?")
            .and_then(|rest| rest.strip_suffix("?="))
            .ok_or_else(|| Error::InvalidEncodedWord(s.to_string()))?;

        let mut parts = inner.split('?');
        let (Some(charset), Some(flag), Some(payload), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidEncodedWord(s.to_string()));
        };
        if charset.is_empty() || !charset.chars().all(is_charset_char) {
            return Err(Error::InvalidEncodedWord(s.to_string()));
        }
        let mut flag_chars = flag.chars();
        let encoding = match (flag_chars.next(), flag_chars.next()) {
            (Some(c), None) => {
                WordEncoding::from_flag(c).ok_or_else(|| Error::UnsupportedEncoding(flag.to_string()))?
            }
            _ => return Err(Error::UnsupportedEncoding(flag.to_string())),
        };

        Ok(Self {
            charset: charset.to_string(),
            encoding,
            payload: payload.to_string(),
        })
    }
}

impl fmt::Display for EncodedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "=?{}?{}?{}?=", self.charset, self.encoding, self.payload)
    }
}

fn is_charset_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '*')
}

/// Encodes text into one UTF-8 encoded word, or a space-separated chain of
/// them when `opts.max_length` forces splitting.
#[must_use]
pub fn encode_word(data: &str, opts: &WordEncodeOptions) -> String {
    let mut max_length = opts.max_length;
    if max_length > ENVELOPE {
        max_length -= ENVELOPE;
    }

    match opts.encoding {
        WordEncoding::Q => {
            let escaped = q_escape(&encoding::mime_encode(data.as_bytes()));
            let payload = if max_length > 0 && escaped.len() > max_length {
                split_mime_encoded(&escaped, max_length).join("?= =?UTF-8?Q?")
            } else {
                escaped
            };
            format!("=?UTF-8?Q?{payload}?=")
        }
        WordEncoding::B => {
            let full = encoding::base64_encode(data.as_bytes());
            // budget counts raw bytes per chunk, whole quanta only
            let raw_budget = if max_length > 0 {
                (max_length / 4 * 3).max(3)
            } else {
                0
            };
            if raw_budget > 0 && full.len() > raw_budget {
                // an encoded word must hold an integral number of characters
                // (RFC 2047 §6.3), so chunks split on char boundaries only
                let mut parts: Vec<String> = Vec::new();
                let mut chunk = String::new();
                for (i, ch) in data.chars().enumerate() {
                    if i == 0 || chunk.len() + ch.len_utf8() <= raw_budget {
                        chunk.push(ch);
                    } else {
                        parts.push(encoding::base64_encode(chunk.as_bytes()));
                        chunk.clear();
                        chunk.push(ch);
                    }
                }
                if !chunk.is_empty() {
                    parts.push(encoding::base64_encode(chunk.as_bytes()));
                }
                format!("=?UTF-8?B?{}?=", parts.join("?= =?UTF-8?B?"))
            } else {
                format!("=?UTF-8?B?{full}?=")
            }
        }
    }
}

/// Decodes bytes with `opts.from_charset`, then encodes them as one encoded
/// word.
#[must_use]
pub fn encode_word_bytes(data: &[u8], opts: &WordEncodeOptions) -> String {
    let text = charsets::decode(data, opts.from_charset.as_deref().unwrap_or(TARGET_CHARSET));
    encode_word(&text, opts)
}

/// Per RFC 2047 §5 rule (3): after `=XX` escaping, everything outside the
/// particularly safe set is escaped as well and space becomes `_`.
fn q_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == ' ' {
            out.push('_');
        } else if ch.is_ascii_alphanumeric() || matches!(ch, '!' | '*' | '+' | '-' | '/' | '=') {
            out.push(ch);
        } else {
            let _ = write!(out, "={:02X}", ch as u32);
        }
    }
    out
}

/// Splits a mime-encoded string into chunks of at most `max_len` characters
/// (minimum 12, enough for a full 4-octet UTF-8 escape run), never inside an
/// `=XX` triplet and never right before a continuation-byte escape.
#[must_use]
pub fn split_mime_encoded(s: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(12);
    let bytes = s.as_bytes();
    let mut lines = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let mut end = (pos + max_len).min(bytes.len());

        // move an incomplete trailing escape back to the next chunk
        if bytes[end - 1] == b'=' {
            end -= 1;
        } else if end >= pos + 2 && bytes[end - 2] == b'=' && bytes[end - 1].is_ascii_hexdigit() {
            end -= 2;
        }

        // never leave a continuation byte at the head of the next chunk
        while end > pos + 3 && escape_value_at(bytes, end).is_some_and(|c| c > 0x7F && c < 0xC2) {
            end -= 3;
        }

        if end <= pos {
            end = (pos + max_len).min(bytes.len());
        }
        lines.push(s[pos..end].to_string());
        pos = end;
    }

    lines
}

fn escape_value_at(bytes: &[u8], at: usize) -> Option<u8> {
    if at + 2 < bytes.len()
        && bytes[at] == b'='
        && bytes[at + 1].is_ascii_hexdigit()
        && bytes[at + 2].is_ascii_hexdigit()
    {
        u8::from_str_radix(std::str::from_utf8(&bytes[at + 1..at + 3]).ok()?, 16).ok()
    } else {
        None
    }
}

/// Finds the span from the first to the last whitespace-delimited word
/// containing non-ASCII text and replaces it with encoded words, leaving the
/// pure-ASCII prefix and suffix untouched.
#[must_use]
pub fn encode_words(data: &str, opts: &WordEncodeOptions) -> String {
    let Some(first) = data.char_indices().find(|(_, c)| !c.is_ascii()).map(|(i, _)| i) else {
        return data.to_string();
    };
    let last = data
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_ascii())
        .map_or(first, |(i, _)| i);

    // widen to word boundaries
    let start = data[..first]
        .rfind(char::is_whitespace)
        .map_or(0, |i| i + data[i..].chars().next().map_or(1, char::len_utf8));
    let end = data[last..]
        .find(char::is_whitespace)
        .map_or(data.len(), |i| last + i);

    format!(
        "{}{}{}",
        &data[..start],
        encode_word(&data[start..end], opts),
        &data[end..]
    )
}

/// Converts bytes with `opts.from_charset`, then runs [`encode_words`].
#[must_use]
pub fn encode_words_bytes(data: &[u8], opts: &WordEncodeOptions) -> String {
    let text = charsets::decode(data, opts.from_charset.as_deref().unwrap_or(TARGET_CHARSET));
    encode_words(&text, opts)
}

/// Decodes one encoded-word payload.
///
/// An RFC 2231 language tag on the charset (`UTF-8*EN`) is silently
/// dropped. Q payloads tolerate stray whitespace between `=` and its hex
/// digits, a common artifact of naive line unwrapping; B payloads may hold
/// several `=`-delimited Base64 runs, an artifact of joining folded words.
#[must_use]
pub fn decode_word(charset: &str, encoding: WordEncoding, text: &str) -> String {
    let charset = charset.split('*').next().unwrap_or(charset);

    match encoding {
        WordEncoding::Q => {
            let fixed = strip_escape_whitespace(text);
            let mapped: String = fixed
                .chars()
                .map(|c| if c == '_' || c.is_whitespace() { ' ' } else { c })
                .collect();
            encoding::mime_decode(&mapped, charset)
        }
        WordEncoding::B => {
            let mut bytes = Vec::new();
            for segment in text.split('=').filter(|s| !s.is_empty()) {
                bytes.extend(encoding::base64_decode(segment));
            }
            charsets::decode(&bytes, charset)
        }
    }
}

/// Drops whitespace wedged between `=` and a following hex digit.
fn strip_escape_whitespace(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '=' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j].is_ascii_hexdigit() {
                out.push('=');
                i = j;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

enum Token<'a> {
    Literal(&'a str),
    Word {
        charset: &'a str,
        encoding: WordEncoding,
        payload: &'a str,
    },
}

fn parse_word(s: &str, start: usize) -> Option<(Token<'_>, usize)> {
    let rest = &s[start + 2..];
    let q1 = rest.find('?')?;
    let charset = &rest[..q1];
    if charset.is_empty() || !charset.chars().all(is_charset_char) {
        return None;
    }
    let after = &rest[q1 + 1..];
    let encoding = WordEncoding::from_flag(after.chars().next()?)?;
    if after.as_bytes().get(1) != Some(&b'?') {
        return None;
    }
    let payload_area = &after[2..];
    let q3 = payload_area.find('?')?;
    if payload_area.as_bytes().get(q3 + 1) != Some(&b'=') {
        return None;
    }
    let payload = &payload_area[..q3];
    let end = start + 2 + q1 + 3 + q3 + 2;
    Some((
        Token::Word {
            charset,
            encoding,
            payload,
        },
        end,
    ))
}

fn tokenize(s: &str) -> Vec<Token<'_>> {
    let bytes = s.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' && bytes.get(i + 1) == Some(&b'?') {
            if let Some((word, end)) = parse_word(s, i) {
                if literal_start < i {
                    tokens.push(Token::Literal(&s[literal_start..i]));
                }
                tokens.push(word);
                literal_start = end;
                i = end;
                continue;
            }
        }
        i += 1;
    }
    if literal_start < s.len() {
        tokens.push(Token::Literal(&s[literal_start..]));
    }
    tokens
}

/// Decodes every encoded word in a string, leaving other text as is.
///
/// Adjacent words that share charset and encoding and are separated only by
/// folding whitespace are joined before decoding, so a multi-byte character
/// split across the RFC 2047 length limit reassembles correctly. Whitespace
/// between any two encoded words is discarded; malformed words stay
/// untouched.
#[must_use]
pub fn decode_words(s: &str) -> String {
    let tokens = tokenize(s);
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            Token::Literal(text) => {
                out.push_str(text);
                i += 1;
            }
            Token::Word {
                charset,
                encoding,
                payload,
            } => {
                let norm = charsets::normalize_charset(charset);
                let mut buf = payload.to_string();
                let mut next = i + 1;
                loop {
                    let mut k = next;
                    if let Some(Token::Literal(t)) = tokens.get(k) {
                        if t.chars().all(char::is_whitespace) {
                            k += 1;
                        } else {
                            break;
                        }
                    }
                    match tokens.get(k) {
                        Some(Token::Word {
                            charset: c2,
                            encoding: e2,
                            payload: p2,
                        }) => {
                            if *e2 == encoding && charsets::normalize_charset(c2) == norm {
                                buf.push_str(p2);
                                next = k + 1;
                            } else {
                                // folding whitespace between two encoded
                                // words carries no meaning
                                next = k;
                                break;
                            }
                        }
                        _ => break,
                    }
                }
                out.push_str(&decode_word(&norm, encoding, &buf));
                i = next;
            }
        }
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q_opts(max_length: usize) -> WordEncodeOptions {
        WordEncodeOptions {
            encoding: WordEncoding::Q,
            max_length,
            ..Default::default()
        }
    }

    fn b_opts(max_length: usize) -> WordEncodeOptions {
        WordEncodeOptions {
            encoding: WordEncoding::B,
            max_length,
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_word_q() {
        assert_eq!(
            encode_word("See on õhin test", &q_opts(0)),
            "=?UTF-8?Q?See_on_=C3=B5hin_test?="
        );
    }

    #[test]
    fn test_encode_word_bytes_from_charset() {
        let opts = WordEncodeOptions {
            encoding: WordEncoding::Q,
            max_length: 0,
            from_charset: Some("iso-8859-13".to_string()),
        };
        assert_eq!(
            encode_word_bytes(&[0x4A, 0xF5, 0x67, 0x65, 0x2D, 0x76, 0x61, 0xDE], &opts),
            "=?UTF-8?Q?J=C3=B5ge-va=C5=BD?="
        );
    }

    #[test]
    fn test_encode_word_b() {
        assert_eq!(encode_word("Héllo", &b_opts(0)), "=?UTF-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_encode_words_ascii_untouched() {
        assert_eq!(encode_words("plain ascii text", &q_opts(0)), "plain ascii text");
    }

    #[test]
    fn test_encode_words_minimal_span() {
        assert_eq!(
            encode_words("Tere Jõgeva", &q_opts(0)),
            "Tere =?UTF-8?Q?J=C3=B5geva?="
        );
        assert_eq!(
            encode_words("algus Jõgeva lõpp tavaline", &q_opts(0)),
            "algus =?UTF-8?Q?J=C3=B5geva_l=C3=B5pp?= tavaline"
        );
    }

    #[test]
    fn test_encode_words_split_q() {
        let encoded = encode_words("Jõgeva Jõgeva", &q_opts(16));
        assert_eq!(
            encoded,
            "=?UTF-8?Q?J=C3=B5geva_?= =?UTF-8?Q?J=C3=B5geva?="
        );
        assert_eq!(decode_words(&encoded), "Jõgeva Jõgeva");
    }

    #[test]
    fn test_encode_words_split_b() {
        let encoded = encode_words("Jõgeva Jõgeva", &b_opts(19));
        assert_eq!(
            encoded,
            "=?UTF-8?B?SsO1?= =?UTF-8?B?Z2V2?= =?UTF-8?B?YSBK?= =?UTF-8?B?w7Vn?= =?UTF-8?B?ZXZh?="
        );
        assert_eq!(decode_words(&encoded), "Jõgeva Jõgeva");
    }

    #[test]
    fn test_decode_words() {
        assert_eq!(
            decode_words("Hello: =?UTF-8?q?See_on_=C3=B5hin_test?="),
            "Hello: See on õhin test"
        );
    }

    #[test]
    fn test_decode_words_ignores_language_tag() {
        assert_eq!(
            decode_words("Hello: =?UTF-8*EN?q?See_on_=C3=B5hin_test?="),
            "Hello: See on õhin test"
        );
    }

    #[test]
    fn test_decode_words_joins_adjacent_words() {
        assert_eq!(
            decode_words(
                "=?ISO-8859-13?Q?J=F5ge-va=DE?= zz =?ISO-8859-13?Q?J=F5ge-va=DE?= \
                 =?ISO-8859-13?Q?J=F5ge-va=DE?= =?ISO-8859-13?Q?J=F5ge-va=DE?="
            ),
            "Jõge-vaŽ zz Jõge-vaŽJõge-vaŽJõge-vaŽ"
        );
    }

    #[test]
    fn test_decode_words_joins_base64_segments() {
        assert_eq!(
            decode_words("=?UTF-8?B?U3NzxZsgTGHFgmFsYQ==?= =?UTF-8?B?bGFsYQ==?="),
            "Sssś Lałalalala"
        );
    }

    #[test]
    fn test_decode_word_qp() {
        assert_eq!(
            decode_word("ISO-8859-13", WordEncoding::Q, "J=F5ge-va=DE"),
            "Jõge-vaŽ"
        );
    }

    #[test]
    fn test_decode_words_leaves_malformed_untouched() {
        assert_eq!(decode_words("=?bogus"), "=?bogus");
        assert_eq!(decode_words("=?UTF-8?X?abc?="), "=?UTF-8?X?abc?=");
        assert_eq!(decode_words("keep =? this"), "keep =? this");
    }

    #[test]
    fn test_encoded_word_from_str() {
        let word: EncodedWord = "=?UTF-8?Q?See_on_=C3=B5hin_test?=".parse().unwrap();
        assert_eq!(word.charset, "UTF-8");
        assert_eq!(word.encoding, WordEncoding::Q);
        assert_eq!(word.decode(), "See on õhin test");
        assert_eq!(word.to_string(), "=?UTF-8?Q?See_on_=C3=B5hin_test?=");
    }

    #[test]
    fn test_encoded_word_from_str_rejects_garbage() {
        assert!(matches!(
            "no word here".parse::<EncodedWord>(),
            Err(Error::InvalidEncodedWord(_))
        ));
        assert!(matches!(
            "=?UTF-8?X?abc?=".parse::<EncodedWord>(),
            Err(Error::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_split_mime_encoded_respects_escapes() {
        let parts = split_mime_encoded("J=C3=B5geva_J=C3=B5geva", 12);
        assert_eq!(parts, vec!["J=C3=B5geva_", "J=C3=B5geva"]);
        for part in &parts {
            assert!(!part.ends_with('='));
        }
    }

    proptest! {
        #[test]
        fn prop_round_trip(words in proptest::collection::vec("[a-zA-Z0-9õäöüšž신]{1,8}", 1..8)) {
            let s = words.join(" ");
            for max_length in [0usize, 16, 19, 52] {
                let q = encode_words(&s, &q_opts(max_length));
                prop_assert_eq!(decode_words(&q), s.clone());
                let b = encode_words(&s, &b_opts(max_length));
                prop_assert_eq!(decode_words(&b), s.clone());
            }
        }

        #[test]
        fn prop_emoji_never_split(s in "[💩😀a]{1,10}") {
            let encoded = encode_words(&s, &b_opts(16));
            prop_assert_eq!(decode_words(&encoded), s);
        }
    }
}
