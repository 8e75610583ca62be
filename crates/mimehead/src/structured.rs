//! Structured header values.
//!
//! Parses and builds `value; key=value; key2="v2"` header bodies with
//! backslash escapes, quoted strings and RFC 2231 parameter continuations
//! (`key*0*=utf-8''...`).

use crate::charsets;
use crate::encoding;
use crate::words;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Default chunk size for continuation-encoded parameters.
const PARAM_CHUNK: usize = 50;

/// A header body split into its leading value and parameters.
///
/// Parameter keys are lowercased and unique; continuation fragments are
/// merged before the value is exposed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderValue {
    /// The bare value before the first `;`.
    pub value: String,
    /// Parameters in deterministic (sorted) order.
    pub params: BTreeMap<String, String>,
}

/// One output fragment of the continuation encoder: `key*N` or `key*N*`
/// plus its chunk of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderParam {
    /// Output parameter key, suffixed per RFC 2231.
    pub key: String,
    /// Chunk value, percent-encoded when the key carries a trailing `*`.
    pub value: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Key,
    Value,
}

/// Parses a header body into a value and parameters.
///
/// Character-by-character scan with a KEY/VALUE state machine; `\` escapes
/// the next character, quotes group, `;` separates. A trailing bare token
/// becomes a flag parameter with an empty value. RFC 2231 continuations are
/// merged and charset-tagged values decoded to Unicode.
#[must_use]
pub fn parse_header_value(s: &str) -> HeaderValue {
    let mut response = HeaderValue::default();
    let mut key: Option<String> = None;
    let mut value = String::new();
    let mut stage = Stage::Value;
    let mut quoted = false;
    let mut escaped = false;

    for chr in s.chars() {
        match stage {
            Stage::Key => {
                if chr == '=' {
                    key = Some(value.trim().to_lowercase());
                    stage = Stage::Value;
                    value.clear();
                } else {
                    value.push(chr);
                }
            }
            Stage::Value => {
                if escaped {
                    value.push(chr);
                } else if chr == '\\' {
                    escaped = true;
                    continue;
                } else if quoted && chr == '"' {
                    quoted = false;
                } else if !quoted && chr == '"' {
                    quoted = true;
                } else if !quoted && chr == ';' {
                    store_segment(&mut response, key.as_deref(), value.trim());
                    stage = Stage::Key;
                    value.clear();
                } else {
                    value.push(chr);
                }
                escaped = false;
            }
        }
    }

    let trimmed = value.trim();
    match stage {
        Stage::Value => store_segment(&mut response, key.as_deref(), trimmed),
        Stage::Key => {
            if !trimmed.is_empty() {
                // bare token with no value, a flag parameter
                response.params.insert(trimmed.to_lowercase(), String::new());
            }
        }
    }

    merge_continuations(&mut response);
    response
}

fn store_segment(response: &mut HeaderValue, key: Option<&str>, value: &str) {
    if let Some(key) = key {
        response.params.insert(key.to_string(), value.to_string());
    } else {
        response.value = value.to_string();
    }
}

struct Continuation {
    charset: Option<String>,
    parts: Vec<(u32, String)>,
}

/// Joins `key*N` / `key*N*` fragments in ascending order and resolves the
/// `charset'lang'` tag of encoded parameters (RFC 2231 §3/§4).
fn merge_continuations(response: &mut HeaderValue) {
    let keys: Vec<String> = response.params.keys().cloned().collect();
    let mut merged: BTreeMap<String, Continuation> = BTreeMap::new();

    for key in keys {
        let Some((base, nr, encoded)) = continuation_suffix(&key) else {
            continue;
        };
        let mut value = response.params.remove(&key).unwrap_or_default();
        let entry = merged.entry(base).or_insert(Continuation {
            charset: None,
            parts: Vec::new(),
        });
        if nr == 0 && encoded {
            if let Some((charset, rest)) = split_charset_tag(&value) {
                entry.charset = Some(if charset.is_empty() {
                    "utf-8".to_string()
                } else {
                    charset
                });
                value = rest;
            }
        }
        entry.parts.push((nr, value));
    }

    for (base, mut continuation) in merged {
        continuation.parts.sort_by_key(|(nr, _)| *nr);
        let joined: String = continuation
            .parts
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        let decoded = if let Some(charset) = continuation.charset {
            tracing::trace!(param = %base, charset = %charset, "decoding continuation parameter");
            words::decode_words(&synthetic_word(&charset, &joined))
        } else {
            words::decode_words(&joined)
        };
        response.params.insert(base, decoded);
    }
}

/// Recognizes the RFC 2231 key suffixes `*`, `*N` and `*N*`.
///
/// Returns the base key, the fragment number and whether the fragment is
/// marked percent-encoded.
fn continuation_suffix(key: &str) -> Option<(String, u32, bool)> {
    let (body, trailing_star) = match key.strip_suffix('*') {
        Some(body) => (body, true),
        None => (key, false),
    };
    let digits_start = body
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    let digits = &body[digits_start..];

    if digits.is_empty() {
        return trailing_star.then(|| (body.to_string(), 0, true));
    }
    if let Some(base) = body[..digits_start].strip_suffix('*') {
        let nr = digits.parse().unwrap_or(u32::MAX);
        return Some((base.to_string(), nr, trailing_star));
    }
    // digits not introduced by '*': only the bare trailing star counts
    trailing_star.then(|| (body.to_string(), 0, true))
}

/// Splits a leading `charset'language'` tag off an encoded fragment.
fn split_charset_tag(value: &str) -> Option<(String, String)> {
    let first = value.find('\'')?;
    let second = value[first + 1..].find('\'')? + first + 1;
    Some((
        value[..first].to_string(),
        value[second + 1..].to_string(),
    ))
}

/// Rewraps a merged percent-encoded value as a synthetic Q encoded word so
/// the regular decoder can resolve it, fixing up invalidly unencoded
/// characters on the way.
fn synthetic_word(charset: &str, value: &str) -> String {
    let mut fixed = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ' ' {
            fixed.push('_');
        } else if matches!(c, '=' | '?' | '_') || c.is_whitespace() {
            let _ = write!(fixed, "%{:02x}", c as u32);
        } else {
            fixed.push(c);
        }
    }
    let fixed = fixed.replace('%', "=");
    format!("=?{charset}?Q?{fixed}?=")
}

/// Joins a parsed header value back together as
/// `value; param1=value1; param2=value2`.
///
/// Plain short parameter values are emitted bare or quoted; anything with
/// non-ASCII content or 75 characters and more goes through
/// [`build_header_param`] continuation encoding.
#[must_use]
pub fn build_header_value(structured: &HeaderValue) -> String {
    let mut params_out: Vec<String> = Vec::new();

    for (key, value) in &structured.params {
        if !encoding::is_plain_text(value) || value.len() >= 75 {
            for part in build_header_param(key, value, PARAM_CHUNK) {
                if part.key.ends_with('*') || !fragment_needs_quoting(&part.value) {
                    params_out.push(format!("{}={}", part.key, part.value));
                } else {
                    params_out.push(format!("{}={}", part.key, quote(&part.value)));
                }
            }
        } else if plain_needs_quoting(value) {
            params_out.push(format!("{key}={}", quote(value)));
        } else {
            params_out.push(format!("{key}={value}"));
        }
    }

    if params_out.is_empty() {
        structured.value.clone()
    } else {
        format!("{}; {}", structured.value, params_out.join("; "))
    }
}

/// RFC 822 specials that force a continuation fragment into quotes.
fn fragment_needs_quoting(value: &str) -> bool {
    value.chars().any(|c| {
        c.is_whitespace()
            || matches!(
                c,
                '"' | '\\' | ';' | ':' | '/' | '=' | '(' | ')' | ',' | '<' | '>' | '@' | '[' | ']' | '?'
            )
    }) || value.starts_with(['-', '\''])
        || value.ends_with('\'')
}

fn plain_needs_quoting(value: &str) -> bool {
    value.chars().any(|c| {
        c.is_whitespace()
            || matches!(
                c,
                '\'' | '"' | '\\' | ';' | ':' | '/' | '=' | '(' | ')' | ',' | '<' | '>' | '@' | '['
                    | ']' | '?'
            )
    }) || value.starts_with('-')
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Splits a parameter value into RFC 2231 continuation fragments no longer
/// than `max_length` (default 50 when zero).
///
/// Plain printable values split into bare `key*N` chunks; anything else
/// produces `key*N*` percent-encoded fragments where the first one carries
/// the `utf-8''` charset tag. A fragment never mixes encoded and unencoded
/// runs and never splits a `%XX` escape or a multi-byte character.
#[must_use]
pub fn build_header_param(key: &str, data: &str, max_length: usize) -> Vec<HeaderParam> {
    let max_length = if max_length == 0 { PARAM_CHUNK } else { max_length };

    if encoding::is_plain_text(data) {
        if data.len() <= max_length {
            return vec![HeaderParam {
                key: key.to_string(),
                value: data.to_string(),
            }];
        }
        let chars: Vec<char> = data.chars().collect();
        return chars
            .chunks(max_length)
            .enumerate()
            .map(|(index, chunk)| HeaderParam {
                key: format!("{key}*{index}"),
                value: chunk.iter().collect(),
            })
            .collect();
    }

    struct Fragment {
        text: String,
        encoded: bool,
    }

    let chars: Vec<char> = data.chars().collect();
    let mut fragments: Vec<Fragment> = Vec::new();
    // the first fragment carries charset and language info, so it is encoded
    // even when it holds no unicode at all
    let mut line = String::from("utf-8''");
    let mut is_encoded = true;
    let mut start_pos = 0;
    let mut i = 0;

    while i < chars.len() {
        let orig = chars[i];
        let chr: String;
        if is_encoded {
            chr = percent_encode_char(orig);
        } else if orig == ' ' {
            chr = " ".to_string();
        } else {
            chr = percent_encode_char(orig);
            if chr.len() != orig.len_utf8() {
                // this character needs encoding, so the whole fragment must
                // be encoded; restart it unless even the escaped character
                // no longer fits
                if percent_encode_str(&line).len() + chr.len() >= max_length {
                    fragments.push(Fragment {
                        text: std::mem::take(&mut line),
                        encoded: is_encoded,
                    });
                    is_encoded = true;
                    start_pos = i.saturating_sub(1);
                } else {
                    is_encoded = true;
                    i = start_pos + 1;
                    line.clear();
                    continue;
                }
            }
        }

        if line.len() + chr.len() >= max_length {
            fragments.push(Fragment {
                text: std::mem::take(&mut line),
                encoded: is_encoded,
            });
            if orig == ' ' {
                line.push(' ');
                is_encoded = false;
                start_pos = i.saturating_sub(1);
            } else {
                let encoded_char = percent_encode_char(orig);
                if encoded_char.len() == orig.len_utf8() {
                    is_encoded = false;
                    start_pos = i.saturating_sub(1);
                } else {
                    is_encoded = true;
                }
                line = encoded_char;
            }
        } else {
            line.push_str(&chr);
        }
        i += 1;
    }

    if !line.is_empty() {
        fragments.push(Fragment {
            text: line,
            encoded: is_encoded,
        });
    }

    fragments
        .into_iter()
        .enumerate()
        .map(|(index, fragment)| HeaderParam {
            key: format!(
                "{key}*{index}{}",
                if fragment.encoded { "*" } else { "" }
            ),
            value: fragment.text,
        })
        .collect()
}

/// Decodes bytes with `from_charset` first, then runs
/// [`build_header_param`].
#[must_use]
pub fn build_header_param_bytes(
    key: &str,
    data: &[u8],
    from_charset: &str,
    max_length: usize,
) -> Vec<HeaderParam> {
    build_header_param(key, &charsets::decode(data, from_charset), max_length)
}

/// Percent-encodes every UTF-8 byte of characters outside the RFC 2231
/// attribute-safe set.
fn percent_encode_char(c: char) -> String {
    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '!' | '~') {
        c.to_string()
    } else {
        let mut buf = [0u8; 4];
        let mut out = String::new();
        for byte in c.encode_utf8(&mut buf).bytes() {
            let _ = write!(out, "%{byte:02X}");
        }
        out
    }
}

fn percent_encode_str(s: &str) -> String {
    s.chars().map(percent_encode_char).collect()
}
