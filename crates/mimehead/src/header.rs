//! Raw header line splitting.
//!
//! Splits header blocks into key/value pairs without decoding mime words:
//! every header has its own decoding rules (formatted addresses, structured
//! bodies), so that step is left to the caller.

use crate::fold;
use crate::words::{self, WordEncodeOptions, WordEncoding};
use std::collections::HashMap;
use std::fmt;

/// Splits a single header line into a lowercased key and a raw value.
///
/// Folded lines are unfolded first (line break plus leading whitespace
/// becomes one space). A line without a `:` yields an empty key and value.
#[must_use]
pub fn decode_header(line: &str) -> (String, String) {
    let mut unfolded = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' || c == '\n' {
            if c == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            while matches!(chars.peek(), Some(' ' | '\t')) {
                chars.next();
            }
            unfolded.push(' ');
        } else {
            unfolded.push(c);
        }
    }

    let trimmed = unfolded.trim();
    match trimmed.split_once(':') {
        Some((key, value)) => (key.trim().to_lowercase(), value.trim().to_string()),
        None => (String::new(), String::new()),
    }
}

/// Parses a block of header lines into a [`Headers`] collection.
#[must_use]
pub fn decode_headers(text: &str) -> Headers {
    Headers::parse(text)
}

/// Encodes and folds one header line, a shorthand for
/// [`words::encode_words`] plus [`fold::fold_lines`].
///
/// The key is emitted as given; the value is mime-word encoded with
/// 52-character chunks, then the whole line folded at 76.
#[must_use]
pub fn encode_header_line(key: &str, value: &str) -> String {
    let opts = WordEncodeOptions {
        encoding: WordEncoding::Q,
        max_length: 52,
        from_charset: None,
    };
    let encoded = words::encode_words(value, &opts);
    fold::fold_lines(&format!("{key}: {encoded}"), 76, false)
}

/// Collection of raw email headers.
///
/// Keys are case-insensitive; repeated headers keep every value in input
/// order. Values stay mime-word encoded.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        self.headers.entry(name).or_default().push(value.into());
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        self.headers.insert(name, vec![value.into()]);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|values| values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.headers.remove(&name.to_lowercase());
    }

    /// Returns an iterator over all headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().flat_map(|(name, values)| {
            values.iter().map(move |value| (name.as_str(), value.as_str()))
        })
    }

    /// Parses a block of header lines.
    ///
    /// Continuation lines (starting with space or tab) belong to the
    /// previous header. Mime words are not decoded.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut logical: Vec<String> = Vec::new();
        for line in text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)) {
            match logical.last_mut() {
                Some(previous) if line.starts_with([' ', '\t']) => {
                    previous.push_str("\r\n");
                    previous.push_str(line);
                }
                _ => logical.push(line.to_string()),
            }
        }

        let mut headers = Self::new();
        for line in logical.iter().filter(|l| !l.trim().is_empty()) {
            let (key, value) = decode_header(line);
            headers.add(key, value);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<_> = self.headers.iter().collect();
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, values) in sorted {
            // canonical capitalization, e.g. "content-type" -> "Content-Type"
            let capitalized = name
                .split('-')
                .map(|part| {
                    let mut chars = part.chars();
                    chars.next().map_or_else(String::new, |first| {
                        first.to_uppercase().collect::<String>() + chars.as_str()
                    })
                })
                .collect::<Vec<_>>()
                .join("-");

            for value in values {
                writeln!(f, "{capitalized}: {value}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_header_line() {
        assert_eq!(
            decode_header("Subject: Tere =?UTF-8?Q?J=C3=B5geva?="),
            (
                "subject".to_string(),
                "Tere =?UTF-8?Q?J=C3=B5geva?=".to_string()
            )
        );
    }

    #[test]
    fn test_decode_header_unfolds() {
        assert_eq!(
            decode_header("X-Long: first part\r\n second part"),
            ("x-long".to_string(), "first part second part".to_string())
        );
    }

    #[test]
    fn test_decode_header_without_colon() {
        assert_eq!(decode_header("no colon here"), (String::new(), String::new()));
    }

    #[test]
    fn test_decode_headers_block() {
        let text = "Subject: Tere =?UTF-8?Q?J=C3=B5geva?=\r\n\
            X-APP: My =?UTF-8?Q?=C5=A1=C5=A1=C5=A1=C5=A1?= app line 1\r\n\
            X-APP: My =?UTF-8?Q?=C5=A1=C5=A1=C5=A1=C5=A1?= app line 2\r\n\
            Long-Line: tere =?UTF-8?Q?=C3=B5klva?= karu\r\n \
            =?UTF-8?Q?m=C3=B5kva_=C5=A1apaka=C5=A1?= tutikas suur maja,\r\n \
            =?UTF-8?Q?k=C3=B5rge?= hoone, segane jutt";
        let headers = decode_headers(text);

        assert_eq!(headers.get("subject"), Some("Tere =?UTF-8?Q?J=C3=B5geva?="));
        assert_eq!(
            headers.get_all("x-app"),
            vec![
                "My =?UTF-8?Q?=C5=A1=C5=A1=C5=A1=C5=A1?= app line 1",
                "My =?UTF-8?Q?=C5=A1=C5=A1=C5=A1=C5=A1?= app line 2",
            ]
        );
        assert_eq!(
            headers.get("long-line"),
            Some(
                "tere =?UTF-8?Q?=C3=B5klva?= karu =?UTF-8?Q?m=C3=B5kva_=C5=A1apaka=C5=A1?= \
                 tutikas suur maja, =?UTF-8?Q?k=C3=B5rge?= hoone, segane jutt"
            )
        );
    }

    #[test]
    fn test_headers_set_and_remove() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("To", "bob@example.com");
        assert_eq!(headers.get_all("to").len(), 2);

        headers.set("To", "carol@example.com");
        assert_eq!(headers.get_all("to"), vec!["carol@example.com"]);

        headers.remove("to");
        assert!(headers.get("To").is_none());
    }

    #[test]
    fn test_headers_display_capitalizes() {
        let mut headers = Headers::new();
        headers.add("content-type", "text/plain");
        assert_eq!(headers.to_string(), "Content-Type: text/plain\n");
    }

    #[test]
    fn test_headers_iter() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");
        assert_eq!(headers.iter().count(), 2);
    }

    #[test]
    fn test_encode_header_line() {
        assert_eq!(
            encode_header_line("Subject", "Tere Jõgeva"),
            "Subject: Tere =?UTF-8?Q?J=C3=B5geva?="
        );
        assert_eq!(
            encode_header_line("Subject", "plain ascii"),
            "Subject: plain ascii"
        );
    }
}
