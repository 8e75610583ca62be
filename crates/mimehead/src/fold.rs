//! Line folding and soft line breaks.
//!
//! Folds header lines and `format=flowed` text under a maximum line length,
//! and inserts the soft line breaks that quoted-printable and Base64 bodies
//! need to stay within protocol limits. Break points never land inside an
//! `=XX` escape or a multi-byte UTF-8 escape run.

const DEFAULT_LINE_LENGTH: usize = 76;

/// Where a soft line break may be placed, per content encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftBreakMode {
    /// Quoted-printable: breaks marked with a trailing `=`, never inside an
    /// escape sequence.
    QuotedPrintable,
    /// Base64: fixed-stride breaks, content-blind.
    Base64,
    /// RFC 3676 `format=flowed`: space-stuffed lines with trailing-space
    /// break markers.
    Flowed,
}

/// Folds long lines, useful for header lines (`after_space = false`) and
/// flowed text (`after_space = true`).
///
/// In header mode the whitespace run at the break point starts the next
/// line; in flowed mode the line keeps its trailing space as the soft-break
/// marker. A `line_length` of zero means the RFC 2045 default of 76.
#[must_use]
pub fn fold_lines(s: &str, line_length: usize, after_space: bool) -> String {
    let line_length = if line_length == 0 {
        DEFAULT_LINE_LENGTH
    } else {
        line_length
    };
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(s.len() + 8);
    let mut pos = 0;

    while pos < len {
        if len - pos <= line_length {
            result.extend(&chars[pos..]);
            break;
        }
        let window_end = pos + line_length;

        // a line break inside the window wins
        if let Some(offset) = chars[pos..window_end]
            .iter()
            .position(|c| matches!(c, '\r' | '\n'))
        {
            let mut end = pos + offset + 1;
            if chars[pos + offset] == '\r' && end < window_end && chars[end] == '\n' {
                end += 1;
            }
            result.extend(&chars[pos..end]);
            pos = end;
            continue;
        }

        let mut line_end = window_end;
        let mut cut = false;
        if let Some((ws_start, word_start)) = trailing_ws_run(&chars, pos, window_end) {
            let removed = if after_space {
                window_end - word_start
            } else {
                window_end - ws_start
            };
            if removed < window_end - pos {
                line_end = window_end - removed;
                cut = true;
            }
        }
        if !cut && !chars[window_end].is_whitespace() {
            // no usable break point: extend the line through the next word
            let mut i = window_end;
            while i < len && !chars[i].is_whitespace() {
                i += 1;
            }
            line_end = i;
            if after_space {
                while line_end < len && chars[line_end].is_whitespace() {
                    line_end += 1;
                }
            }
        }

        result.extend(&chars[pos..line_end]);
        pos = line_end;
        if pos < len {
            result.push_str("\r\n");
        }
    }

    result
}

/// Returns the last whitespace run of the window as `(ws_start, word_start)`
/// where `word_start..window_end` holds only non-whitespace.
fn trailing_ws_run(chars: &[char], pos: usize, window_end: usize) -> Option<(usize, usize)> {
    let mut word_start = window_end;
    while word_start > pos && !chars[word_start - 1].is_whitespace() {
        word_start -= 1;
    }
    if word_start == pos {
        return None;
    }
    let mut ws_start = word_start;
    while ws_start > pos && chars[ws_start - 1].is_whitespace() {
        ws_start -= 1;
    }
    Some((ws_start, word_start))
}

/// Inserts soft line breaks so that no line exceeds `line_length`
/// characters. A `line_length` of zero means 76.
#[must_use]
pub fn add_soft_linebreaks(s: &str, mode: SoftBreakMode, line_length: usize) -> String {
    let line_length = if line_length == 0 {
        DEFAULT_LINE_LENGTH
    } else {
        line_length
    };
    match mode {
        SoftBreakMode::QuotedPrintable => add_qp_soft_linebreaks(s, line_length),
        SoftBreakMode::Base64 => add_base64_soft_linebreaks(s, line_length),
        SoftBreakMode::Flowed => add_flowed_soft_linebreaks(s, line_length),
    }
}

/// Wraps plain text for `format=flowed` transport, space-stuffing lines that
/// start with a space, `From` or `>` per RFC 3676 §4.2.
#[must_use]
pub fn encode_flowed(s: &str, line_length: usize) -> String {
    add_soft_linebreaks(s, SoftBreakMode::Flowed, line_length)
}

/// Removes `format=flowed` soft wrapping.
///
/// Lines whose predecessor ends with a single trailing space join up, except
/// after a `-- ` signature line; `del_sp` removes the marker space
/// (`delsp=yes`). Whitespace stuffing is stripped from every resulting line.
#[must_use]
pub fn decode_flowed(s: &str, del_sp: bool) -> String {
    let mut result: Vec<String> = Vec::new();
    let mut buffer: Option<String> = None;

    for line in s.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)) {
        let is_soft_break = buffer
            .as_ref()
            .is_some_and(|b| b.ends_with(' ') && b != "-- ");
        if is_soft_break {
            if let Some(b) = buffer.as_mut() {
                if del_sp {
                    b.pop();
                }
                b.push_str(line);
            }
        } else {
            if let Some(b) = buffer.take() {
                result.push(b);
            }
            buffer = Some(line.to_string());
        }
    }
    if let Some(b) = buffer {
        if !b.is_empty() {
            result.push(b);
        }
    }

    // remove whitespace stuffing
    result
        .iter()
        .map(|line| line.strip_prefix(' ').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn add_base64_soft_linebreaks(s: &str, line_length: usize) -> String {
    let chars: Vec<char> = s.trim().chars().collect();
    chars
        .chunks(line_length)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn add_flowed_soft_linebreaks(s: &str, line_length: usize) -> String {
    s.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .map(|line| {
            let stuffed = if line.starts_with(' ')
                || line.starts_with('>')
                || line.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("from"))
            {
                format!(" {line}")
            } else {
                line.to_string()
            };
            fold_lines(&stuffed, line_length, true)
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn add_qp_soft_linebreaks(s: &str, line_length: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let margin = line_length / 3;
    let mut result = String::with_capacity(s.len() + 8);
    let mut pos = 0;

    while pos < len {
        let window_end = (pos + line_length).min(len);

        // an existing hard break inside the window ends the line
        if let Some(offset) = find_crlf(&chars[pos..window_end]) {
            let end = pos + offset + 2;
            result.extend(&chars[pos..end]);
            pos = end;
            continue;
        }
        if chars[window_end - 1] == '\n' {
            result.extend(&chars[pos..window_end]);
            pos = window_end;
            continue;
        }
        let tail_start = window_end - margin.min(window_end - pos);
        if let Some(nl) = (tail_start..window_end).find(|&i| chars[i] == '\n') {
            // truncate to the nearest line break
            result.extend(&chars[pos..=nl]);
            pos = nl + 1;
            continue;
        }

        let mut line_end = window_end;
        let mut cut = false;
        if window_end - pos > line_length - margin {
            // truncate to the nearest space or punctuation
            if let Some(d) = (tail_start..window_end)
                .rev()
                .find(|&i| matches!(chars[i], ' ' | '\t' | '.' | ',' | '!' | '?'))
            {
                line_end = d + 1;
                cut = true;
            }
        }
        if !cut {
            if chars[window_end - 1] == '\r' {
                line_end = window_end - 1;
            } else {
                line_end = back_off_escapes(&chars, pos, window_end, len);
            }
        }
        if line_end <= pos {
            line_end = window_end;
        }

        if line_end < len {
            if line_end - pos == line_length {
                // leave room for the soft break marker
                if trailing_escape_value(&chars[pos..line_end]).is_some() {
                    line_end -= 3;
                } else {
                    line_end -= 1;
                }
            }
            result.extend(&chars[pos..line_end]);
            result.push_str("=\r\n");
        } else {
            result.extend(&chars[pos..line_end]);
        }
        pos = line_end;
    }

    result
}

fn find_crlf(window: &[char]) -> Option<usize> {
    window.windows(2).position(|w| w[0] == '\r' && w[1] == '\n')
}

/// Moves a break point left until the line ends on a complete escape
/// sequence boundary that does not split a multi-byte UTF-8 character.
fn back_off_escapes(chars: &[char], pos: usize, window_end: usize, total_len: usize) -> usize {
    let mut line_end = window_end;
    if !ends_with_escape_prefix(&chars[pos..line_end]) {
        return line_end;
    }

    // push an incomplete escape to the next line
    if chars[line_end - 1] == '=' {
        line_end -= 1;
    } else if line_end - pos >= 2 && chars[line_end - 2] == '=' {
        line_end -= 2;
    }

    loop {
        let line_len = line_end - pos;
        if line_len <= 3 || line_len >= total_len - pos || is_pure_escape_run(&chars[pos..line_end])
        {
            break;
        }
        let Some(code) = trailing_escape_value(&chars[pos..line_end]) else {
            break;
        };
        if code < 0x80 {
            break;
        }
        line_end -= 3;
        if code >= 0xC0 {
            break;
        }
    }
    line_end
}

/// True when the tail looks like `=`, `=X` or `=XX`.
fn ends_with_escape_prefix(tail: &[char]) -> bool {
    let n = tail.len();
    (n >= 1 && tail[n - 1] == '=')
        || (n >= 2 && tail[n - 2] == '=' && tail[n - 1].is_ascii_hexdigit())
        || (n >= 3
            && tail[n - 3] == '='
            && tail[n - 2].is_ascii_hexdigit()
            && tail[n - 1].is_ascii_hexdigit())
}

/// Byte value of a complete trailing `=XX` escape, if present.
fn trailing_escape_value(tail: &[char]) -> Option<u32> {
    let n = tail.len();
    if n >= 3
        && tail[n - 3] == '='
        && tail[n - 2].is_ascii_hexdigit()
        && tail[n - 1].is_ascii_hexdigit()
    {
        Some(tail[n - 2].to_digit(16)? * 16 + tail[n - 1].to_digit(16)?)
    } else {
        None
    }
}

/// True for a line that is nothing but one to four complete escapes.
fn is_pure_escape_run(tail: &[char]) -> bool {
    let n = tail.len();
    if n == 0 || n % 3 != 0 || n > 12 {
        return false;
    }
    tail.chunks(3)
        .all(|c| c[0] == '=' && c[1].is_ascii_hexdigit() && c[2].is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fold_short_line_unchanged() {
        assert_eq!(fold_lines("short line", 76, false), "short line");
    }

    #[test]
    fn test_fold_header_line() {
        let input = "Subject: Testin command line kirja =?UTF-8?Q?=C3=B5kva?= kakva \
             =?UTF-8?Q?m=C3=B5ni_t=C3=B5nis_k=C3=B5llas_p=C3=B5?= \
             =?UTF-8?Q?llas_t=C3=B5llas_r=C3=B5llas_ju=C5=A1la_?= \
             =?UTF-8?Q?ku=C5=A1la_tu=C5=A1la?= musla";
        let expected = "Subject: Testin command line kirja =?UTF-8?Q?=C3=B5kva?= kakva\r\n \
             =?UTF-8?Q?m=C3=B5ni_t=C3=B5nis_k=C3=B5llas_p=C3=B5?=\r\n \
             =?UTF-8?Q?llas_t=C3=B5llas_r=C3=B5llas_ju=C5=A1la_?=\r\n \
             =?UTF-8?Q?ku=C5=A1la_tu=C5=A1la?= musla";
        assert_eq!(fold_lines(input, 76, false), expected);
    }

    #[test]
    fn test_fold_flowed_text() {
        let input = "Testin command line kirja õkva kakva mõni tõnis kõllas põllas tõllas \
             rõllas jušla kušla tušla musla Testin command line kirja õkva kakva mõni tõnis \
             kõllas põllas tõllas rõllas jušla kušla tušla musla";
        let expected = "Testin command line kirja õkva kakva mõni tõnis kõllas põllas tõllas rõllas \r\n\
             jušla kušla tušla musla Testin command line kirja õkva kakva mõni tõnis \r\n\
             kõllas põllas tõllas rõllas jušla kušla tušla musla";
        assert_eq!(fold_lines(input, 76, true), expected);
    }

    #[test]
    fn test_fold_one_long_word() {
        let input = "Subject: =?UTF-8?Q?=CB=86=C2=B8=C3=81=C3=8C=C3=93=C4=B1=C3=8F=CB=87=C3=81=C3=9B^=C2=B8\\=C3=81=C4=B1=CB=86=C3=8C=C3=81=C3=9B=C3=98^\\=CB=9C=C3=9B=CB=9D=E2=84=A2=CB=87=C4=B1=C3=93=C2=B8^\\=CB=9C=EF=AC=81^\\=C2=B7\\=CB=9C=C3=98^=C2=A3=CB=9C#=EF=AC=81^\\=C2=A3=EF=AC=81^\\=C2=A3=EF=AC=81^\\?=";
        let expected = "Subject:\r\n =?UTF-8?Q?=CB=86=C2=B8=C3=81=C3=8C=C3=93=C4=B1=C3=8F=CB=87=C3=81=C3=9B^=C2=B8\\=C3=81=C4=B1=CB=86=C3=8C=C3=81=C3=9B=C3=98^\\=CB=9C=C3=9B=CB=9D=E2=84=A2=CB=87=C4=B1=C3=93=C2=B8^\\=CB=9C=EF=AC=81^\\=C2=B7\\=CB=9C=C3=98^=C2=A3=CB=9C#=EF=AC=81^\\=C2=A3=EF=AC=81^\\=C2=A3=EF=AC=81^\\?=";
        assert_eq!(fold_lines(input, 76, false), expected);
    }

    #[test]
    fn test_qp_soft_linebreaks() {
        let s = "=C3=B5=C3=A4=C3=B6=C3=BC=C3=B5=C3=A4=C3=B6=C3=BC=C3=B5=C3=A4=C3=B6=C3=BC\
            =C3=B5=C3=A4=C3=B6=C3=BC=C3=B5=C3=A4=C3=B6=C3=BC=C3=B5=C3=A4=C3=B6=C3=BC\
            =C3=B5=C3=A4=C3=B6=C3=B5";
        let folded = "=C3=B5=C3=A4=C3=B6=C3=BC=C3=B5=C3=A4=C3=B6=C3=BC=C3=B5=C3=A4=C3=B6=C3=BC=\r\n\
            =C3=B5=C3=A4=C3=B6=C3=BC=C3=B5=C3=A4=C3=B6=C3=BC=C3=B5=C3=A4=C3=B6=C3=BC=\r\n\
            =C3=B5=C3=A4=C3=B6=C3=B5";
        assert_eq!(
            add_soft_linebreaks(s, SoftBreakMode::QuotedPrintable, 76),
            folded
        );
    }

    #[test]
    fn test_qp_soft_linebreaks_no_wrap_between_encoded_chars() {
        let s = "a=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F";
        let folded =
            "a=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=5F=\r\n=5F=5F";
        assert_eq!(
            add_soft_linebreaks(s, SoftBreakMode::QuotedPrintable, 76),
            folded
        );
    }

    #[test]
    fn test_qp_soft_linebreaks_long_plain_string() {
        let s = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLM\
            NOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ\
            abcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklm\
            nopqrstuvwxyz0123456789";
        let folded = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLM=\r\n\
            NOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ=\r\n\
            abcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklm=\r\n\
            nopqrstuvwxyz0123456789";
        assert_eq!(
            add_soft_linebreaks(s, SoftBreakMode::QuotedPrintable, 76),
            folded
        );
    }

    #[test]
    fn test_qp_soft_linebreaks_at_line_edge() {
        let s = "Title: <a href=3D=22http://www.elezea.com/2012/09/iphone-5-local-maximum/=22>The future of e-commerce is storytelling</a> <br>";
        let folded = "Title: <a href=3D=22http://www.elezea.com/2012/09/iphone-5-local-maximum/=\r\n=22>The future of e-commerce is storytelling</a> =\r\n<br>";
        assert_eq!(
            add_soft_linebreaks(s, SoftBreakMode::QuotedPrintable, 76),
            folded
        );
    }

    #[test]
    fn test_qp_soft_linebreaks_utf8_sequence_on_edge() {
        let s = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHI\
            =C3=84=C3=84=C3=84PQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJ\
            KLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVW\
            XYZabcdefghijklmnopqrstuvwxyz0123456789";
        let folded = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHI=\r\n\
            =C3=84=C3=84=C3=84PQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJ=\r\n\
            KLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVW=\r\n\
            XYZabcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(
            add_soft_linebreaks(s, SoftBreakMode::QuotedPrintable, 76),
            folded
        );
    }

    #[test]
    fn test_base64_soft_linebreaks() {
        let quantum = "LS0t".repeat(19);
        let s = format!("{}{}=", quantum.repeat(5), "LS0tLS0tLS0tLS0tLS0");
        let folded = add_soft_linebreaks(&s, SoftBreakMode::Base64, 76);
        let lines: Vec<&str> = folded.split("\r\n").collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[..5].iter().all(|l| l.len() == 76));
        assert_eq!(lines[5], "LS0tLS0tLS0tLS0tLS0=");
        assert_eq!(folded.replace("\r\n", ""), s);
    }

    #[test]
    fn test_flowed_soft_linebreaks() {
        let s = "tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere\r\nFrom\r\n Hello\r\n> abc\r\nabc";
        let folded = "tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere \r\n\
            tere tere tere tere tere\r\n From\r\n  Hello\r\n > abc\r\nabc";
        assert_eq!(add_soft_linebreaks(s, SoftBreakMode::Flowed, 76), folded);
    }

    #[test]
    fn test_decode_flowed() {
        let folded = "tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere \r\n\
            tere tere tere tere tere\r\n From\r\n  Hello\r\n > abc\r\nabc";
        let expected = "tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere\nFrom\n Hello\n> abc\nabc";
        assert_eq!(decode_flowed(folded, false), expected);
    }

    #[test]
    fn test_decode_flowed_del_sp() {
        let folded = "tere tere tere tere tere tere tere tere tere tere tere tere tere tere tere \r\n\
            tere tere tere tere tere\r\n From\r\n  Hello\r\n > abc\r\nabc";
        let expected = "tere tere tere tere tere tere tere tere tere tere tere tere tere tere teretere tere tere tere tere\nFrom\n Hello\n> abc\nabc";
        assert_eq!(decode_flowed(folded, true), expected);
    }

    #[test]
    fn test_decode_flowed_keeps_signature_line() {
        assert_eq!(decode_flowed("text\r\n-- \r\nsig", false), "text\n-- \nsig");
    }

    proptest! {
        #[test]
        fn prop_fold_is_identity_on_short_lines(s in "[ -~]{0,76}") {
            prop_assert_eq!(fold_lines(&s, 76, false), s);
        }

        #[test]
        fn prop_qp_folding_keeps_lines_short_and_decodable(s in "\\PC{0,200}") {
            let encoded = crate::encoding::qp_encode(s.as_bytes());
            let folded = add_soft_linebreaks(&encoded, SoftBreakMode::QuotedPrintable, 76);
            prop_assert!(folded.split("\r\n").all(|l| l.chars().count() <= 76));
            prop_assert_eq!(crate::encoding::qp_decode(&folded, "UTF-8"), s);
        }
    }
}
