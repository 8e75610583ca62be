//! Charset name normalization and byte decoding.
//!
//! Decoding degrades to a lossy UTF-8 reinterpretation instead of failing:
//! header text must stay consumable even when the charset label is bogus or
//! the transcoding engine does not know it.

use charset::Charset;
use regex::Regex;
use std::sync::LazyLock;

/// Well-known alias spellings that the generic rewrite rules cannot produce.
///
/// Looked up before and after the rewrite pass, so a table entry overrides
/// the rewrites for genuinely non-standard historical names.
static ALIASES: &[(&str, &str)] = &[
    ("866", "IBM866"),
    ("ascii", "WINDOWS-1252"),
    ("big-5", "BIG5"),
    ("big5", "BIG5"),
    ("chinese", "GBK"),
    ("cp1250", "WINDOWS-1250"),
    ("cp1251", "WINDOWS-1251"),
    ("cp1252", "WINDOWS-1252"),
    ("cp1253", "WINDOWS-1253"),
    ("cp1254", "WINDOWS-1254"),
    ("cp1255", "WINDOWS-1255"),
    ("cp1256", "WINDOWS-1256"),
    ("cp1257", "WINDOWS-1257"),
    ("cp1258", "WINDOWS-1258"),
    ("cp866", "IBM866"),
    ("csbig5", "BIG5"),
    ("csgb2312", "GBK"),
    ("csiso2022jp", "ISO-2022-JP"),
    ("cskoi8r", "KOI8-R"),
    ("euc-jp", "EUC-JP"),
    ("euc-kr", "EUC-KR"),
    ("eucjp", "EUC-JP"),
    ("gb18030", "GB18030"),
    ("gb2312", "GBK"),
    ("gb_2312", "GBK"),
    ("gbk", "GBK"),
    ("ibm866", "IBM866"),
    ("iso-2022-jp", "ISO-2022-JP"),
    ("iso-8859-11", "WINDOWS-874"),
    ("koi8-r", "KOI8-R"),
    ("koi8-u", "KOI8-U"),
    ("koi8r", "KOI8-R"),
    ("koi8u", "KOI8-U"),
    ("korean", "EUC-KR"),
    ("ks_c_5601", "EUC-KR"),
    ("ks_c_5601-1987", "EUC-KR"),
    ("ksc5601", "EUC-KR"),
    ("macintosh", "MACINTOSH"),
    ("macroman", "MACINTOSH"),
    ("ms_kanji", "SHIFT_JIS"),
    ("shift-jis", "SHIFT_JIS"),
    ("shift_jis", "SHIFT_JIS"),
    ("sjis", "SHIFT_JIS"),
    ("tis-620", "WINDOWS-874"),
    ("tis620", "WINDOWS-874"),
    ("unicode-1-1-utf-7", "UTF-7"),
    ("us-ascii", "WINDOWS-1252"),
    ("utf-16", "UTF-16LE"),
    ("utf-16be", "UTF-16BE"),
    ("utf-16le", "UTF-16LE"),
    ("utf-7", "UTF-7"),
    ("utf-8", "UTF-8"),
    ("utf7", "UTF-7"),
    ("x-euc-jp", "EUC-JP"),
    ("x-gbk", "GBK"),
    ("x-mac-roman", "MACINTOSH"),
    ("x-sjis", "SHIFT_JIS"),
];

static UTF_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^utf[-_]?(\d+)").unwrap());
static ASCII_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:us[-_]?)ascii").unwrap());
static WINDOWS_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^win(?:dows)?[-_]?(\d+)").unwrap());
static ISO_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:latin|iso[-_]?8859)?[-_]?(\d+)").unwrap()
});
static L_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^l[-_]?(\d+)").unwrap());

fn lookup_alias(name: &str) -> Option<&'static str> {
    ALIASES
        .binary_search_by_key(&name, |&(alias, _)| alias)
        .ok()
        .map(|idx| ALIASES[idx].1)
}

/// Canonicalizes a charset name, e.g. `win-1257` to `WINDOWS-1257`.
///
/// Total and idempotent; unknown names come back uppercased instead of
/// producing an error.
#[must_use]
pub fn normalize_charset(input: &str) -> String {
    let mut name = input.trim().to_lowercase();

    // first pass
    if let Some(canonical) = lookup_alias(&name) {
        return canonical.to_string();
    }

    name = UTF_RULE.replace(&name, "utf-$1").into_owned();
    name = ASCII_RULE.replace(&name, "windows-1252").into_owned();
    name = WINDOWS_RULE.replace(&name, "windows-$1").into_owned();
    name = ISO_RULE.replace(&name, "iso-8859-$1").into_owned();
    name = L_RULE.replace(&name, "iso-8859-$1").into_owned();

    // updated pass
    if let Some(canonical) = lookup_alias(&name) {
        return canonical.to_string();
    }

    name.to_uppercase()
}

fn is_utf8_family(label: &str) -> bool {
    matches!(label, "UTF-8" | "US-ASCII" | "ASCII" | "7BIT")
}

/// Decodes bytes in the given charset into a Unicode string.
///
/// Unknown or unsupported charsets fall back to a lossy UTF-8
/// reinterpretation of the raw bytes; data loss is allowed, failure is not.
#[must_use]
pub fn decode(bytes: &[u8], from_charset: &str) -> String {
    let label = normalize_charset(if from_charset.is_empty() {
        "UTF-8"
    } else {
        from_charset
    });

    if is_utf8_family(&label) {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    if let Some(cs) = Charset::for_label(label.as_bytes()) {
        let (text, _malformed) = cs.decode_without_bom_handling(bytes);
        text.into_owned()
    } else {
        tracing::debug!(charset = %label, "unknown charset, reinterpreting as UTF-8");
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Encodes a Unicode string into UTF-8 bytes.
///
/// UTF-8 is the only output encoding; when producing mail, always label
/// content as `UTF-8`.
#[must_use]
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Converts bytes from the given charset into UTF-8 bytes.
///
/// Bytes already in an ASCII-compatible UTF-8 family charset pass through
/// unchanged; everything else is decoded and re-encoded.
#[must_use]
pub fn convert(data: &[u8], from_charset: &str) -> Vec<u8> {
    let label = normalize_charset(if from_charset.is_empty() {
        "UTF-8"
    } else {
        from_charset
    });

    if is_utf8_family(&label) {
        return data.to_vec();
    }

    encode(&decode(data, &label))
}
