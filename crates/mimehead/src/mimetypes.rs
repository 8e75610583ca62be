//! MIME type and file extension lookup.
//!
//! Curated read-only tables in both directions. Ambiguous entries list
//! several candidates; lookup prefers the candidate whose name matches the
//! query and falls back to the first one.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Fallback extension for unknown content types.
const DEFAULT_EXTENSION: &str = "bin";

/// Fallback content type for unknown extensions.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

static TYPE_TO_EXTENSION: &[(&str, &[&str])] = &[
    ("application/epub+zip", &["epub"]),
    ("application/gzip", &["gz"]),
    ("application/javascript", &["js"]),
    ("application/json", &["json"]),
    ("application/msword", &["doc"]),
    ("application/octet-stream", &["*", "bin", "dms", "lrf", "mar", "so", "dist"]),
    ("application/pdf", &["pdf"]),
    ("application/pgp-signature", &["asc", "sig"]),
    ("application/postscript", &["ai", "eps", "ps"]),
    ("application/rtf", &["rtf"]),
    ("application/vnd.ms-excel", &["xls", "xlm", "xla", "xlc", "xlt", "xlw"]),
    ("application/vnd.ms-powerpoint", &["ppt", "pps", "pot"]),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        &["pptx"],
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        &["xlsx"],
    ),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        &["docx"],
    ),
    ("application/x-7z-compressed", &["7z"]),
    ("application/x-bzip2", &["bz2", "boz"]),
    ("application/x-rar-compressed", &["rar"]),
    ("application/x-tar", &["tar"]),
    ("application/xhtml+xml", &["xhtml", "xht"]),
    ("application/xml", &["xml", "xsl", "xsd"]),
    ("application/zip", &["zip"]),
    ("audio/flac", &["flac"]),
    ("audio/midi", &["mid", "midi", "kar", "rmi"]),
    ("audio/mp4", &["m4a", "mp4a"]),
    ("audio/mpeg", &["mpga", "mp2", "mp2a", "mp3", "m2a", "m3a"]),
    ("audio/ogg", &["oga", "ogg", "spx"]),
    ("audio/wav", &["wav"]),
    ("audio/webm", &["weba"]),
    ("image/bmp", &["bmp"]),
    ("image/gif", &["gif"]),
    ("image/heic", &["heic"]),
    ("image/jpeg", &["jpe", "jpeg", "jpg"]),
    ("image/png", &["png"]),
    ("image/svg+xml", &["svg", "svgz"]),
    ("image/tiff", &["tiff", "tif"]),
    ("image/webp", &["webp"]),
    ("image/x-icon", &["ico"]),
    ("message/rfc822", &["eml", "mime"]),
    ("text/calendar", &["ics", "ifb"]),
    ("text/css", &["css"]),
    ("text/csv", &["csv"]),
    ("text/html", &["html", "htm"]),
    ("text/markdown", &["md", "markdown"]),
    ("text/plain", &["txt", "text", "conf", "def", "list", "log", "in"]),
    ("text/vcard", &["vcf"]),
    ("video/mp4", &["mp4", "mp4v", "mpg4"]),
    ("video/mpeg", &["mpeg", "mpg", "mpe", "m1v", "m2v"]),
    ("video/ogg", &["ogv"]),
    ("video/quicktime", &["qt", "mov"]),
    ("video/webm", &["webm"]),
    ("video/x-msvideo", &["avi"]),
];

static EXTENSION_TO_TYPE: &[(&str, &[&str])] = &[
    ("7z", &["application/x-7z-compressed"]),
    ("avi", &["video/x-msvideo"]),
    ("bin", &["application/octet-stream"]),
    ("bmp", &["image/bmp"]),
    ("bz2", &["application/x-bzip2"]),
    ("css", &["text/css"]),
    ("csv", &["text/csv"]),
    ("doc", &["application/msword"]),
    ("docx", &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]),
    ("eml", &["message/rfc822"]),
    ("epub", &["application/epub+zip"]),
    ("flac", &["audio/flac"]),
    ("gif", &["image/gif"]),
    ("gz", &["application/gzip"]),
    ("heic", &["image/heic"]),
    ("htm", &["text/html"]),
    ("html", &["text/html"]),
    ("ico", &["image/x-icon"]),
    ("ics", &["text/calendar"]),
    ("jpe", &["image/jpeg"]),
    ("jpeg", &["image/jpeg"]),
    ("jpg", &["image/jpeg"]),
    ("js", &["application/javascript", "application/x-javascript", "text/javascript"]),
    ("json", &["application/json"]),
    ("m4a", &["audio/mp4"]),
    ("md", &["text/markdown"]),
    ("mid", &["audio/midi"]),
    ("mov", &["video/quicktime"]),
    ("mp3", &["audio/mpeg"]),
    ("mp4", &["video/mp4", "audio/mp4"]),
    ("mpeg", &["video/mpeg"]),
    ("mpg", &["video/mpeg"]),
    ("ogg", &["audio/ogg"]),
    ("pdf", &["application/pdf"]),
    ("png", &["image/png"]),
    ("ppt", &["application/vnd.ms-powerpoint"]),
    ("pptx", &["application/vnd.openxmlformats-officedocument.presentationml.presentation"]),
    ("ps", &["application/postscript"]),
    ("rar", &["application/x-rar-compressed"]),
    ("rtf", &["application/rtf"]),
    ("svg", &["image/svg+xml"]),
    ("tar", &["application/x-tar"]),
    ("tif", &["image/tiff"]),
    ("tiff", &["image/tiff"]),
    ("txt", &["text/plain"]),
    ("vcf", &["text/vcard"]),
    ("wav", &["audio/wav"]),
    ("webm", &["video/webm", "audio/webm"]),
    ("webp", &["image/webp"]),
    ("xhtml", &["application/xhtml+xml"]),
    ("xls", &["application/vnd.ms-excel"]),
    ("xlsx", &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"]),
    ("xml", &["application/xml", "text/xml"]),
    ("zip", &["application/zip"]),
];

static TYPES: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| TYPE_TO_EXTENSION.iter().copied().collect());

static EXTENSIONS: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| EXTENSION_TO_TYPE.iter().copied().collect());

/// Returns the file extension for a content type, `bin` when unknown.
#[must_use]
pub fn detect_extension(mime_type: &str) -> &'static str {
    let normalized: String = mime_type
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let Some(candidates) = TYPES.get(normalized.as_str()) else {
        return DEFAULT_EXTENSION;
    };

    // prefer the extension spelled like the subtype
    let subtype = normalized.split('/').nth(1).unwrap_or("");
    if let Some(&exact) = candidates.iter().find(|e| **e == subtype) {
        return exact;
    }
    match candidates.first() {
        Some(&"*") | None => DEFAULT_EXTENSION,
        Some(&first) => first,
    }
}

/// Returns the content type for a file extension,
/// `application/octet-stream` when unknown.
///
/// Accepts full file names; only the final extension counts.
#[must_use]
pub fn detect_mime_type(extension: &str) -> &'static str {
    let normalized: String = extension
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let normalized = normalized.trim_start_matches('.');
    let extension = normalized.split('.').next_back().unwrap_or("");
    let Some(candidates) = EXTENSIONS.get(extension) else {
        return DEFAULT_MIME_TYPE;
    };

    // prefer the content type whose subtype matches the extension
    candidates
        .iter()
        .find(|t| t.split('/').nth(1) == Some(extension))
        .or_else(|| candidates.first())
        .map_or(DEFAULT_MIME_TYPE, |t| *t)
}
