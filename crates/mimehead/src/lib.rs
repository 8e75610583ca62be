//! # mimehead
//!
//! MIME header text encoding and decoding per RFC 2045, RFC 2047, RFC 2231
//! and RFC 3676.
//!
//! ## Features
//!
//! - **Encoded words**: build and parse `=?UTF-8?Q?...?=` tokens with
//!   length-aware splitting that never divides an escape sequence or a
//!   multi-byte character
//! - **Structured headers**: `value; key=value` bodies with quoting,
//!   backslash escapes and RFC 2231 parameter continuations
//! - **Folding**: header folding, quoted-printable soft line breaks and
//!   `format=flowed` wrapping under a maximum line length
//! - **Charsets**: label normalization (`win1257` → `WINDOWS-1257`) and
//!   lossy-total decoding of legacy charsets
//! - **Lookup**: content type to extension mapping and back
//!
//! Decoding never fails: malformed encoded words stay literal, truncated
//! escapes pass through, unknown charsets degrade to a lossy UTF-8
//! reinterpretation. Callers needing strict validation layer it on top,
//! e.g. via [`EncodedWord`]'s `FromStr`.
//!
//! ## Quick Start
//!
//! ### Encoding header text
//!
//! ```ignore
//! use mimehead::words::{self, WordEncodeOptions};
//!
//! let opts = WordEncodeOptions::default();
//! let encoded = words::encode_words("See on õhin test", &opts);
//! assert_eq!(encoded, "See on =?UTF-8?Q?=C3=B5hin?= test");
//! ```
//!
//! ### Decoding header text
//!
//! ```ignore
//! use mimehead::words;
//!
//! let decoded = words::decode_words("Hello: =?UTF-8?Q?See_on_=C3=B5hin_test?=");
//! assert_eq!(decoded, "Hello: See on õhin test");
//! ```
//!
//! ### Structured header values
//!
//! ```ignore
//! use mimehead::structured;
//!
//! let parsed = structured::parse_header_value("text/plain; CHARSET=UTF-8; format=flowed");
//! assert_eq!(parsed.value, "text/plain");
//! assert_eq!(parsed.params["charset"], "UTF-8");
//! ```
//!
//! ### Folding
//!
//! ```ignore
//! use mimehead::fold;
//!
//! let flowed = fold::encode_flowed(&long_text, 76);
//! let restored = fold::decode_flowed(&flowed, false);
//! ```
//!
//! All operations are pure functions over immutable inputs; there is no
//! shared state and every call is safe to issue concurrently.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;

pub mod charsets;
pub mod encoding;
pub mod fold;
pub mod header;
pub mod mimetypes;
pub mod structured;
pub mod words;

pub use error::{Error, Result};
pub use fold::SoftBreakMode;
pub use header::Headers;
pub use structured::{HeaderParam, HeaderValue};
pub use words::{EncodedWord, WordEncodeOptions, WordEncoding};
