//! Error types for strict header parsing.

/// Result type alias for strict parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the strict typed-parse surface.
///
/// The lossy functional surface (word decoding, folding, charset conversion)
/// is total and never fails; these errors are limited to `FromStr`
/// implementations that reject malformed input outright.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input does not match the `=?charset?encoding?payload?=` grammar.
    #[error("Invalid encoded word: {0}")]
    InvalidEncodedWord(String),

    /// Encoded word declares an encoding other than `Q` or `B`.
    #[error("Unsupported encoded-word encoding: {0}")]
    UnsupportedEncoding(String),
}
