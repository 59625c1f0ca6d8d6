//! Byte-safe text encoding for canonical documents
//!
//! Every payload field of a canonical document is carried as standard
//! base64 (RFC 4648 alphabet, `=` padding). The alphabet never needs JSON
//! escaping, so encoded text can be written straight into a string literal.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Errors raised while decoding base64 text back into bytes
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Returns the encoded length of `n` input bytes: `ceil(n / 3) * 4`.
pub const fn encoded_len(n: usize) -> usize {
    n.div_ceil(3) * 4
}

/// Encodes `bytes` into a freshly allocated string.
///
/// Accepts any byte value, including NUL and control characters.
/// An empty input yields an empty string.
///
/// ```
/// assert_eq!(reqecho::encoding::encode(b"GET"), "R0VU");
/// assert_eq!(reqecho::encoding::encode(b""), "");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Appends the encoding of `bytes` to `out`.
///
/// `out` is reserved up front so a single allocation covers the whole field.
pub fn encode_into(bytes: &[u8], out: &mut String) {
    out.reserve(encoded_len(bytes.len()));
    STANDARD.encode_string(bytes, out);
}

/// Decodes standard padded base64. Only used to verify documents, never on
/// the serving path.
pub fn decode(text: impl AsRef<[u8]>) -> Result<Vec<u8>, EncodingError> {
    Ok(STANDARD.decode(text)?)
}
