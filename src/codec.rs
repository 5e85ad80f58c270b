//! Target URL tokens
//!
//! A token is the standard base64 encoding of the target URL's UTF-8 bytes,
//! carried in the proxy's own `url` query parameter.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::error::CodecError;

/// Standard alphabet, padded on encode. Decoding is as lax as `atob`: padding
/// is optional and unused trailing bits are ignored.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encode a target URL into a token. The input is not checked to be a URL.
pub fn encode(url: &str) -> String {
    TOKEN_ENGINE.encode(url.as_bytes())
}

/// Decode a token back into the target URL.
///
/// Form-style query decoding turns an unescaped `+` into a space, so every
/// space is read back as `+`. Other surrounding whitespace is ignored.
pub fn decode(token: &str) -> Result<String, CodecError> {
    let normalized = token.replace(' ', "+");
    let normalized = normalized.trim();
    let bytes = TOKEN_ENGINE.decode(normalized.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}
