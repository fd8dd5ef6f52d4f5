//! Response body decoding.

use std::borrow::Cow;

/// Decoded response text and whether the Latin-1 fallback was needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody<'a> {
    pub text: Cow<'a, str>,
    pub used_fallback: bool,
}

/// Decode a response body as UTF-8, falling back to Latin-1.
///
/// The service is mostly ASCII but free-text fields occasionally carry bytes
/// that are not valid UTF-8. Latin-1 maps every byte to U+0000..=U+00FF, so the
/// fallback cannot fail.
pub fn decode_body(bytes: &[u8]) -> DecodedBody<'_> {
    match std::str::from_utf8(bytes) {
        Ok(text) => DecodedBody {
            text: Cow::Borrowed(text),
            used_fallback: false,
        },
        Err(_) => DecodedBody {
            text: Cow::Owned(decode_latin1(bytes)),
            used_fallback: true,
        },
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
