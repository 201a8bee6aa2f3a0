//! Base64 helpers shared by the JWK and JWE encoders.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::{DecodeError, Engine as _};

/// Encodes octets as unpadded base64url.
pub(crate) fn b64url_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes unpadded base64url.
pub(crate) fn b64url_decode(data: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(data)
}

/// Encodes octets as padded standard base64, as used by `x5c`.
pub(crate) fn b64_encode(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(data)
}

/// Decodes padded standard base64.
pub(crate) fn b64_decode(data: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(data)
}
