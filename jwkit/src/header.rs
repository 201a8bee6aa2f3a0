//! JWE protected header of a password-protected key.
//!
//! The header is serialized as compact JSON and base64url-encoded as the first
//! segment of the envelope; the encoded segment is also the AAD of the
//! content encryption.

use crate::encoding::{b64url_decode, b64url_encode};
use crate::error::DecryptError;
use serde::{Deserialize, Serialize};

/// Key management algorithm.
pub const KEY_MANAGEMENT_ALGORITHM: &str = "PBES2-HS256+A128KW";

/// Content encryption algorithm.
pub const CONTENT_ENCRYPTION_ALGORITHM: &str = "A128CBC-HS256";

/// Content type of an encrypted JWK.
pub const CONTENT_TYPE: &str = "jwk+json";

/// Largest `p2c` accepted when decrypting.
pub const MAX_ITERATION_COUNT: u32 = 10_000_000;

/// Smallest `p2s` accepted, in bytes.
pub const MIN_SALT_SIZE: usize = 8;

/// Protected header members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    alg: String,
    enc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cty: Option<String>,
    p2s: String,
    p2c: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crit: Option<Vec<String>>,
}

impl ProtectedHeader {
    /// Creates the header for the given salt and iteration count.
    #[must_use]
    pub fn new(salt: &[u8], iteration_count: u32) -> Self {
        Self {
            alg: KEY_MANAGEMENT_ALGORITHM.to_string(),
            enc: CONTENT_ENCRYPTION_ALGORITHM.to_string(),
            cty: Some(CONTENT_TYPE.to_string()),
            p2s: b64url_encode(salt),
            p2c: iteration_count,
            zip: None,
            crit: None,
        }
    }

    /// Returns the key management algorithm.
    #[must_use]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// Returns the content encryption algorithm.
    #[must_use]
    pub fn enc(&self) -> &str {
        &self.enc
    }

    /// Returns the content type, if present.
    #[must_use]
    pub fn cty(&self) -> Option<&str> {
        self.cty.as_deref()
    }

    /// Returns the PBKDF2 iteration count.
    #[must_use]
    pub const fn iteration_count(&self) -> u32 {
        self.p2c
    }

    /// Decodes the `p2s` salt.
    ///
    /// # Errors
    ///
    /// Returns `DecryptError::MalformedEnvelope` if the salt is not base64url
    /// or shorter than [`MIN_SALT_SIZE`].
    pub fn salt(&self) -> Result<Vec<u8>, DecryptError> {
        let salt = b64url_decode(&self.p2s)
            .map_err(|_| DecryptError::MalformedEnvelope("p2s is not base64url".to_string()))?;
        if salt.len() < MIN_SALT_SIZE {
            return Err(DecryptError::MalformedEnvelope(format!(
                "p2s must be at least {MIN_SALT_SIZE} bytes, found {}",
                salt.len()
            )));
        }
        Ok(salt)
    }

    /// Encodes the header as a base64url segment.
    #[must_use]
    pub fn encode(&self) -> String {
        // String and integer members always serialize.
        b64url_encode(serde_json::to_vec(self).unwrap_or_default())
    }

    /// Decodes and checks a base64url header segment.
    ///
    /// # Errors
    ///
    /// Returns `DecryptError::MalformedEnvelope` if the segment does not decode
    /// to a JSON header, names other algorithms, declares `crit` or `zip`, or
    /// has an out-of-range iteration count.
    pub fn decode(segment: &str) -> Result<Self, DecryptError> {
        let json = b64url_decode(segment)
            .map_err(|_| DecryptError::MalformedEnvelope("header is not base64url".to_string()))?;
        let header: Self = serde_json::from_slice(&json)
            .map_err(|err| DecryptError::MalformedEnvelope(format!("header: {err}")))?;

        if header.alg != KEY_MANAGEMENT_ALGORITHM {
            return Err(DecryptError::MalformedEnvelope(format!(
                "unsupported key management algorithm '{}'",
                header.alg
            )));
        }
        if header.enc != CONTENT_ENCRYPTION_ALGORITHM {
            return Err(DecryptError::MalformedEnvelope(format!(
                "unsupported content encryption algorithm '{}'",
                header.enc
            )));
        }
        if header.crit.is_some() {
            return Err(DecryptError::MalformedEnvelope(
                "critical header parameters are not supported".to_string(),
            ));
        }
        if header.zip.is_some() {
            return Err(DecryptError::MalformedEnvelope("compression is not supported".to_string()));
        }
        if header.p2c == 0 || header.p2c > MAX_ITERATION_COUNT {
            return Err(DecryptError::MalformedEnvelope(format!(
                "p2c must be between 1 and {MAX_ITERATION_COUNT}, found {}",
                header.p2c
            )));
        }
        Ok(header)
    }
}
