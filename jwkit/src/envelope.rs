//! Password-protected JWK envelopes.
//!
//! A key is wrapped into a JWE in compact serialization using
//! `PBES2-HS256+A128KW` for key management and `A128CBC-HS256` for content
//! encryption:
//!
//! ```text
//! BASE64URL(header) . BASE64URL(wrapped CEK) . BASE64URL(IV) . BASE64URL(ciphertext) . BASE64URL(tag)
//! ```
//!
//! 1. Derive a 128-bit KEK from the password with PBKDF2 (`p2s`, `p2c`)
//! 2. Generate a random 256-bit CEK and wrap it with AES key wrap
//! 3. Encrypt the JWK with AES-128-CBC under the second half of the CEK
//! 4. Authenticate `AAD || IV || ciphertext || AL` with HMAC-SHA256 under the
//!    first half, keeping the leftmost 128 bits

use crate::encoding::{b64url_decode, b64url_encode};
use crate::error::{DecryptError, EnvelopeError};
use crate::header::{ProtectedHeader, KEY_MANAGEMENT_ALGORITHM, MAX_ITERATION_COUNT};
use crate::kdf::{derive_kek, generate_cek, random_bytes, CEK_SIZE, IV_SIZE, KEK_SIZE};
use aes::cipher::generic_array::GenericArray;
use aes_kw::KekAes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATION_COUNT: u32 = 1000;

/// Default salt size in bits.
pub const DEFAULT_SALT_SIZE: u32 = 64;

/// Size of the wrapped CEK in bytes.
const WRAPPED_KEY_SIZE: usize = CEK_SIZE + 8;

/// Size of the truncated authentication tag in bytes.
const TAG_SIZE: usize = 16;

/// Half of the CEK used as the HMAC key; the other half is the AES key.
const MAC_KEY_SIZE: usize = CEK_SIZE / 2;

/// Password and PBKDF2 parameters used to wrap a key.
///
/// # Example
///
/// ```
/// use jwkit::envelope::DerivationParameters;
/// use secrecy::SecretString;
///
/// let params = DerivationParameters::new(SecretString::new("P@ssw0rd".to_string()))
///     .with_iteration_count(10_000)
///     .with_salt_size(256);
/// assert_eq!(params.iteration_count(), 10_000);
/// assert_eq!(params.salt_size(), 256);
/// ```
#[derive(Debug, Clone)]
pub struct DerivationParameters {
    password: SecretString,
    iteration_count: u32,
    salt_size: u32,
}

impl DerivationParameters {
    /// Creates parameters with the default iteration count and salt size.
    #[must_use]
    pub const fn new(password: SecretString) -> Self {
        Self { password, iteration_count: DEFAULT_ITERATION_COUNT, salt_size: DEFAULT_SALT_SIZE }
    }

    /// Sets the PBKDF2 iteration count.
    #[must_use]
    pub const fn with_iteration_count(mut self, iteration_count: u32) -> Self {
        self.iteration_count = iteration_count;
        self
    }

    /// Sets the salt size in bits.
    #[must_use]
    pub const fn with_salt_size(mut self, salt_size: u32) -> Self {
        self.salt_size = salt_size;
        self
    }

    /// Returns the password.
    #[must_use]
    pub const fn password(&self) -> &SecretString {
        &self.password
    }

    /// Returns the PBKDF2 iteration count.
    #[must_use]
    pub const fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Returns the salt size in bits.
    #[must_use]
    pub const fn salt_size(&self) -> u32 {
        self.salt_size
    }

    /// Checks the parameters are within the accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::InvalidParameters` if the iteration count is
    /// zero or above the decryption limit, or if the salt size is not a
    /// multiple of 8 of at least 64 bits.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.iteration_count == 0 || self.iteration_count > MAX_ITERATION_COUNT {
            return Err(EnvelopeError::InvalidParameters(format!(
                "iteration count must be between 1 and {MAX_ITERATION_COUNT}, found {}",
                self.iteration_count
            )));
        }
        if self.salt_size < DEFAULT_SALT_SIZE || self.salt_size % 8 != 0 {
            return Err(EnvelopeError::InvalidParameters(format!(
                "salt size must be a multiple of 8 and at least {DEFAULT_SALT_SIZE} bits, found {}",
                self.salt_size
            )));
        }
        Ok(())
    }
}

/// A JWE in compact serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope(String);

impl Envelope {
    /// Returns the compact serialization.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the envelope, returning the compact serialization.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Envelope {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encrypts a JWK document under a password.
///
/// # Arguments
///
/// * `plaintext` - The JWK JSON text
/// * `params` - Password, iteration count and salt size
///
/// # Errors
///
/// Returns `EnvelopeError::InvalidParameters` if `params` is out of range, or
/// `EnvelopeError::EncryptionFailed` if a primitive rejects its input.
///
/// # Example
///
/// ```
/// use jwkit::envelope::{unwrap, wrap, DerivationParameters};
/// use secrecy::{ExposeSecret, SecretString};
///
/// let password = SecretString::new("P@ssw0rd".to_string());
/// let envelope = wrap(r#"{"kty":"oct","k":"AAEC"}"#, &DerivationParameters::new(password.clone()))
///     .expect("wrap failed");
/// let plaintext = unwrap(envelope.as_str(), &password).expect("unwrap failed");
/// assert_eq!(plaintext.expose_secret(), r#"{"kty":"oct","k":"AAEC"}"#);
/// ```
pub fn wrap(plaintext: &str, params: &DerivationParameters) -> Result<Envelope, EnvelopeError> {
    params.validate()?;

    // Derive the KEK from the password and a fresh salt
    let salt = random_bytes(params.salt_size as usize / 8);
    let header = ProtectedHeader::new(&salt, params.iteration_count);
    let kek = derive_kek(&params.password, KEY_MANAGEMENT_ALGORITHM, &salt, params.iteration_count);

    // Wrap a fresh CEK under the KEK
    let cek = generate_cek();
    let mut wrapped_key = [0u8; WRAPPED_KEY_SIZE];
    kek_cipher(&kek)
        .wrap(&cek[..], &mut wrapped_key)
        .map_err(|_| EnvelopeError::EncryptionFailed("AES key wrap failed".to_string()))?;

    // Encrypt the document under the AES half of the CEK
    let (mac_key, enc_key) = cek.split_at(MAC_KEY_SIZE);
    let iv = random_bytes(IV_SIZE);
    let ciphertext = Aes128CbcEnc::new_from_slices(enc_key, &iv)
        .map_err(|err| EnvelopeError::EncryptionFailed(err.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    // Authenticate the encoded header, IV and ciphertext
    let aad = header.encode();
    let tag = authentication_mac(mac_key, aad.as_bytes(), &iv, &ciphertext)
        .map_err(|err| EnvelopeError::EncryptionFailed(err.to_string()))?
        .finalize()
        .into_bytes();

    debug!(
        iteration_count = params.iteration_count,
        salt_size = params.salt_size,
        "wrapped key into envelope"
    );

    Ok(Envelope(format!(
        "{aad}.{}.{}.{}.{}",
        b64url_encode(wrapped_key),
        b64url_encode(&iv),
        b64url_encode(&ciphertext),
        b64url_encode(&tag[..TAG_SIZE]),
    )))
}

/// Decrypts an envelope produced by [`wrap`].
///
/// Surrounding whitespace is ignored. Key unwrap, tag and padding failures are
/// all reported as `DecryptError::AuthenticationFailed`.
///
/// # Errors
///
/// Returns `DecryptError::MalformedEnvelope` if the text is not a supported
/// five-segment JWE, or `DecryptError::AuthenticationFailed` if the password
/// is wrong or the envelope was altered.
pub fn unwrap(envelope: &str, password: &SecretString) -> Result<SecretString, DecryptError> {
    let segments = Segments::parse(envelope.trim())?;
    let header = ProtectedHeader::decode(segments.header)?;
    let salt = header.salt()?;

    // Recover the CEK
    let kek = derive_kek(password, KEY_MANAGEMENT_ALGORITHM, &salt, header.iteration_count());
    let mut cek = Zeroizing::new([0u8; CEK_SIZE]);
    kek_cipher(&kek)
        .unwrap(&segments.encrypted_key, &mut *cek)
        .map_err(|_| DecryptError::AuthenticationFailed)?;
    let (mac_key, enc_key) = cek.split_at(MAC_KEY_SIZE);

    // Verify the tag before touching the ciphertext
    authentication_mac(mac_key, segments.header.as_bytes(), &segments.iv, &segments.ciphertext)
        .map_err(|_| DecryptError::AuthenticationFailed)?
        .verify_truncated_left(&segments.tag)
        .map_err(|_| DecryptError::AuthenticationFailed)?;

    let plaintext = Aes128CbcDec::new_from_slices(enc_key, &segments.iv)
        .map_err(|_| DecryptError::AuthenticationFailed)?
        .decrypt_padded_vec_mut::<Pkcs7>(&segments.ciphertext)
        .map_err(|_| DecryptError::AuthenticationFailed)?;

    debug!(iteration_count = header.iteration_count(), "unwrapped key from envelope");

    match String::from_utf8(plaintext) {
        Ok(text) => Ok(SecretString::new(text)),
        Err(err) => {
            err.into_bytes().zeroize();
            Err(DecryptError::MalformedEnvelope("payload is not UTF-8".to_string()))
        }
    }
}

fn kek_cipher(kek: &[u8; KEK_SIZE]) -> KekAes128 {
    KekAes128::new(GenericArray::from_slice(kek))
}

fn authentication_mac(
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<HmacSha256, hmac::digest::InvalidLength> {
    // AL is the AAD length in bits as a 64-bit big-endian integer
    let aad_bits = (aad.len() as u64) * 8;

    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)?;
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&aad_bits.to_be_bytes());
    Ok(mac)
}

/// The five decoded segments of a compact JWE.
struct Segments<'a> {
    header: &'a str,
    encrypted_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

impl<'a> Segments<'a> {
    fn parse(envelope: &'a str) -> Result<Self, DecryptError> {
        let parts: Vec<&str> = envelope.split('.').collect();
        let [header, encrypted_key, iv, ciphertext, tag] = parts[..] else {
            return Err(DecryptError::MalformedEnvelope(format!(
                "expected 5 segments, found {}",
                parts.len()
            )));
        };

        let segments = Self {
            header,
            encrypted_key: decode_segment(encrypted_key, "encrypted key")?,
            iv: decode_segment(iv, "initialization vector")?,
            ciphertext: decode_segment(ciphertext, "ciphertext")?,
            tag: decode_segment(tag, "authentication tag")?,
        };

        if segments.encrypted_key.len() != WRAPPED_KEY_SIZE {
            return Err(DecryptError::MalformedEnvelope(format!(
                "encrypted key must be {WRAPPED_KEY_SIZE} bytes, found {}",
                segments.encrypted_key.len()
            )));
        }
        if segments.iv.len() != IV_SIZE {
            return Err(DecryptError::MalformedEnvelope(format!(
                "initialization vector must be {IV_SIZE} bytes, found {}",
                segments.iv.len()
            )));
        }
        if segments.ciphertext.is_empty() || segments.ciphertext.len() % 16 != 0 {
            return Err(DecryptError::MalformedEnvelope(
                "ciphertext length is not a positive multiple of the block size".to_string(),
            ));
        }
        if segments.tag.len() != TAG_SIZE {
            return Err(DecryptError::MalformedEnvelope(format!(
                "authentication tag must be {TAG_SIZE} bytes, found {}",
                segments.tag.len()
            )));
        }
        Ok(segments)
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, DecryptError> {
    b64url_decode(segment)
        .map_err(|_| DecryptError::MalformedEnvelope(format!("{name} is not base64url")))
}
