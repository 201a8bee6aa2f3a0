//! Password-based key derivation (PBES2, RFC 7518 section 4.8).
//!
//! The key encryption key is derived with PBKDF2-HMAC-SHA256. The PBKDF2 salt
//! is `alg || 0x00 || p2s`, which binds the derived key to the algorithm name.

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Key encryption key size in bytes (AES-128 key wrap).
pub const KEK_SIZE: usize = 16;

/// Content encryption key size in bytes (`A128CBC-HS256`: MAC key || AES key).
pub const CEK_SIZE: usize = 32;

/// Initialization vector size in bytes for AES-CBC.
pub const IV_SIZE: usize = 16;

/// Derives the key encryption key from a password.
///
/// # Arguments
///
/// * `password` - The user password, used as raw UTF-8 bytes
/// * `alg` - The key management algorithm name, mixed into the salt
/// * `salt` - The `p2s` salt input
/// * `iteration_count` - The `p2c` iteration count
///
/// # Example
///
/// ```
/// use jwkit::kdf::derive_kek;
/// use secrecy::SecretString;
///
/// let password = SecretString::new("P@ssw0rd".to_string());
/// let kek = derive_kek(&password, "PBES2-HS256+A128KW", &[0u8; 8], 1000);
/// assert_eq!(kek.len(), 16);
/// ```
#[must_use]
pub fn derive_kek(
    password: &SecretString,
    alg: &str,
    salt: &[u8],
    iteration_count: u32,
) -> Zeroizing<[u8; KEK_SIZE]> {
    let mut salt_input = Vec::with_capacity(alg.len() + 1 + salt.len());
    salt_input.extend_from_slice(alg.as_bytes());
    salt_input.push(0);
    salt_input.extend_from_slice(salt);

    let mut kek = Zeroizing::new([0u8; KEK_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        &salt_input,
        iteration_count,
        &mut *kek,
    );
    kek
}

/// Generates a random content encryption key.
#[must_use]
pub fn generate_cek() -> Zeroizing<[u8; CEK_SIZE]> {
    let mut cek = Zeroizing::new([0u8; CEK_SIZE]);
    OsRng.fill_bytes(&mut *cek);
    cek
}

/// Returns `len` random bytes, used for salts and IVs.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
