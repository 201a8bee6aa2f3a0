//! Key generation for the `new` command.

use crate::algorithm;
use crate::crypto;
use crate::error::GenerateError;
use crate::jwk::{Curve, Jwk, KeyMaterial, KeyOperation, KeyUse, SecretBytes, SymmetricKey};
use crate::kdf::random_bytes;
use crate::validate::validate;
use tracing::debug;

/// Default RSA modulus size in bits.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Default symmetric key size in bits when no algorithm implies one.
pub const DEFAULT_OCT_BITS: usize = 256;

/// Largest symmetric key generated, in bits.
pub const MAX_OCT_BITS: usize = 8192;

/// Kind and size of key to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// Symmetric key; size defaults from the algorithm
    Oct {
        /// Key size in bits
        length: Option<usize>,
    },
    /// RSA key
    Rsa {
        /// Modulus size in bits
        length: Option<usize>,
    },
    /// Elliptic curve key
    Ec {
        /// Curve to generate on
        curve: Curve,
    },
}

/// How the `kid` member of a new key is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KidPolicy {
    /// RFC 7638 thumbprint of the key
    #[default]
    Thumbprint,
    /// Caller supplied identifier
    Explicit(String),
    /// No `kid` member
    Omit,
}

/// Optional metadata members of a new key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyAttributes {
    /// Intended algorithm
    pub alg: Option<String>,
    /// Intended use
    pub key_use: Option<KeyUse>,
    /// Permitted operations
    pub key_ops: Vec<KeyOperation>,
    /// `kid` selection
    pub kid: KidPolicy,
}

/// Generates a new key.
///
/// The result is checked with the same rules as `check`, so an algorithm that
/// does not fit the requested key is rejected.
///
/// # Errors
///
/// Returns `GenerateError::InvalidLength` for unsupported sizes,
/// `GenerateError::Failed` if the generator fails, or
/// `GenerateError::Invalid` if the attributes do not fit the key.
///
/// # Example
///
/// ```
/// use jwkit::generate::{generate, KeyAttributes, KeySpec};
///
/// let jwk = generate(KeySpec::Oct { length: Some(128) }, &KeyAttributes::default())
///     .expect("generation failed");
/// assert_eq!(jwk.kid, Some(jwk.thumbprint()));
/// ```
pub fn generate(spec: KeySpec, attributes: &KeyAttributes) -> Result<Jwk, GenerateError> {
    let material = match spec {
        KeySpec::Oct { length } => {
            let bits = length.unwrap_or_else(|| default_oct_bits(attributes.alg.as_deref()));
            if bits == 0 || bits % 8 != 0 || bits > MAX_OCT_BITS {
                return Err(GenerateError::InvalidLength {
                    kty: "oct",
                    length: bits,
                    expected: "a positive multiple of 8 up to 8192",
                });
            }
            KeyMaterial::Symmetric(SymmetricKey { k: SecretBytes::new(random_bytes(bits / 8)) })
        }
        KeySpec::Rsa { length } => {
            let bits = length.unwrap_or(DEFAULT_RSA_BITS);
            if !(1024..=4096).contains(&bits) || bits % 8 != 0 {
                return Err(GenerateError::InvalidLength {
                    kty: "RSA",
                    length: bits,
                    expected: "a multiple of 8 between 1024 and 4096",
                });
            }
            KeyMaterial::Rsa(crypto::generate_rsa(bits)?)
        }
        KeySpec::Ec { curve } => KeyMaterial::Ec(crypto::generate_ec(curve)),
    };

    let mut jwk = Jwk::new(material);
    jwk.alg.clone_from(&attributes.alg);
    jwk.key_use = attributes.key_use;
    jwk.key_ops.clone_from(&attributes.key_ops);
    jwk.kid = match &attributes.kid {
        KidPolicy::Thumbprint => Some(jwk.thumbprint()),
        KidPolicy::Explicit(kid) => Some(kid.clone()),
        KidPolicy::Omit => None,
    };

    validate(&jwk)?;
    debug!(kty = jwk.material.kty(), alg = ?jwk.alg, "generated key");
    Ok(jwk)
}

fn default_oct_bits(alg: Option<&str>) -> usize {
    alg.and_then(algorithm::lookup)
        .and_then(algorithm::Algorithm::symmetric_bits)
        .unwrap_or(DEFAULT_OCT_BITS)
}
