//! JWK validation.
//!
//! [`check`] is the entry point used by the `check` command: it parses a
//! document and runs every consistency rule. [`validate`] runs the same rules
//! on an already typed [`Jwk`], so generated and converted keys go through
//! the same checks as keys read from disk.

use crate::algorithm::{self, KeyShape};
use crate::convert;
use crate::crypto;
use crate::encoding::{b64_decode, b64url_decode, b64url_encode};
use crate::error::CheckError;
use crate::jwk::{Jwk, KeyMaterial};
use sha2::{Digest, Sha256};
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

/// Parses and validates a JWK document.
///
/// # Errors
///
/// Returns `CheckError::MalformedDocument` when the text is not a JSON object
/// of the right shape, and `CheckError::ValidationFailure` naming the first
/// member that breaks a rule.
///
/// # Example
///
/// ```
/// use jwkit::validate::check;
///
/// assert!(check(br#"{"kty":"oct","k":"AAECAwQFBgcICQoLDA0ODw"}"#).is_ok());
/// assert!(check(br#"{"kty":"oct"}"#).is_err());
/// ```
pub fn check(document: &[u8]) -> Result<(), CheckError> {
    Jwk::from_json(document).map(drop)
}

/// Runs the consistency rules on a typed key.
///
/// # Errors
///
/// Returns `CheckError::ValidationFailure` for the first rule the key breaks.
pub fn validate(jwk: &Jwk) -> Result<(), CheckError> {
    match &jwk.material {
        KeyMaterial::Symmetric(_) => {}
        KeyMaterial::Rsa(key) => crypto::check_rsa(key)?,
        KeyMaterial::Ec(key) => crypto::check_ec(key)?,
    }
    check_usage(jwk)?;
    if let Some(alg) = &jwk.alg {
        check_algorithm(jwk, alg)?;
    }
    check_certificates(jwk)
}

fn check_usage(jwk: &Jwk) -> Result<(), CheckError> {
    let Some(key_use) = jwk.key_use else {
        return Ok(());
    };
    match jwk.key_ops.iter().find(|op| op.key_use() != key_use) {
        Some(op) => Err(CheckError::invalid(
            "key_ops",
            format!("operation '{op}' is inconsistent with use '{key_use}'"),
        )),
        None => Ok(()),
    }
}

fn check_algorithm(jwk: &Jwk, alg: &str) -> Result<(), CheckError> {
    // Unregistered algorithms are accepted as-is.
    let Some(algorithm) = algorithm::lookup(alg) else {
        return Ok(());
    };

    if algorithm.kty() != jwk.material.kty() {
        return Err(CheckError::invalid(
            "alg",
            format!("'{alg}' requires a {} key, found {}", algorithm.kty(), jwk.material.kty()),
        ));
    }

    match (&jwk.material, algorithm.shape) {
        (KeyMaterial::Symmetric(key), KeyShape::Hmac { min_bits }) if key.size_bits() < min_bits => {
            return Err(CheckError::invalid(
                "alg",
                format!("'{alg}' requires a key of at least {min_bits} bits, found {}", key.size_bits()),
            ));
        }
        (KeyMaterial::Symmetric(key), KeyShape::Symmetric { bits }) if key.size_bits() != bits => {
            return Err(CheckError::invalid(
                "alg",
                format!("'{alg}' requires a key of {bits} bits, found {}", key.size_bits()),
            ));
        }
        (KeyMaterial::Ec(key), KeyShape::Ec(curve)) if key.curve != curve => {
            return Err(CheckError::invalid(
                "alg",
                format!("'{alg}' requires curve {curve}, found {}", key.curve),
            ));
        }
        _ => {}
    }

    if let Some(key_use) = jwk.key_use {
        if key_use != algorithm.key_use {
            return Err(CheckError::invalid(
                "use",
                format!("'{key_use}' is inconsistent with algorithm '{alg}'"),
            ));
        }
    }
    if let Some(op) = jwk.key_ops.iter().find(|op| op.key_use() != algorithm.key_use) {
        return Err(CheckError::invalid(
            "key_ops",
            format!("operation '{op}' is inconsistent with algorithm '{alg}'"),
        ));
    }
    Ok(())
}

fn check_certificates(jwk: &Jwk) -> Result<(), CheckError> {
    if let Some(thumbprint) = &jwk.x5t_s256 {
        let digest = b64url_decode(thumbprint)
            .map_err(|_| CheckError::invalid("x5t#S256", "not valid base64url"))?;
        if digest.len() != 32 {
            return Err(CheckError::invalid("x5t#S256", "must be a SHA-256 digest"));
        }
    }

    let Some((leaf, rest)) = jwk.x5c.split_first() else {
        return Ok(());
    };
    if matches!(jwk.material, KeyMaterial::Symmetric(_)) {
        return Err(CheckError::invalid("x5c", "not allowed for symmetric keys"));
    }

    let leaf_der = b64_decode(leaf)
        .map_err(|_| CheckError::invalid("x5c", "entry 0 is not valid base64"))?;
    let certificate = Certificate::from_der(&leaf_der)
        .map_err(|err| CheckError::invalid("x5c", format!("entry 0 is not a certificate: {err}")))?;
    for (index, entry) in rest.iter().enumerate() {
        let der = b64_decode(entry).map_err(|_| {
            CheckError::invalid("x5c", format!("entry {} is not valid base64", index + 1))
        })?;
        Certificate::from_der(&der).map_err(|err| {
            CheckError::invalid("x5c", format!("entry {} is not a certificate: {err}", index + 1))
        })?;
    }

    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|err| CheckError::invalid("x5c", err.to_string()))?;
    let certified = convert::public_key_from_spki(&spki)
        .map_err(|err| CheckError::invalid("x5c", err.to_string()))?;
    if !certified.same_public_key(&jwk.material) {
        return Err(CheckError::invalid("x5c", "certificate public key does not match the key"));
    }

    if let Some(thumbprint) = &jwk.x5t_s256 {
        if *thumbprint != b64url_encode(Sha256::digest(&leaf_der)) {
            return Err(CheckError::invalid("x5t#S256", "does not match the first certificate"));
        }
    }
    Ok(())
}
