//! Bridges between the JWK model and the RustCrypto key types.

use crate::error::{CheckError, ConvertError, GenerateError};
use crate::jwk::{Curve, EcKey, RsaKey, RsaPrimes, RsaPrivateParts, SecretBytes};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};

/// Largest RSA modulus accepted when reading keys, in bits.
pub(crate) const MAX_RSA_BITS: usize = 16384;

/// Runs `$body` with `$m` bound to the curve implementation crate.
macro_rules! with_curve {
    ($curve:expr, $m:ident => $body:block) => {
        match $curve {
            Curve::P256 => {
                use p256 as $m;
                $body
            }
            Curve::P384 => {
                use p384 as $m;
                $body
            }
            Curve::P521 => {
                use p521 as $m;
                $body
            }
        }
    };
}

/// Builds the model form of an RSA public key.
pub(crate) fn rsa_public(key: &RsaPublicKey) -> RsaKey {
    RsaKey { n: key.n().to_bytes_be(), e: key.e().to_bytes_be(), private: None }
}

/// Builds the model form of a two-prime RSA private key.
pub(crate) fn rsa_private(key: &RsaPrivateKey) -> Result<RsaKey, ConvertError> {
    let [p, q] = key.primes() else {
        return Err(ConvertError::UnsupportedAlgorithm {
            algorithm: format!("RSA with {} primes", key.primes().len()),
        });
    };

    Ok(RsaKey {
        n: key.n().to_bytes_be(),
        e: key.e().to_bytes_be(),
        private: Some(RsaPrivateParts {
            d: secret(key.d()),
            primes: Some(crt_parameters(key.d(), p, q)),
        }),
    })
}

fn secret(value: &BigUint) -> SecretBytes {
    SecretBytes::new(value.to_bytes_be())
}

fn crt_parameters(d: &BigUint, p: &BigUint, q: &BigUint) -> RsaPrimes {
    let one = BigUint::from(1u32);
    let two = BigUint::from(2u32);
    let dp = d % (p - &one);
    let dq = d % (q - &one);
    // p is prime, so q^(p-2) is the inverse of q modulo p.
    let qi = q.modpow(&(p - &two), p);

    RsaPrimes { p: secret(p), q: secret(q), dp: secret(&dp), dq: secret(&dq), qi: secret(&qi) }
}

/// Generates a two-prime RSA key of the given modulus size.
pub(crate) fn generate_rsa(bits: usize) -> Result<RsaKey, GenerateError> {
    let key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|err| GenerateError::Failed(err.to_string()))?;
    rsa_private(&key).map_err(|err| GenerateError::Failed(err.to_string()))
}

pub(crate) fn rsa_public_from_spki(der: &[u8]) -> Result<RsaKey, ConvertError> {
    let key = RsaPublicKey::from_public_key_der(der)
        .map_err(|err| ConvertError::InvalidKey(err.to_string()))?;
    Ok(rsa_public(&key))
}

pub(crate) fn rsa_public_from_pkcs1(der: &[u8]) -> Result<RsaKey, ConvertError> {
    let key = RsaPublicKey::from_pkcs1_der(der)
        .map_err(|err| ConvertError::InvalidKey(err.to_string()))?;
    Ok(rsa_public(&key))
}

pub(crate) fn rsa_private_from_pkcs8(der: &[u8]) -> Result<RsaKey, ConvertError> {
    let key = RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|_| ConvertError::InvalidKey("unreadable PKCS#8 RSA private key".to_string()))?;
    rsa_private(&key)
}

pub(crate) fn rsa_private_from_pkcs1(der: &[u8]) -> Result<RsaKey, ConvertError> {
    let key = RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|_| ConvertError::InvalidKey("unreadable PKCS#1 RSA private key".to_string()))?;
    rsa_private(&key)
}

/// Checks that the RSA parameters form a usable key.
///
/// Private keys are rebuilt from `n`, `e`, `d` and the primes, then checked
/// for consistency; supplied CRT values must match the recomputed ones.
pub(crate) fn check_rsa(key: &RsaKey) -> Result<(), CheckError> {
    if key.e.iter().all(|&b| b == 0) {
        return Err(CheckError::invalid("e", "public exponent must not be zero"));
    }
    if key.n.last().is_some_and(|low| low & 1 == 0) {
        return Err(CheckError::invalid("n", "modulus must be odd"));
    }
    let n = BigUint::from_bytes_be(&key.n);
    let e = BigUint::from_bytes_be(&key.e);
    RsaPublicKey::new_with_max_size(n.clone(), e.clone(), MAX_RSA_BITS)
        .map_err(|err| CheckError::invalid("n", format!("not a usable RSA public key: {err}")))?;

    let Some(private) = &key.private else {
        return Ok(());
    };

    let one = BigUint::from(1u32);
    let d = BigUint::from_bytes_be(private.d.expose());
    let primes = match &private.primes {
        Some(primes) => {
            let p = BigUint::from_bytes_be(primes.p.expose());
            let q = BigUint::from_bytes_be(primes.q.expose());
            if p <= one {
                return Err(CheckError::invalid("p", "not a valid prime factor"));
            }
            if q <= one {
                return Err(CheckError::invalid("q", "not a valid prime factor"));
            }
            vec![p, q]
        }
        None => Vec::new(),
    };

    let mismatch = || CheckError::rejected("private parameters do not correspond to the public key");
    let rebuilt = RsaPrivateKey::from_components(n, e, d, primes).map_err(|_| mismatch())?;
    rebuilt.validate().map_err(|_| mismatch())?;

    if let (Some(supplied), [p, q]) = (&private.primes, rebuilt.primes()) {
        let expected = crt_parameters(rebuilt.d(), p, q);
        let same = |a: &SecretBytes, b: &SecretBytes| {
            BigUint::from_bytes_be(a.expose()) == BigUint::from_bytes_be(b.expose())
        };
        if !same(&supplied.dp, &expected.dp) {
            return Err(CheckError::invalid("dp", "does not match d mod (p - 1)"));
        }
        if !same(&supplied.dq, &expected.dq) {
            return Err(CheckError::invalid("dq", "does not match d mod (q - 1)"));
        }
        if !same(&supplied.qi, &expected.qi) {
            return Err(CheckError::invalid("qi", "is not the inverse of q modulo p"));
        }
    }

    Ok(())
}

/// Splits an uncompressed SEC1 point into fixed-width coordinates.
fn split_point(curve: Curve, encoded: &[u8], d: Option<SecretBytes>) -> EcKey {
    // Uncompressed points are 0x04 || x || y.
    let (x, y) = encoded[1..].split_at(curve.coordinate_size());
    EcKey { curve, x: x.to_vec(), y: y.to_vec(), d }
}

/// Generates a key on the given curve.
pub(crate) fn generate_ec(curve: Curve) -> EcKey {
    with_curve!(curve, m => {
        let secret = m::SecretKey::random(&mut OsRng);
        let point = secret.public_key().to_encoded_point(false);
        split_point(curve, point.as_bytes(), Some(SecretBytes::new(secret.to_bytes().to_vec())))
    })
}

pub(crate) fn ec_public_from_spki(curve: Curve, der: &[u8]) -> Result<EcKey, ConvertError> {
    with_curve!(curve, m => {
        let public = m::PublicKey::from_public_key_der(der)
            .map_err(|err| ConvertError::InvalidKey(err.to_string()))?;
        let point = public.to_encoded_point(false);
        Ok(split_point(curve, point.as_bytes(), None))
    })
}

pub(crate) fn ec_private_from_pkcs8(curve: Curve, der: &[u8]) -> Result<EcKey, ConvertError> {
    with_curve!(curve, m => {
        let secret = m::SecretKey::from_pkcs8_der(der)
            .map_err(|_| ConvertError::InvalidKey(format!("unreadable PKCS#8 {curve} private key")))?;
        let point = secret.public_key().to_encoded_point(false);
        Ok(split_point(curve, point.as_bytes(), Some(SecretBytes::new(secret.to_bytes().to_vec()))))
    })
}

/// Reads a SEC1 `EC PRIVATE KEY`, trying each supported curve.
pub(crate) fn ec_private_from_sec1(der: &[u8]) -> Result<EcKey, ConvertError> {
    for curve in [Curve::P256, Curve::P384, Curve::P521] {
        let key = with_curve!(curve, m => {
            m::SecretKey::from_sec1_der(der).ok().map(|secret| {
                let point = secret.public_key().to_encoded_point(false);
                split_point(curve, point.as_bytes(), Some(SecretBytes::new(secret.to_bytes().to_vec())))
            })
        });
        if let Some(key) = key {
            return Ok(key);
        }
    }
    Err(ConvertError::InvalidKey("EC private key is not on a supported curve".to_string()))
}

/// Checks that the point lies on the curve and matches the private scalar.
pub(crate) fn check_ec(key: &EcKey) -> Result<(), CheckError> {
    let size = key.curve.coordinate_size();
    for (name, coordinate) in [("x", &key.x), ("y", &key.y)] {
        if coordinate.len() != size {
            return Err(CheckError::invalid(
                name,
                format!("expected {size} octets for {}, found {}", key.curve, coordinate.len()),
            ));
        }
    }
    if let Some(d) = &key.d {
        if d.len() != size {
            return Err(CheckError::invalid(
                "d",
                format!("expected {size} octets for {}, found {}", key.curve, d.len()),
            ));
        }
    }

    let mut encoded = Vec::with_capacity(1 + 2 * size);
    encoded.push(0x04);
    encoded.extend_from_slice(&key.x);
    encoded.extend_from_slice(&key.y);

    with_curve!(key.curve, m => {
        let public = m::PublicKey::from_sec1_bytes(&encoded)
            .map_err(|_| CheckError::rejected(format!("the point is not on curve {}", key.curve)))?;
        if let Some(d) = &key.d {
            let secret = m::SecretKey::from_slice(d.expose())
                .map_err(|_| CheckError::invalid("d", "not a valid private scalar"))?;
            if secret.public_key() != public {
                return Err(CheckError::invalid("d", "does not correspond to the public point"));
            }
        }
    });

    Ok(())
}
