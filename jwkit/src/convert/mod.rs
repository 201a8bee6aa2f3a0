//! Conversion of X.509 certificates and PEM keys into JWKs.
//!
//! Converted keys get the RFC 7638 thumbprint as `kid`. Keys read from a
//! certificate also carry `x5c` and `x5t#S256`.

mod pem_key;
mod x509;

pub use pem_key::from_pem;
pub use x509::{from_certificate, from_container, CertificateContainer};

use crate::crypto;
use crate::error::ConvertError;
use crate::jwk::{Curve, KeyMaterial};
use rsa::pkcs8::spki::SubjectPublicKeyInfoRef;
use rsa::pkcs8::PrivateKeyInfo;
use x509_cert::der::asn1::ObjectIdentifier;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const ED448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.113");
const X25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.110");
const X448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.111");
const DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");

/// Friendly name of a key algorithm OID, or its dotted form.
pub(crate) fn algorithm_name(oid: &ObjectIdentifier) -> String {
    let name = if *oid == RSA_ENCRYPTION {
        "RSA"
    } else if *oid == RSASSA_PSS {
        "RSASSA-PSS"
    } else if *oid == EC_PUBLIC_KEY {
        "ECC"
    } else if *oid == ED25519 {
        "Ed25519"
    } else if *oid == ED448 {
        "Ed448"
    } else if *oid == X25519 {
        "X25519"
    } else if *oid == X448 {
        "X448"
    } else if *oid == DSA {
        "DSA"
    } else {
        return oid.to_string();
    };
    name.to_string()
}

fn curve_from_oid(parameters: Option<ObjectIdentifier>) -> Result<Curve, ConvertError> {
    match parameters {
        Some(oid) if oid == SECP256R1 => Ok(Curve::P256),
        Some(oid) if oid == SECP384R1 => Ok(Curve::P384),
        Some(oid) if oid == SECP521R1 => Ok(Curve::P521),
        Some(oid) => Err(ConvertError::UnsupportedAlgorithm { algorithm: format!("ECC curve {oid}") }),
        None => Err(ConvertError::InvalidKey("EC key without a named curve".to_string())),
    }
}

/// Reads a DER `SubjectPublicKeyInfo`.
pub(crate) fn public_key_from_spki(der: &[u8]) -> Result<KeyMaterial, ConvertError> {
    let info = SubjectPublicKeyInfoRef::try_from(der)
        .map_err(|err| ConvertError::InvalidKey(err.to_string()))?;
    let oid = info.algorithm.oid;

    if oid == RSA_ENCRYPTION {
        return crypto::rsa_public_from_spki(der).map(KeyMaterial::Rsa);
    }
    if oid == EC_PUBLIC_KEY {
        let curve = curve_from_oid(info.algorithm.parameters_oid().ok())?;
        return crypto::ec_public_from_spki(curve, der).map(KeyMaterial::Ec);
    }
    Err(ConvertError::UnsupportedAlgorithm { algorithm: algorithm_name(&oid) })
}

/// Reads an unencrypted DER PKCS#8 `PrivateKeyInfo`.
pub(crate) fn private_key_from_pkcs8(der: &[u8]) -> Result<KeyMaterial, ConvertError> {
    let info = PrivateKeyInfo::try_from(der)
        .map_err(|_| ConvertError::InvalidKey("unreadable PKCS#8 private key".to_string()))?;
    let oid = info.algorithm.oid;

    if oid == RSA_ENCRYPTION {
        return crypto::rsa_private_from_pkcs8(der).map(KeyMaterial::Rsa);
    }
    if oid == EC_PUBLIC_KEY {
        let curve = curve_from_oid(info.algorithm.parameters_oid().ok())?;
        return crypto::ec_private_from_pkcs8(curve, der).map(KeyMaterial::Ec);
    }
    Err(ConvertError::UnsupportedAlgorithm { algorithm: algorithm_name(&oid) })
}
