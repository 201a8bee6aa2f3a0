use super::{algorithm_name, private_key_from_pkcs8, public_key_from_spki};
use crate::encoding::{b64_encode, b64url_encode};
use crate::error::ConvertError;
use crate::jwk::{Jwk, KeyMaterial};
use p12_keystore::{KeyStore, KeyStoreEntry};
use secrecy::{ExposeSecret, SecretString, SecretVec};
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

/// A certificate, its chain and an optional PKCS#8 private key.
///
/// Built from DER or PEM certificates, or from PKCS#12 bundles.
pub struct CertificateContainer {
    certificate: Vec<u8>,
    chain: Vec<Vec<u8>>,
    private_key: Option<SecretVec<u8>>,
}

impl CertificateContainer {
    /// Reads a DER certificate, a PEM `CERTIFICATE` block or a PKCS#12 bundle.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The container contents
    /// * `password` - Password of a PKCS#12 bundle; ignored for certificates
    ///
    /// # Errors
    ///
    /// Returns `ConvertError::MalformedCertificate` if the bytes are none of the
    /// supported formats or the bundle password is wrong.
    pub fn from_bytes(bytes: &[u8], password: Option<&SecretString>) -> Result<Self, ConvertError> {
        if is_pem(bytes) {
            let block = ::pem::parse(bytes)
                .map_err(|err| ConvertError::MalformedCertificate(err.to_string()))?;
            if block.tag() != "CERTIFICATE" {
                return Err(ConvertError::MalformedCertificate(format!(
                    "expected a CERTIFICATE PEM block, found '{}'",
                    block.tag()
                )));
            }
            return Self::from_der(block.into_contents());
        }

        if Certificate::from_der(bytes).is_ok() {
            return Ok(Self { certificate: bytes.to_vec(), chain: Vec::new(), private_key: None });
        }

        Self::from_pkcs12(bytes, password)
    }

    /// Wraps a DER certificate without a private key.
    ///
    /// # Errors
    ///
    /// Returns `ConvertError::MalformedCertificate` if the DER is not a certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self, ConvertError> {
        Certificate::from_der(&der)
            .map_err(|err| ConvertError::MalformedCertificate(err.to_string()))?;
        Ok(Self { certificate: der, chain: Vec::new(), private_key: None })
    }

    fn from_pkcs12(bytes: &[u8], password: Option<&SecretString>) -> Result<Self, ConvertError> {
        let password = password.map_or("", |password| password.expose_secret().as_str());
        let keystore = KeyStore::from_pkcs12(bytes, password).map_err(|err| {
            ConvertError::MalformedCertificate(format!(
                "not a certificate or a readable PKCS#12 bundle: {err}"
            ))
        })?;

        // A key chain wins over loose certificates
        for (alias, entry) in keystore.entries() {
            if let KeyStoreEntry::PrivateKeyChain(chain) = entry {
                let Some((leaf, rest)) = chain.chain().split_first() else {
                    continue;
                };
                debug!(alias = %alias, "using PKCS#12 key chain");
                return Ok(Self {
                    certificate: leaf.as_der().to_vec(),
                    chain: rest.iter().map(|cert| cert.as_der().to_vec()).collect(),
                    private_key: Some(SecretVec::new(chain.key().to_vec())),
                });
            }
        }
        for (alias, entry) in keystore.entries() {
            if let KeyStoreEntry::Certificate(cert) = entry {
                debug!(alias = %alias, "using PKCS#12 certificate without a key");
                return Ok(Self {
                    certificate: cert.as_der().to_vec(),
                    chain: Vec::new(),
                    private_key: None,
                });
            }
        }

        Err(ConvertError::MalformedCertificate("the PKCS#12 bundle holds no certificate".to_string()))
    }

    /// Returns `true` if the container carries a private key.
    #[must_use]
    pub const fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }
}

fn is_pem(bytes: &[u8]) -> bool {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN")
}

/// Converts a certificate container read from bytes.
///
/// # Errors
///
/// See [`CertificateContainer::from_bytes`] and [`from_container`].
pub fn from_certificate(bytes: &[u8], password: Option<&SecretString>) -> Result<Jwk, ConvertError> {
    from_container(&CertificateContainer::from_bytes(bytes, password)?)
}

/// Converts a certificate container into a JWK.
///
/// The private key is used when present and readable; otherwise the
/// certificate's public key is used.
///
/// # Errors
///
/// Returns `ConvertError::UnsupportedAlgorithm` for keys without a JWK mapping,
/// `ConvertError::KeyMismatch` if the bundled key does not belong to the
/// certificate, and `ConvertError::NoUsableKey` if no key can be extracted.
pub fn from_container(container: &CertificateContainer) -> Result<Jwk, ConvertError> {
    let certificate = Certificate::from_der(&container.certificate)
        .map_err(|err| ConvertError::MalformedCertificate(err.to_string()))?;
    let spki = &certificate.tbs_certificate.subject_public_key_info;
    let spki_der = spki.to_der().map_err(|err| ConvertError::MalformedCertificate(err.to_string()))?;

    let public = match public_key_from_spki(&spki_der) {
        Ok(public) => Some(public),
        Err(err @ ConvertError::UnsupportedAlgorithm { .. }) => return Err(err),
        Err(err) => {
            debug!(error = %err, "certificate public key is unreadable");
            None
        }
    };

    let private = match &container.private_key {
        Some(key) => match private_key_from_pkcs8(key.expose_secret()) {
            Ok(private) => Some(private),
            Err(err) => {
                debug!(error = %err, "bundled private key is unreadable");
                None
            }
        },
        None => None,
    };

    let material: KeyMaterial = match (private, public) {
        (Some(private), Some(public)) if !private.same_public_key(&public) => {
            return Err(ConvertError::KeyMismatch)
        }
        (Some(private), _) => private,
        (None, Some(public)) => public,
        (None, None) => {
            return Err(ConvertError::NoUsableKey { algorithm_hint: algorithm_name(&spki.algorithm.oid) })
        }
    };

    let mut jwk = Jwk::new(material).with_thumbprint_kid();
    jwk.x5c = std::iter::once(&container.certificate)
        .chain(&container.chain)
        .map(b64_encode)
        .collect();
    jwk.x5t_s256 = Some(b64url_encode(Sha256::digest(&container.certificate)));
    Ok(jwk)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_CERT_PEM: &[u8] = include_bytes!("../../tests/fixtures/rsa_cert.pem");
    const RSA_CERT_DER: &[u8] = include_bytes!("../../tests/fixtures/rsa_cert.der");
    const EC_CERT_PEM: &[u8] = include_bytes!("../../tests/fixtures/ec_cert.pem");
    const ED25519_CERT_DER: &[u8] = include_bytes!("../../tests/fixtures/ed25519_cert.der");
    const RSA_BUNDLE: &[u8] = include_bytes!("../../tests/fixtures/rsa_bundle.p12");
    const EC_BUNDLE: &[u8] = include_bytes!("../../tests/fixtures/ec_bundle.p12");
    const BUNDLE_PASSWORD: &str = "P@ssw0rdX";

    fn bundle_password() -> SecretString {
        SecretString::new(BUNDLE_PASSWORD.to_string())
    }

    #[test]
    fn test_der_certificate_yields_public_key() {
        let jwk = from_certificate(RSA_CERT_DER, None).expect("conversion failed");

        assert_eq!(jwk.material.kty(), "RSA");
        assert!(!jwk.material.is_private());
        assert_eq!(jwk.x5c.len(), 1);
        assert_eq!(jwk.x5t_s256.as_deref(), Some("gSySmx83oVH3xpAINk4hke8Y_VPBhmOLS__eVSgCzfc"));
        assert_eq!(jwk.kid, Some(jwk.thumbprint()));
    }

    #[test]
    fn test_pem_and_der_certificates_agree() {
        let from_pem = from_certificate(RSA_CERT_PEM, None).expect("PEM conversion failed");
        let from_der = from_certificate(RSA_CERT_DER, None).expect("DER conversion failed");
        assert_eq!(from_pem, from_der);
    }

    #[test]
    fn test_ec_certificate() {
        let jwk = from_certificate(EC_CERT_PEM, None).expect("conversion failed");
        assert_eq!(jwk.material.kty(), "EC");
        crate::validate::validate(&jwk).expect("converted key validates");
    }

    #[test]
    fn test_unsupported_certificate_algorithm() {
        let err = from_certificate(ED25519_CERT_DER, None).unwrap_err();
        assert_eq!(err, ConvertError::UnsupportedAlgorithm { algorithm: "Ed25519".to_string() });
    }

    #[test]
    fn test_pkcs12_bundle_yields_private_key() {
        let container = CertificateContainer::from_bytes(RSA_BUNDLE, Some(&bundle_password()))
            .expect("bundle should open");
        assert!(container.has_private_key());

        let jwk = from_container(&container).expect("conversion failed");
        assert!(jwk.material.is_private());
        assert_eq!(jwk.kid.as_deref(), Some("VwagBTFpuzqNuRDc0MUKmUbnp1tz0JPzB-AVTu28N3A"));
        crate::validate::validate(&jwk).expect("converted key validates");
    }

    #[test]
    fn test_pkcs12_ec_bundle() {
        let jwk = from_certificate(EC_BUNDLE, Some(&bundle_password())).expect("conversion failed");
        assert!(jwk.material.is_private());
        assert_eq!(jwk.kid.as_deref(), Some("G_3KOQ8DNUqnzsTHRp57IfekuaQTZnh5dlWMw7TycJo"));
    }

    #[test]
    fn test_pkcs12_wrong_password() {
        let wrong = SecretString::new("nope".to_string());
        let err = CertificateContainer::from_bytes(RSA_BUNDLE, Some(&wrong)).err();
        assert!(matches!(err, Some(ConvertError::MalformedCertificate(_))));
    }

    #[test]
    fn test_garbage_is_not_a_certificate() {
        let err = CertificateContainer::from_bytes(b"hello", None).err();
        assert!(matches!(err, Some(ConvertError::MalformedCertificate(_))));
    }
}
