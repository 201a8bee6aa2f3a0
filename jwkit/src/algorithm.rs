//! JWA algorithm identifiers and the key shapes they accept.

use crate::jwk::{Curve, KeyUse};

/// Key requirements of an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyShape {
    /// HMAC with a key of at least `min_bits`
    Hmac { min_bits: usize },
    /// Symmetric cipher with a key of exactly `bits`
    Symmetric { bits: usize },
    /// Direct use of a symmetric key of any size
    Direct,
    /// Any RSA key
    Rsa,
    /// EC key on the given curve
    Ec(Curve),
    /// EC key on any supported curve
    AnyEc,
}

/// A registered algorithm.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Algorithm {
    pub name: &'static str,
    pub shape: KeyShape,
    pub key_use: KeyUse,
}

const fn sig(name: &'static str, shape: KeyShape) -> Algorithm {
    Algorithm { name, shape, key_use: KeyUse::Signature }
}

const fn enc(name: &'static str, shape: KeyShape) -> Algorithm {
    Algorithm { name, shape, key_use: KeyUse::Encryption }
}

const ALGORITHMS: &[Algorithm] = &[
    sig("HS256", KeyShape::Hmac { min_bits: 256 }),
    sig("HS384", KeyShape::Hmac { min_bits: 384 }),
    sig("HS512", KeyShape::Hmac { min_bits: 512 }),
    sig("RS256", KeyShape::Rsa),
    sig("RS384", KeyShape::Rsa),
    sig("RS512", KeyShape::Rsa),
    sig("PS256", KeyShape::Rsa),
    sig("PS384", KeyShape::Rsa),
    sig("PS512", KeyShape::Rsa),
    sig("ES256", KeyShape::Ec(Curve::P256)),
    sig("ES384", KeyShape::Ec(Curve::P384)),
    sig("ES512", KeyShape::Ec(Curve::P521)),
    enc("A128KW", KeyShape::Symmetric { bits: 128 }),
    enc("A192KW", KeyShape::Symmetric { bits: 192 }),
    enc("A256KW", KeyShape::Symmetric { bits: 256 }),
    enc("A128GCMKW", KeyShape::Symmetric { bits: 128 }),
    enc("A192GCMKW", KeyShape::Symmetric { bits: 192 }),
    enc("A256GCMKW", KeyShape::Symmetric { bits: 256 }),
    enc("A128GCM", KeyShape::Symmetric { bits: 128 }),
    enc("A192GCM", KeyShape::Symmetric { bits: 192 }),
    enc("A256GCM", KeyShape::Symmetric { bits: 256 }),
    enc("A128CBC-HS256", KeyShape::Symmetric { bits: 256 }),
    enc("A192CBC-HS384", KeyShape::Symmetric { bits: 384 }),
    enc("A256CBC-HS512", KeyShape::Symmetric { bits: 512 }),
    enc("dir", KeyShape::Direct),
    enc("RSA1_5", KeyShape::Rsa),
    enc("RSA-OAEP", KeyShape::Rsa),
    enc("RSA-OAEP-256", KeyShape::Rsa),
    enc("RSA-OAEP-384", KeyShape::Rsa),
    enc("RSA-OAEP-512", KeyShape::Rsa),
    enc("ECDH-ES", KeyShape::AnyEc),
    enc("ECDH-ES+A128KW", KeyShape::AnyEc),
    enc("ECDH-ES+A192KW", KeyShape::AnyEc),
    enc("ECDH-ES+A256KW", KeyShape::AnyEc),
];

/// Looks up a registered algorithm by name.
pub(crate) fn lookup(name: &str) -> Option<&'static Algorithm> {
    ALGORITHMS.iter().find(|algorithm| algorithm.name == name)
}

impl Algorithm {
    /// Natural key size for symmetric algorithms, in bits.
    pub(crate) const fn symmetric_bits(&self) -> Option<usize> {
        match self.shape {
            KeyShape::Hmac { min_bits } => Some(min_bits),
            KeyShape::Symmetric { bits } => Some(bits),
            _ => None,
        }
    }

    /// The `kty` this algorithm applies to.
    pub(crate) const fn kty(&self) -> &'static str {
        match self.shape {
            KeyShape::Hmac { .. } | KeyShape::Symmetric { .. } | KeyShape::Direct => "oct",
            KeyShape::Rsa => "RSA",
            KeyShape::Ec(_) | KeyShape::AnyEc => "EC",
        }
    }
}
