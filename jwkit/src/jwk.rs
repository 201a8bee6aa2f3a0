//! JSON Web Key model (RFC 7517 / RFC 7518).
//!
//! A [`Jwk`] pairs typed [`KeyMaterial`] with the optional key metadata
//! members (`kid`, `use`, `key_ops`, `alg`, `x5c`, `x5t#S256`). Secret
//! parameters are held in [`SecretBytes`], which is wiped on drop and never
//! printed by `Debug`.

use crate::encoding::{b64url_decode, b64url_encode};
use crate::error::CheckError;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Secret octets, zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    /// Wraps the given octets.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Returns the secret octets.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Returns the number of octets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when there are no octets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.len())
    }
}

/// Elliptic curves supported for `EC` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    /// NIST P-256 (secp256r1)
    P256,
    /// NIST P-384 (secp384r1)
    P384,
    /// NIST P-521 (secp521r1)
    P521,
}

impl Curve {
    /// Returns the JWK `crv` name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Returns the size in octets of a coordinate or private scalar.
    #[must_use]
    pub const fn coordinate_size(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    /// Looks up a curve by its JWK `crv` name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Self::P256),
            "P-384" => Some(Self::P384),
            "P-521" => Some(Self::P521),
            _ => None,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Curve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unsupported curve '{s}'"))
    }
}

/// Intended use of a public key (`use` member).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUse {
    /// `sig`
    Signature,
    /// `enc`
    Encryption,
}

impl KeyUse {
    /// Returns the JWK member value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signature => "sig",
            Self::Encryption => "enc",
        }
    }
}

impl fmt::Display for KeyUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyUse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sig" => Ok(Self::Signature),
            "enc" => Ok(Self::Encryption),
            other => Err(format!("unknown key use '{other}'")),
        }
    }
}

/// Permitted key operation (`key_ops` member).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOperation {
    /// `sign`
    Sign,
    /// `verify`
    Verify,
    /// `encrypt`
    Encrypt,
    /// `decrypt`
    Decrypt,
    /// `wrapKey`
    WrapKey,
    /// `unwrapKey`
    UnwrapKey,
    /// `deriveKey`
    DeriveKey,
    /// `deriveBits`
    DeriveBits,
}

impl KeyOperation {
    /// Returns the JWK member value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
            Self::DeriveKey => "deriveKey",
            Self::DeriveBits => "deriveBits",
        }
    }

    /// Returns the key use this operation belongs to.
    #[must_use]
    pub const fn key_use(self) -> KeyUse {
        match self {
            Self::Sign | Self::Verify => KeyUse::Signature,
            _ => KeyUse::Encryption,
        }
    }

    /// Returns `true` for operations that only need the public key.
    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Verify | Self::Encrypt | Self::WrapKey)
    }
}

impl fmt::Display for KeyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign" => Ok(Self::Sign),
            "verify" => Ok(Self::Verify),
            "encrypt" => Ok(Self::Encrypt),
            "decrypt" => Ok(Self::Decrypt),
            "wrapKey" => Ok(Self::WrapKey),
            "unwrapKey" => Ok(Self::UnwrapKey),
            "deriveKey" => Ok(Self::DeriveKey),
            "deriveBits" => Ok(Self::DeriveBits),
            other => Err(format!("unknown key operation '{other}'")),
        }
    }
}

/// Symmetric (`oct`) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricKey {
    /// Key value
    pub k: SecretBytes,
}

impl SymmetricKey {
    /// Returns the key size in bits.
    #[must_use]
    pub fn size_bits(&self) -> usize {
        self.k.len() * 8
    }
}

/// Chinese remainder theorem parameters of a two-prime RSA key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPrimes {
    /// First prime factor
    pub p: SecretBytes,
    /// Second prime factor
    pub q: SecretBytes,
    /// First factor CRT exponent
    pub dp: SecretBytes,
    /// Second factor CRT exponent
    pub dq: SecretBytes,
    /// First CRT coefficient
    pub qi: SecretBytes,
}

/// Private half of an RSA key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPrivateParts {
    /// Private exponent
    pub d: SecretBytes,
    /// CRT parameters, when present
    pub primes: Option<RsaPrimes>,
}

/// RSA key, public or private.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKey {
    /// Modulus, big-endian without leading zero octets
    pub n: Vec<u8>,
    /// Public exponent, big-endian
    pub e: Vec<u8>,
    /// Private parameters
    pub private: Option<RsaPrivateParts>,
}

impl RsaKey {
    /// Returns the modulus size in bits.
    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        let n = strip_leading_zeros(&self.n);
        n.first().map_or(0, |first| n.len() * 8 - first.leading_zeros() as usize)
    }
}

/// Elliptic curve key, public or private.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcKey {
    /// Curve the point lies on
    pub curve: Curve,
    /// X coordinate, fixed width
    pub x: Vec<u8>,
    /// Y coordinate, fixed width
    pub y: Vec<u8>,
    /// Private scalar, fixed width
    pub d: Option<SecretBytes>,
}

/// Key material of a JWK, one variant per supported `kty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// `oct`
    Symmetric(SymmetricKey),
    /// `RSA`
    Rsa(RsaKey),
    /// `EC`
    Ec(EcKey),
}

impl KeyMaterial {
    /// Returns the JWK `kty` value.
    #[must_use]
    pub const fn kty(&self) -> &'static str {
        match self {
            Self::Symmetric(_) => "oct",
            Self::Rsa(_) => "RSA",
            Self::Ec(_) => "EC",
        }
    }

    /// Returns `true` if the material holds secret parameters.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        match self {
            Self::Symmetric(_) => true,
            Self::Rsa(key) => key.private.is_some(),
            Self::Ec(key) => key.d.is_some(),
        }
    }

    /// Returns the public half, or `None` for symmetric keys.
    #[must_use]
    pub fn to_public(&self) -> Option<Self> {
        match self {
            Self::Symmetric(_) => None,
            Self::Rsa(key) => {
                Some(Self::Rsa(RsaKey { n: key.n.clone(), e: key.e.clone(), private: None }))
            }
            Self::Ec(key) => Some(Self::Ec(EcKey {
                curve: key.curve,
                x: key.x.clone(),
                y: key.y.clone(),
                d: None,
            })),
        }
    }

    /// Returns `true` if both values carry the same public key.
    ///
    /// Symmetric keys never compare equal here.
    #[must_use]
    pub fn same_public_key(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Rsa(a), Self::Rsa(b)) => {
                strip_leading_zeros(&a.n) == strip_leading_zeros(&b.n)
                    && strip_leading_zeros(&a.e) == strip_leading_zeros(&b.e)
            }
            (Self::Ec(a), Self::Ec(b)) => a.curve == b.curve && a.x == b.x && a.y == b.y,
            _ => false,
        }
    }

    /// Computes the RFC 7638 thumbprint (SHA-256, base64url).
    #[must_use]
    pub fn thumbprint(&self) -> String {
        let mut required: BTreeMap<&str, String> = BTreeMap::new();
        required.insert("kty", self.kty().to_string());
        match self {
            Self::Symmetric(key) => {
                required.insert("k", b64url_encode(key.k.expose()));
            }
            Self::Rsa(key) => {
                required.insert("n", b64url_encode(&key.n));
                required.insert("e", b64url_encode(&key.e));
            }
            Self::Ec(key) => {
                required.insert("crv", key.curve.name().to_string());
                required.insert("x", b64url_encode(&key.x));
                required.insert("y", b64url_encode(&key.y));
            }
        }

        // A map of strings always serializes.
        let canonical = Zeroizing::new(serde_json::to_vec(&required).unwrap_or_default());
        if let Some(k) = required.get_mut("k") {
            k.zeroize();
        }
        b64url_encode(Sha256::digest(&*canonical))
    }
}

/// A JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jwk {
    /// Key material
    pub material: KeyMaterial,
    /// Key identifier
    pub kid: Option<String>,
    /// Intended algorithm
    pub alg: Option<String>,
    /// Intended use
    pub key_use: Option<KeyUse>,
    /// Permitted operations, empty when absent
    pub key_ops: Vec<KeyOperation>,
    /// Certificate chain, standard base64 DER, leaf first
    pub x5c: Vec<String>,
    /// SHA-256 thumbprint of the leaf certificate
    pub x5t_s256: Option<String>,
}

impl Jwk {
    /// Creates a key with no metadata members.
    #[must_use]
    pub fn new(material: KeyMaterial) -> Self {
        Self {
            material,
            kid: None,
            alg: None,
            key_use: None,
            key_ops: Vec::new(),
            x5c: Vec::new(),
            x5t_s256: None,
        }
    }

    /// Sets the key identifier.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Sets the key identifier to the RFC 7638 thumbprint.
    #[must_use]
    pub fn with_thumbprint_kid(mut self) -> Self {
        self.kid = Some(self.thumbprint());
        self
    }

    /// Sets the intended algorithm.
    #[must_use]
    pub fn with_alg(mut self, alg: impl Into<String>) -> Self {
        self.alg = Some(alg.into());
        self
    }

    /// Sets the intended use.
    #[must_use]
    pub fn with_use(mut self, key_use: KeyUse) -> Self {
        self.key_use = Some(key_use);
        self
    }

    /// Sets the permitted operations.
    #[must_use]
    pub fn with_key_ops(mut self, key_ops: Vec<KeyOperation>) -> Self {
        self.key_ops = key_ops;
        self
    }

    /// Returns the RFC 7638 thumbprint of the key material.
    #[must_use]
    pub fn thumbprint(&self) -> String {
        self.material.thumbprint()
    }

    /// Returns the public JWK, or `None` for symmetric keys.
    ///
    /// Metadata is kept; `key_ops` is narrowed to the operations a public key
    /// can perform.
    #[must_use]
    pub fn to_public(&self) -> Option<Self> {
        let material = self.material.to_public()?;
        Some(Self {
            material,
            kid: self.kid.clone(),
            alg: self.alg.clone(),
            key_use: self.key_use,
            key_ops: self.key_ops.iter().copied().filter(|op| op.is_public()).collect(),
            x5c: self.x5c.clone(),
            x5t_s256: self.x5t_s256.clone(),
        })
    }

    /// Serializes the key as compact JSON.
    ///
    /// The text contains secret parameters for private keys and is wiped when
    /// dropped.
    #[must_use]
    pub fn to_json(&self) -> Zeroizing<String> {
        let members = JwkMembers::from_jwk(self);
        // Members are plain strings; serialization cannot fail.
        Zeroizing::new(serde_json::to_string(&members).unwrap_or_default())
    }

    /// Parses and validates a JWK document.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::MalformedDocument` if the text is not a JSON object
    /// of the expected shape, or `CheckError::ValidationFailure` if it does not
    /// describe a consistent key.
    ///
    /// # Example
    ///
    /// ```
    /// use jwkit::jwk::Jwk;
    ///
    /// let jwk = Jwk::from_json(br#"{"kty":"oct","k":"AAECAwQFBgcICQoLDA0ODw"}"#)
    ///     .expect("valid key");
    /// assert_eq!(jwk.material.kty(), "oct");
    /// ```
    pub fn from_json(document: &[u8]) -> Result<Self, CheckError> {
        let jwk = Self::parse(document)?;
        crate::validate::validate(&jwk)?;
        Ok(jwk)
    }

    /// Parses the document into the typed model without consistency checks.
    pub(crate) fn parse(document: &[u8]) -> Result<Self, CheckError> {
        let mut members = JwkMembers::parse(document)?;
        members.into_jwk()
    }
}

/// Wire form of a JWK; field order is the output member order.
#[derive(Default, Serialize, Zeroize, ZeroizeOnDrop)]
struct JwkMembers {
    #[serde(skip_serializing_if = "Option::is_none")]
    kty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    key_use: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_ops: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    qi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    k: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x5c: Option<Vec<String>>,
    #[serde(rename = "x5t#S256", skip_serializing_if = "Option::is_none")]
    x5t_s256: Option<String>,
    #[serde(skip)]
    other_primes: bool,
}

/// Members describing key material, checked against `kty`.
const KEY_PARAMETERS: [&str; 12] = ["crv", "x", "y", "n", "e", "d", "p", "q", "dp", "dq", "qi", "k"];

impl JwkMembers {
    fn parse(document: &[u8]) -> Result<Self, CheckError> {
        let value: Value = serde_json::from_slice(document).map_err(|err| syntax_error(&err))?;
        let Value::Object(mut object) = value else {
            return Err(CheckError::malformed_at("$", "expected a JSON object"));
        };

        let mut members = Self::default();
        members.other_primes = object.remove("oth").is_some();
        members.kty = take_string(&mut object, "kty")?;
        members.kid = take_string(&mut object, "kid")?;
        members.key_use = take_string(&mut object, "use")?;
        members.key_ops = take_string_array(&mut object, "key_ops")?;
        members.alg = take_string(&mut object, "alg")?;
        members.crv = take_string(&mut object, "crv")?;
        members.x = take_string(&mut object, "x")?;
        members.y = take_string(&mut object, "y")?;
        members.n = take_string(&mut object, "n")?;
        members.e = take_string(&mut object, "e")?;
        members.d = take_string(&mut object, "d")?;
        members.p = take_string(&mut object, "p")?;
        members.q = take_string(&mut object, "q")?;
        members.dp = take_string(&mut object, "dp")?;
        members.dq = take_string(&mut object, "dq")?;
        members.qi = take_string(&mut object, "qi")?;
        members.k = take_string(&mut object, "k")?;
        members.x5c = take_string_array(&mut object, "x5c")?;
        members.x5t_s256 = take_string(&mut object, "x5t#S256")?;
        Ok(members)
    }

    fn parameter(&self, name: &str) -> Option<&String> {
        match name {
            "crv" => self.crv.as_ref(),
            "x" => self.x.as_ref(),
            "y" => self.y.as_ref(),
            "n" => self.n.as_ref(),
            "e" => self.e.as_ref(),
            "d" => self.d.as_ref(),
            "p" => self.p.as_ref(),
            "q" => self.q.as_ref(),
            "dp" => self.dp.as_ref(),
            "dq" => self.dq.as_ref(),
            "qi" => self.qi.as_ref(),
            "k" => self.k.as_ref(),
            _ => None,
        }
    }

    fn reject_foreign(&self, kty: &str, allowed: &[&str]) -> Result<(), CheckError> {
        let foreign = KEY_PARAMETERS
            .iter()
            .copied()
            .find(|name| !allowed.contains(name) && self.parameter(name).is_some());
        match foreign {
            Some(name) => Err(CheckError::invalid(name, format!("not allowed for kty '{kty}'"))),
            None => Ok(()),
        }
    }

    fn into_jwk(&mut self) -> Result<Jwk, CheckError> {
        let kty = self.kty.take().ok_or_else(|| CheckError::invalid("kty", "member is required"))?;
        let material = match kty.as_str() {
            "oct" => {
                self.reject_foreign("oct", &["k"])?;
                let k = required_secret(&mut self.k, "k")?;
                if k.is_empty() {
                    return Err(CheckError::invalid("k", "key value must not be empty"));
                }
                KeyMaterial::Symmetric(SymmetricKey { k })
            }
            "RSA" => {
                self.reject_foreign("RSA", &["n", "e", "d", "p", "q", "dp", "dq", "qi"])?;
                KeyMaterial::Rsa(self.take_rsa()?)
            }
            "EC" => {
                self.reject_foreign("EC", &["crv", "x", "y", "d"])?;
                KeyMaterial::Ec(self.take_ec()?)
            }
            other => {
                return Err(CheckError::invalid("kty", format!("unsupported key type '{other}'")))
            }
        };

        let key_use = self
            .key_use
            .take()
            .map(|value| value.parse::<KeyUse>().map_err(|err| CheckError::invalid("use", err)))
            .transpose()?;

        let mut key_ops: Vec<KeyOperation> = Vec::new();
        for value in self.key_ops.take().unwrap_or_default() {
            let op = value.parse::<KeyOperation>().map_err(|err| CheckError::invalid("key_ops", err))?;
            if key_ops.contains(&op) {
                return Err(CheckError::invalid("key_ops", format!("duplicate operation '{op}'")));
            }
            key_ops.push(op);
        }

        Ok(Jwk {
            material,
            kid: self.kid.take(),
            alg: self.alg.take(),
            key_use,
            key_ops,
            x5c: self.x5c.take().unwrap_or_default(),
            x5t_s256: self.x5t_s256.take(),
        })
    }

    fn take_rsa(&mut self) -> Result<RsaKey, CheckError> {
        if self.other_primes {
            return Err(CheckError::invalid("oth", "multi-prime RSA keys are not supported"));
        }
        let n = required_public(&mut self.n, "n")?;
        let e = required_public(&mut self.e, "e")?;
        if n.first() == Some(&0) {
            return Err(CheckError::invalid("n", "must not have leading zero octets"));
        }

        let crt_names = ["p", "q", "dp", "dq", "qi"];
        let present = crt_names.iter().filter(|name| self.parameter(name).is_some()).count();
        if present != 0 && present != crt_names.len() {
            let missing = crt_names.iter().find(|name| self.parameter(name).is_none());
            return Err(CheckError::invalid(
                missing.copied().unwrap_or("p"),
                "all CRT parameters must be present together",
            ));
        }

        let private = match optional_secret(&mut self.d, "d")? {
            Some(d) => {
                let primes = if present == 0 {
                    None
                } else {
                    Some(RsaPrimes {
                        p: required_secret(&mut self.p, "p")?,
                        q: required_secret(&mut self.q, "q")?,
                        dp: required_secret(&mut self.dp, "dp")?,
                        dq: required_secret(&mut self.dq, "dq")?,
                        qi: required_secret(&mut self.qi, "qi")?,
                    })
                };
                Some(RsaPrivateParts { d, primes })
            }
            None if present != 0 => {
                return Err(CheckError::invalid("d", "required when CRT parameters are present"))
            }
            None => None,
        };

        Ok(RsaKey { n, e, private })
    }

    fn take_ec(&mut self) -> Result<EcKey, CheckError> {
        let crv = self.crv.take().ok_or_else(|| CheckError::invalid("crv", "member is required"))?;
        let curve = Curve::from_name(&crv)
            .ok_or_else(|| CheckError::invalid("crv", format!("unsupported curve '{crv}'")))?;
        let x = required_public(&mut self.x, "x")?;
        let y = required_public(&mut self.y, "y")?;
        let d = optional_secret(&mut self.d, "d")?;
        Ok(EcKey { curve, x, y, d })
    }

    fn from_jwk(jwk: &Jwk) -> Self {
        let mut members = Self::default();
        members.kty = Some(jwk.material.kty().to_string());
        members.kid = jwk.kid.clone();
        members.key_use = jwk.key_use.map(|key_use| key_use.as_str().to_string());
        members.alg = jwk.alg.clone();
        members.x5t_s256 = jwk.x5t_s256.clone();
        if !jwk.key_ops.is_empty() {
            members.key_ops = Some(jwk.key_ops.iter().map(|op| op.as_str().to_string()).collect());
        }
        if !jwk.x5c.is_empty() {
            members.x5c = Some(jwk.x5c.clone());
        }

        let encode_secret = |secret: &SecretBytes| b64url_encode(secret.expose());
        match &jwk.material {
            KeyMaterial::Symmetric(key) => members.k = Some(encode_secret(&key.k)),
            KeyMaterial::Rsa(key) => {
                members.n = Some(b64url_encode(&key.n));
                members.e = Some(b64url_encode(&key.e));
                if let Some(private) = &key.private {
                    members.d = Some(encode_secret(&private.d));
                    if let Some(primes) = &private.primes {
                        members.p = Some(encode_secret(&primes.p));
                        members.q = Some(encode_secret(&primes.q));
                        members.dp = Some(encode_secret(&primes.dp));
                        members.dq = Some(encode_secret(&primes.dq));
                        members.qi = Some(encode_secret(&primes.qi));
                    }
                }
            }
            KeyMaterial::Ec(key) => {
                members.crv = Some(key.curve.name().to_string());
                members.x = Some(b64url_encode(&key.x));
                members.y = Some(b64url_encode(&key.y));
                members.d = key.d.as_ref().map(encode_secret);
            }
        }
        members
    }
}

pub(crate) fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn syntax_error(err: &serde_json::Error) -> CheckError {
    let position = |value: usize| (value > 0).then_some(value);
    CheckError::MalformedDocument {
        path: None,
        line: position(err.line()),
        column: position(err.column()),
        message: err.to_string(),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn take_string(object: &mut Map<String, Value>, name: &str) -> Result<Option<String>, CheckError> {
    match object.remove(name) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(CheckError::malformed_at(
            format!("$.{name}"),
            format!("expected a string, found {}", describe(&other)),
        )),
    }
}

fn take_string_array(
    object: &mut Map<String, Value>,
    name: &str,
) -> Result<Option<Vec<String>>, CheckError> {
    let items = match object.remove(name) {
        None => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(CheckError::malformed_at(
                format!("$.{name}"),
                format!("expected an array of strings, found {}", describe(&other)),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(value) => Ok(value),
            other => Err(CheckError::malformed_at(
                format!("$.{name}[{index}]"),
                format!("expected a string, found {}", describe(&other)),
            )),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn decode_public(value: &str, name: &str) -> Result<Vec<u8>, CheckError> {
    let bytes = b64url_decode(value)
        .map_err(|err| CheckError::invalid(name, format!("not valid base64url: {err}")))?;
    if bytes.is_empty() {
        return Err(CheckError::invalid(name, "must not be empty"));
    }
    Ok(bytes)
}

fn decode_secret(value: &str, name: &str) -> Result<SecretBytes, CheckError> {
    let bytes = b64url_decode(value)
        .map_err(|_| CheckError::invalid(name, "not valid base64url"))?;
    Ok(SecretBytes::new(bytes))
}

fn required_public(slot: &mut Option<String>, name: &str) -> Result<Vec<u8>, CheckError> {
    let value = slot.take().ok_or_else(|| CheckError::invalid(name, "member is required"))?;
    decode_public(&value, name)
}

fn required_secret(slot: &mut Option<String>, name: &str) -> Result<SecretBytes, CheckError> {
    optional_secret(slot, name)?.ok_or_else(|| CheckError::invalid(name, "member is required"))
}

/// Moves a private member out of `slot`; the encoded text is wiped once decoded.
fn optional_secret(
    slot: &mut Option<String>,
    name: &str,
) -> Result<Option<SecretBytes>, CheckError> {
    slot.take()
        .map(|value| {
            let value = Zeroizing::new(value);
            decode_secret(&value, name)
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EC_JWK: &str = r#"{"kty":"EC","crv":"P-256","x":"_hsr0fWlx3HT84TZ536rbZP6v25ameCp_LxW82Mx9Os","y":"loa7eOl7y12y2Gb7YlOsUTIk3feqGG8PyRN-0iRoI5o","d":"TxLAXDf1JkmKoFrsXuONdZrdo6L-geWw1zhtQ-sQP8M"}"#;

    #[test]
    fn test_parse_symmetric_key() {
        let jwk = Jwk::parse(br#"{"kty":"oct","k":"AAECAwQFBgcICQoLDA0ODw","kid":"a"}"#)
            .expect("parse failed");

        let KeyMaterial::Symmetric(key) = &jwk.material else { panic!("expected oct key") };
        assert_eq!(key.size_bits(), 128);
        assert_eq!(jwk.kid.as_deref(), Some("a"));
    }

    #[test]
    fn test_parse_reports_syntax_position() {
        let err = Jwk::parse(b"{\"kty\": \"oct\",\n  \"k\": }").unwrap_err();
        match err {
            CheckError::MalformedDocument { line, column, path, .. } => {
                assert_eq!(line, Some(2));
                assert!(column.is_some());
                assert!(path.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reports_member_path() {
        let err = Jwk::parse(br#"{"kty":"RSA","n":42,"e":"AQAB"}"#).unwrap_err();
        assert!(matches!(
            err,
            CheckError::MalformedDocument { path: Some(ref path), .. } if path == "$.n"
        ));

        let err = Jwk::parse(br#"{"kty":"oct","k":"AA","key_ops":["sign",7]}"#).unwrap_err();
        assert!(matches!(
            err,
            CheckError::MalformedDocument { path: Some(ref path), .. } if path == "$.key_ops[1]"
        ));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = Jwk::parse(b"[1, 2]").unwrap_err();
        assert!(matches!(
            err,
            CheckError::MalformedDocument { path: Some(ref path), .. } if path == "$"
        ));
    }

    #[test]
    fn test_parse_rejects_foreign_members() {
        let err = Jwk::parse(br#"{"kty":"oct","k":"AAEC","n":"AQAB"}"#).unwrap_err();
        assert_eq!(err, CheckError::invalid("n", "not allowed for kty 'oct'"));
    }

    #[test]
    fn test_parse_rejects_unknown_kty_and_missing_members() {
        let err = Jwk::parse(br#"{"kty":"OKP","crv":"Ed25519","x":"AA"}"#).unwrap_err();
        assert!(matches!(err, CheckError::ValidationFailure { member: Some(ref m), .. } if m == "kty"));

        let err = Jwk::parse(br#"{"kty":"RSA","n":"AQAB"}"#).unwrap_err();
        assert_eq!(err, CheckError::invalid("e", "member is required"));
    }

    #[test]
    fn test_parse_rejects_partial_crt() {
        let err = Jwk::parse(br#"{"kty":"RSA","n":"AQAB","e":"AQAB","d":"AQ","p":"AQ"}"#)
            .unwrap_err();
        assert!(matches!(err, CheckError::ValidationFailure { member: Some(ref m), .. } if m == "q"));
    }

    #[test]
    fn test_parse_rejects_duplicate_key_ops() {
        let err = Jwk::parse(br#"{"kty":"oct","k":"AAEC","key_ops":["sign","sign"]}"#)
            .unwrap_err();
        assert!(matches!(err, CheckError::ValidationFailure { member: Some(ref m), .. } if m == "key_ops"));
    }

    #[test]
    fn test_serialization_member_order() {
        let jwk = Jwk::parse(EC_JWK.as_bytes()).expect("parse failed").with_kid("k1");
        let json = jwk.to_json();

        assert!(json.starts_with(r#"{"kty":"EC","kid":"k1","crv":"P-256","x":"#));
        assert!(json.contains(r#""d":"TxLAXDf1JkmKoFrsXuONdZrdo6L-geWw1zhtQ-sQP8M""#));
    }

    #[test]
    fn test_thumbprint_ec() {
        let jwk = Jwk::parse(EC_JWK.as_bytes()).expect("parse failed");
        assert_eq!(jwk.thumbprint(), "G_3KOQ8DNUqnzsTHRp57IfekuaQTZnh5dlWMw7TycJo");
    }

    #[test]
    fn test_thumbprint_rfc7638_example() {
        // RFC 7638 section 3.1
        let document = br#"{"kty":"RSA","e":"AQAB","n":"0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw"}"#;
        let jwk = Jwk::parse(document).expect("parse failed");
        assert_eq!(jwk.thumbprint(), "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs");
    }

    #[test]
    fn test_to_public_strips_private_members() {
        let jwk = Jwk::parse(EC_JWK.as_bytes())
            .expect("parse failed")
            .with_key_ops(vec![KeyOperation::Sign, KeyOperation::Verify]);

        let public = jwk.to_public().expect("EC key has a public part");
        assert!(!public.material.is_private());
        assert_eq!(public.key_ops, vec![KeyOperation::Verify]);
        assert!(!public.to_json().contains("\"d\""));
        assert_eq!(public.thumbprint(), jwk.thumbprint());
    }

    #[test]
    fn test_symmetric_key_has_no_public_part() {
        let jwk = Jwk::parse(br#"{"kty":"oct","k":"AAEC"}"#).expect("parse failed");
        assert!(jwk.to_public().is_none());
    }

    #[test]
    fn test_secret_bytes_debug_is_redacted() {
        let secret = SecretBytes::new(vec![0xde, 0xad]);
        assert_eq!(format!("{secret:?}"), "SecretBytes([REDACTED; 2])");
    }

    #[test]
    fn test_optional_secret_moves_member_out() {
        let mut slot = Some("AAEC".to_string());
        let secret = optional_secret(&mut slot, "d").expect("decode failed").expect("member present");
        assert_eq!(secret.expose(), &[0, 1, 2]);
        assert!(slot.is_none());

        let mut empty: Option<String> = None;
        assert!(optional_secret(&mut empty, "d").expect("absent member is fine").is_none());
    }

    #[test]
    fn test_optional_secret_clears_slot_on_bad_encoding() {
        let mut slot = Some("not base64url!".to_string());
        let err = optional_secret(&mut slot, "d").unwrap_err();
        assert!(matches!(err, CheckError::ValidationFailure { member: Some(ref m), .. } if m == "d"));
        assert!(slot.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_private_scalar() {
        let document = EC_JWK.replace("TxLAXDf1JkmKoFrsXuONdZrdo6L-geWw1zhtQ-sQP8M", "***");
        let err = Jwk::parse(document.as_bytes()).unwrap_err();
        assert!(matches!(err, CheckError::ValidationFailure { member: Some(ref m), .. } if m == "d"));
    }

    #[test]
    fn test_modulus_bits() {
        let key = RsaKey { n: vec![0x80, 0, 0], e: vec![1, 0, 1], private: None };
        assert_eq!(key.modulus_bits(), 24);
        let key = RsaKey { n: vec![0x01, 0], e: vec![1, 0, 1], private: None };
        assert_eq!(key.modulus_bits(), 9);
    }
}
