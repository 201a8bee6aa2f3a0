//! # `jwkit`
//!
//! JSON Web Key management: generation, validation, password-based
//! encryption and conversion from certificates and PEM keys.
//!
//! ## Features
//!
//! - `oct`, `RSA` and `EC` (P-256, P-384, P-521) key generation
//! - Structural and cryptographic JWK validation
//! - PBES2-HS256+A128KW / A128CBC-HS256 compact JWE envelopes
//! - X.509, PKCS#12 and PEM key conversion with RFC 7638 thumbprint key ids
//!
//! ## Example
//!
//! ```rust
//! use jwkit::prelude::*;
//! use secrecy::{ExposeSecret, SecretString};
//!
//! let jwk = generate(KeySpec::Ec { curve: Curve::P256 }, &KeyAttributes::default())?;
//! let password = SecretString::new("correct horse".to_string());
//!
//! let envelope = wrap(&jwk.to_json(), &DerivationParameters::new(password.clone()))?;
//! let plaintext = unwrap(envelope.as_str(), &password)?;
//! assert_eq!(Jwk::from_json(plaintext.expose_secret().as_bytes())?, jwk);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod console;
pub mod convert;
pub mod envelope;
pub mod error;
pub mod generate;
pub mod header;
pub mod jwk;
pub mod kdf;
pub mod pipeline;
pub mod store;
pub mod validate;

pub(crate) mod algorithm;
pub(crate) mod crypto;
pub(crate) mod encoding;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::console::{Console, MemoryConsole, OutputOptions};
    pub use crate::convert::{from_certificate, from_container, from_pem, CertificateContainer};
    pub use crate::envelope::{unwrap, wrap, DerivationParameters, Envelope};
    pub use crate::error::{CheckError, ConvertError, DecryptError, Error, StoreError};
    pub use crate::generate::{generate, KeyAttributes, KeySpec, KidPolicy};
    pub use crate::jwk::{Curve, Jwk, KeyMaterial, KeyOperation, KeyUse};
    pub use crate::pipeline::{run, Command, KeySource, OutputTarget};
    pub use crate::store::{MemoryStore, Store};
    pub use crate::validate::check;
}
