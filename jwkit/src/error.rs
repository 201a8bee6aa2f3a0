//! Error types for `jwkit` operations.

use std::fmt;
use std::path::PathBuf;

/// Main error type returned by the command pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input could not be read or has an unsupported encoding
    #[error("invalid input: {0}")]
    Input(String),

    /// The key document is malformed or fails validation
    #[error(transparent)]
    Check(#[from] CheckError),

    /// The envelope could not be decrypted.
    ///
    /// Malformed envelopes and failed authentication share one message so the
    /// diagnostic does not reveal which check failed.
    #[error("failed to decrypt the key: wrong password or corrupted envelope")]
    Decryption {
        /// The underlying failure kind, kept for programmatic inspection
        kind: DecryptError,
    },

    /// A certificate or PEM key could not be converted
    #[error(transparent)]
    Conversion(#[from] ConvertError),

    /// The destination already exists and overwriting was not requested
    #[error("file {} already exists, use --force to overwrite it", .0.display())]
    OutputConflict(PathBuf),

    /// Invalid generation or derivation parameters
    #[error("invalid parameters: {0}")]
    Parameters(String),

    /// I/O operation failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The path being accessed
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },
}

impl From<DecryptError> for Error {
    fn from(kind: DecryptError) -> Self {
        Self::Decryption { kind }
    }
}

impl From<EnvelopeError> for Error {
    fn from(err: EnvelopeError) -> Self {
        Self::Parameters(err.to_string())
    }
}

impl From<GenerateError> for Error {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::Invalid(check) => Self::Check(check),
            other => Self::Parameters(other.to_string()),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => {
                Self::Input(format!("file {} does not exist", path.display()))
            }
            StoreError::AlreadyExists(path) => Self::OutputConflict(path),
            StoreError::InvalidEncoding(path) => {
                Self::Input(format!("file {} is not valid UTF-8", path.display()))
            }
            StoreError::Certificate(err) => Self::Conversion(err),
            StoreError::Io { path, source } => Self::Io { path, source },
        }
    }
}

/// Errors reported when checking a JWK document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// The document is not a well-formed JSON object of the expected shape
    #[error("malformed JSON object: {message}")]
    MalformedDocument {
        /// JSON path of the offending member, when known
        path: Option<String>,
        /// 1-based line reported by the parser
        line: Option<usize>,
        /// 1-based column reported by the parser
        column: Option<usize>,
        /// Parser message
        message: String,
    },

    /// The document parses but does not describe a valid key
    #[error("{}", describe_member(.member.as_deref(), .reason))]
    ValidationFailure {
        /// Name of the offending member, when the failure concerns one
        member: Option<String>,
        /// Why the key was rejected
        reason: String,
    },
}

impl CheckError {
    pub(crate) fn invalid(member: &str, reason: impl Into<String>) -> Self {
        Self::ValidationFailure { member: Some(member.to_string()), reason: reason.into() }
    }

    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        Self::ValidationFailure { member: None, reason: reason.into() }
    }

    pub(crate) fn malformed_at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            path: Some(path.into()),
            line: None,
            column: None,
            message: message.into(),
        }
    }
}

fn describe_member(member: Option<&str>, reason: &str) -> String {
    match member {
        Some(member) => format!("invalid '{member}' member: {reason}"),
        None => format!("invalid key: {reason}"),
    }
}

/// Errors raised while producing an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Derivation parameters are out of range
    #[error("{0}")]
    InvalidParameters(String),

    /// The content or key encryption failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Errors raised while opening an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecryptError {
    /// The envelope structure cannot be parsed or uses unsupported parameters
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Integrity check failed (wrong password or corrupted data)
    #[error("authentication failed: wrong password or corrupted envelope")]
    AuthenticationFailed,
}

/// Errors raised when converting certificates or PEM keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// Neither a private nor a public key could be extracted
    #[error("unable to find a key in the certificate, the certificate is for the algorithm '{algorithm_hint}'")]
    NoUsableKey {
        /// Friendly name of the certificate's declared key algorithm
        algorithm_hint: String,
    },

    /// The key algorithm has no JWK mapping supported here
    #[error("unsupported key algorithm '{algorithm}'")]
    UnsupportedAlgorithm {
        /// Friendly name or dotted OID of the algorithm
        algorithm: String,
    },

    /// The PEM text is structurally invalid or has an unsupported label
    #[error("malformed PEM: {0}")]
    MalformedPem(String),

    /// The input is neither a DER/PEM certificate nor a readable PKCS#12 bundle
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    /// The encoded key material could not be decoded
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The private key in a bundle does not belong to its certificate
    #[error("the private key does not match the certificate public key")]
    KeyMismatch,
}

/// Errors raised by key generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Requested key length is not supported for the key type
    #[error("unsupported key length {length} bits for {kty} keys ({expected})")]
    InvalidLength {
        /// Key type being generated
        kty: &'static str,
        /// Requested length in bits
        length: usize,
        /// Accepted lengths
        expected: &'static str,
    },

    /// Requested curve is not supported
    #[error("unsupported curve '{0}'")]
    UnsupportedCurve(String),

    /// The underlying generator failed
    #[error("key generation failed: {0}")]
    Failed(String),

    /// The generated key does not satisfy the requested attributes
    #[error(transparent)]
    Invalid(#[from] CheckError),
}

/// Errors specific to store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Input path does not exist
    NotFound(PathBuf),

    /// Output path exists and overwriting was not requested
    AlreadyExists(PathBuf),

    /// Input file is not UTF-8 text
    InvalidEncoding(PathBuf),

    /// Certificate container could not be read
    Certificate(ConvertError),

    /// I/O operation failed
    Io {
        /// The path being accessed
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::AlreadyExists(path) => write!(f, "file already exists: {}", path.display()),
            Self::InvalidEncoding(path) => write!(f, "file is not UTF-8: {}", path.display()),
            Self::Certificate(err) => write!(f, "certificate error: {err}"),
            Self::Io { path, source } => write!(f, "I/O error on {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Certificate(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConvertError> for StoreError {
    fn from(err: ConvertError) -> Self {
        Self::Certificate(err)
    }
}
