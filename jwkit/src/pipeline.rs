//! Command pipeline shared by the CLI and embedders.
//!
//! Each [`Command`] reads its input through a [`Store`], transforms it and
//! writes the result either to the console or to a file. Progress messages
//! go to the console only in verbose mode.

use crate::console::{Console, OutputOptions, Reporter};
use crate::convert;
use crate::envelope::{self, DerivationParameters};
use crate::error::{CheckError, Error};
use crate::generate::{self, KeyAttributes, KeySpec};
use crate::header::{CONTENT_ENCRYPTION_ALGORITHM, KEY_MANAGEMENT_ALGORITHM};
use crate::jwk::Jwk;
use crate::store::Store;
use crate::validate;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Where a command writes its result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTarget {
    /// Destination file; the console when `None`
    pub path: Option<PathBuf>,
    /// Replace existing files
    pub force: bool,
}

impl OutputTarget {
    /// Writes to the console.
    #[must_use]
    pub const fn console() -> Self {
        Self { path: None, force: false }
    }

    /// Writes to a file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>, force: bool) -> Self {
        Self { path: Some(path.into()), force }
    }
}

/// Key text given on the command line or read from a file.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// The key or envelope text itself
    Literal(SecretString),
    /// A file holding the key or envelope
    File(PathBuf),
}

/// Parameters of the `new` command.
#[derive(Debug, Clone)]
pub struct NewParams {
    /// Kind and size of key
    pub spec: KeySpec,
    /// Metadata members
    pub attributes: KeyAttributes,
    /// Encrypt the new key under a password
    pub encryption: Option<DerivationParameters>,
    /// Destination
    pub output: OutputTarget,
}

/// Parameters of the `check` command.
#[derive(Debug, Clone)]
pub struct CheckParams {
    /// JWK file to check
    pub input_path: PathBuf,
}

/// Parameters of the `encrypt` command.
#[derive(Debug, Clone)]
pub struct EncryptParams {
    /// Key to encrypt
    pub source: KeySource,
    /// Password and derivation settings
    pub derivation: DerivationParameters,
    /// Destination
    pub output: OutputTarget,
}

/// Parameters of the `decrypt` command.
#[derive(Debug, Clone)]
pub struct DecryptParams {
    /// Envelope to decrypt
    pub source: KeySource,
    /// Envelope password
    pub password: SecretString,
    /// Destination
    pub output: OutputTarget,
}

/// Parameters shared by the `convert` commands.
#[derive(Debug, Clone)]
pub struct ConvertParams {
    /// Certificate, bundle or PEM file
    pub input_path: PathBuf,
    /// Destination of the converted key
    pub output: OutputTarget,
    /// Also write the public key to this file
    pub public_output_path: Option<PathBuf>,
    /// Encrypt the converted key under a password
    pub encryption: Option<DerivationParameters>,
}

/// Parameters of the `convert X509` command.
#[derive(Debug, Clone)]
pub struct ConvertX509Params {
    /// Password of a PKCS#12 bundle
    pub certificate_password: Option<SecretString>,
    /// Shared conversion settings
    pub convert: ConvertParams,
}

/// A command to run.
#[derive(Debug, Clone)]
pub enum Command {
    /// Generate a key
    New(NewParams),
    /// Validate a key file
    Check(CheckParams),
    /// Encrypt a key under a password
    Encrypt(EncryptParams),
    /// Decrypt a password-protected key
    Decrypt(DecryptParams),
    /// Convert a certificate or PKCS#12 bundle
    ConvertX509(ConvertX509Params),
    /// Convert a PEM key
    ConvertPem(ConvertParams),
}

impl Command {
    /// Short command name, used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::New(_) => "new",
            Self::Check(_) => "check",
            Self::Encrypt(_) => "encrypt",
            Self::Decrypt(_) => "decrypt",
            Self::ConvertX509(_) => "convert X509",
            Self::ConvertPem(_) => "convert PEM",
        }
    }
}

/// Runs a command.
///
/// `check` reports validation results on the console and returns `Ok`; every
/// other failure is returned as an error.
///
/// # Errors
///
/// Returns `Error::Input` for unreadable inputs, `Error::OutputConflict` if a
/// destination exists without `force`, `Error::Decryption` for envelopes that
/// cannot be opened, and the matching variant for generation, conversion and
/// parameter failures.
///
/// # Example
///
/// ```
/// use jwkit::console::{MemoryConsole, OutputOptions};
/// use jwkit::generate::{KeyAttributes, KeySpec};
/// use jwkit::pipeline::{run, Command, NewParams, OutputTarget};
/// use jwkit::store::MemoryStore;
///
/// let command = Command::New(NewParams {
///     spec: KeySpec::Oct { length: Some(256) },
///     attributes: KeyAttributes::default(),
///     encryption: None,
///     output: OutputTarget::console(),
/// });
/// let mut console = MemoryConsole::default();
/// run(command, &MemoryStore::new(), &mut console, OutputOptions::default()).expect("new failed");
/// assert!(console.output[0].starts_with(r#"{"kty":"oct""#));
/// ```
pub fn run<S, C>(
    command: Command,
    store: &S,
    console: &mut C,
    options: OutputOptions,
) -> Result<(), Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    debug!(command = command.name(), "running command");
    let mut reporter = Reporter::new(console, options);
    match command {
        Command::New(params) => run_new(&params, store, &mut reporter),
        Command::Check(params) => run_check(&params, store, &mut reporter),
        Command::Encrypt(params) => run_encrypt(&params, store, &mut reporter),
        Command::Decrypt(params) => run_decrypt(&params, store, &mut reporter),
        Command::ConvertX509(params) => {
            let path = &params.convert.input_path;
            reporter.verbose(format!("Reading X509 certificate from {} file...", path.display()));
            let container = store.load_certificate(path, params.certificate_password.as_ref())?;
            if !container.has_private_key() {
                reporter.verbose("No private key found. Reading X509 public key...");
            }
            let jwk = convert::from_container(&container)?;
            reporter.verbose("X509 certificate successfully read.");
            write_converted(&jwk, &params.convert, store, &mut reporter)
        }
        Command::ConvertPem(params) => {
            let path = &params.input_path;
            reporter.verbose(format!("Reading PEM key from {} file...", path.display()));
            let text = Zeroizing::new(store.read(path)?);
            let jwk = convert::from_pem(&text)?;
            reporter.verbose("PEM key successfully read.");
            write_converted(&jwk, &params, store, &mut reporter)
        }
    }
}

fn run_new<S, C>(params: &NewParams, store: &S, reporter: &mut Reporter<'_, C>) -> Result<(), Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    let jwk = generate::generate(params.spec, &params.attributes)?;
    reporter.verbose(format!("Generated a new {} key.", jwk.material.kty()));
    let text = seal(jwk.to_json(), params.encryption.as_ref(), reporter)?;
    emit(&text, &params.output, store, reporter)
}

fn run_check<S, C>(params: &CheckParams, store: &S, reporter: &mut Reporter<'_, C>) -> Result<(), Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    let path = &params.input_path;
    reporter.verbose(format!("Reading JWK from {} file...", path.display()));
    let document = Zeroizing::new(store.read(path)?);
    reporter.verbose("JWK successfully read.");

    reporter.verbose("Validating the JWK...");
    match validate::check(document.as_bytes()) {
        Ok(()) => {
            info!(path = %path.display(), "key validated");
            reporter.write("JWK Validated.");
        }
        Err(err) => {
            info!(path = %path.display(), error = %err, "key rejected");
            reporter.error("Error:");
            for line in describe_check_error(&err) {
                reporter.error(&line);
            }
        }
    }
    Ok(())
}

fn run_encrypt<S, C>(params: &EncryptParams, store: &S, reporter: &mut Reporter<'_, C>) -> Result<(), Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    let plaintext = read_source(&params.source, store, reporter)?;
    let text = seal(plaintext, Some(&params.derivation), reporter)?;
    emit(&text, &params.output, store, reporter)
}

fn run_decrypt<S, C>(params: &DecryptParams, store: &S, reporter: &mut Reporter<'_, C>) -> Result<(), Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    let envelope = read_source(&params.source, store, reporter)?;
    reporter.verbose("Decrypting the JWK...");
    let plaintext = envelope::unwrap(&envelope, &params.password)?;
    reporter.verbose("JWK decrypted.");
    emit(plaintext.expose_secret(), &params.output, store, reporter)
}

/// Writes the converted key and, when requested, its public half.
///
/// Both destinations are checked before anything is written, so a conflict
/// leaves no partial output.
fn write_converted<S, C>(
    jwk: &Jwk,
    params: &ConvertParams,
    store: &S,
    reporter: &mut Reporter<'_, C>,
) -> Result<(), Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    let public = match &params.public_output_path {
        Some(path) => {
            let public = jwk.to_public().ok_or_else(|| {
                Error::Parameters("symmetric keys have no public part".to_string())
            })?;
            Some((path, public.to_json()))
        }
        None => None,
    };

    if !params.output.force {
        let destinations = params.output.path.iter().chain(public.as_ref().map(|(path, _)| *path));
        for path in destinations {
            if store.exists(path) {
                return Err(Error::OutputConflict(path.clone()));
            }
        }
    }

    let text = seal(jwk.to_json(), params.encryption.as_ref(), reporter)?;
    emit(&text, &params.output, store, reporter)?;

    if let Some((path, text)) = public {
        write_file(path, &text, params.output.force, store, reporter)?;
    }
    Ok(())
}

fn read_source<S, C>(
    source: &KeySource,
    store: &S,
    reporter: &mut Reporter<'_, C>,
) -> Result<Zeroizing<String>, Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    match source {
        KeySource::Literal(text) => Ok(Zeroizing::new(text.expose_secret().clone())),
        KeySource::File(path) => {
            reporter.verbose(format!("Reading JWK from {} file...", path.display()));
            let text = Zeroizing::new(store.read(path)?);
            reporter.verbose("JWK successfully read.");
            Ok(text)
        }
    }
}

/// Encrypts the key text when derivation parameters are given.
fn seal<C>(
    text: Zeroizing<String>,
    encryption: Option<&DerivationParameters>,
    reporter: &mut Reporter<'_, C>,
) -> Result<Zeroizing<String>, Error>
where
    C: Console + ?Sized,
{
    let Some(params) = encryption else {
        return Ok(text);
    };

    reporter.verbose(format!(
        "Encrypting the JWK...\nAlgorithm: {KEY_MANAGEMENT_ALGORITHM}\nEncryption algorithm: {CONTENT_ENCRYPTION_ALGORITHM}\nPassword derivation iteration count: {}\nPassword derivation salt size: {} bits",
        params.iteration_count(),
        params.salt_size()
    ));
    let envelope = envelope::wrap(&text, params)?;
    reporter.verbose("JWK encrypted.");
    Ok(Zeroizing::new(envelope.into_string()))
}

fn emit<S, C>(
    text: &str,
    output: &OutputTarget,
    store: &S,
    reporter: &mut Reporter<'_, C>,
) -> Result<(), Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    match &output.path {
        Some(path) => write_file(path, text, output.force, store, reporter),
        None => {
            reporter.write(text);
            Ok(())
        }
    }
}

fn write_file<S, C>(
    path: &Path,
    text: &str,
    force: bool,
    store: &S,
    reporter: &mut Reporter<'_, C>,
) -> Result<(), Error>
where
    S: Store + ?Sized,
    C: Console + ?Sized,
{
    reporter.verbose(format!("Writing JWK into file {}.", path.display()));
    store.write(path, text, force)?;
    info!(path = %path.display(), "key written");
    reporter.verbose("Done.");
    Ok(())
}

/// Formats a check failure as the lines the `check` command reports.
fn describe_check_error(err: &CheckError) -> Vec<String> {
    match err {
        CheckError::MalformedDocument { path, line, column, message } => {
            let mut location = String::from("Malformed JSON object.");
            if let Some(path) = path {
                location.push_str(&format!(" Path: {path}."));
            }
            if let Some(line) = line {
                location.push_str(&format!(" Line: {line}."));
            }
            if let Some(column) = column {
                location.push_str(&format!(" Position: {column}."));
            }
            vec![location, message.clone()]
        }
        CheckError::ValidationFailure { .. } => vec![err.to_string()],
    }
}
