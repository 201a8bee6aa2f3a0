//! `jwk` CLI tool for JSON Web Key management.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use jwkit::console::{Console, OutputOptions};
use jwkit::envelope::{DerivationParameters, DEFAULT_ITERATION_COUNT, DEFAULT_SALT_SIZE};
use jwkit::generate::{KeyAttributes, KeySpec, KidPolicy};
use jwkit::jwk::{Curve, KeyOperation, KeyUse};
use jwkit::pipeline::{
    self, CheckParams, Command, ConvertParams, ConvertX509Params, DecryptParams, EncryptParams,
    KeySource, NewParams, OutputTarget,
};
use jwkit_file_store::FileStore;
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jwk", version)]
#[command(about = "Manages JSON Web Keys", long_about = None)]
struct Cli {
    /// Show progress messages
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new key
    New {
        #[command(subcommand)]
        kind: NewKind,
    },
    /// Validate a key file
    Check {
        /// The key file to check
        #[arg(long)]
        input_path: PathBuf,
    },
    /// Encrypt a key with a password
    Encrypt {
        #[command(flatten)]
        source: KeySourceArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// The password used to encrypt the key
        #[arg(long, env = "JWK_PASSWORD", hide_env_values = true)]
        password: String,
        #[command(flatten)]
        derivation: DerivationArgs,
    },
    /// Decrypt a password-protected key
    Decrypt {
        #[command(flatten)]
        source: KeySourceArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// The password used to decrypt the key
        #[arg(long, env = "JWK_PASSWORD", hide_env_values = true)]
        password: String,
        /// Ignored, the iteration count is read from the envelope
        #[arg(long)]
        iteration_count: Option<u32>,
        /// Ignored, the salt is read from the envelope
        #[arg(long)]
        salt_size: Option<u32>,
    },
    /// Convert a certificate or a PEM key into a JWK
    Convert {
        #[command(subcommand)]
        format: ConvertFormat,
    },
}

#[derive(Subcommand, Debug)]
enum NewKind {
    /// Symmetric key
    #[command(name = "oct")]
    Oct {
        /// Key length in bits
        #[arg(long)]
        length: Option<usize>,
        #[command(flatten)]
        attributes: NewArgs,
    },
    /// RSA key
    #[command(name = "RSA")]
    Rsa {
        /// Modulus length in bits
        #[arg(long)]
        length: Option<usize>,
        #[command(flatten)]
        attributes: NewArgs,
    },
    /// Elliptic curve key
    #[command(name = "EC")]
    Ec {
        /// Curve name: P-256, P-384 or P-521
        #[arg(long, default_value = "P-256")]
        curve: Curve,
        #[command(flatten)]
        attributes: NewArgs,
    },
}

#[derive(Subcommand, Debug)]
enum ConvertFormat {
    /// Convert an X.509 certificate or a PKCS#12 bundle
    #[command(name = "X509")]
    X509 {
        #[command(flatten)]
        convert: ConvertArgs,
        /// The password of the PKCS#12 bundle
        #[arg(long, env = "JWK_CERTIFICATE_PASSWORD", hide_env_values = true)]
        certificate_password: Option<String>,
    },
    /// Convert a PEM key
    #[command(name = "PEM")]
    Pem {
        #[command(flatten)]
        convert: ConvertArgs,
    },
}

#[derive(Args, Debug)]
struct NewArgs {
    /// The algorithm the key is intended for
    #[arg(long)]
    alg: Option<String>,
    /// The intended use: sig or enc
    #[arg(long = "use")]
    key_use: Option<KeyUse>,
    /// The permitted operations
    #[arg(long, num_args = 1..)]
    key_ops: Vec<KeyOperation>,
    /// Explicit key identifier
    #[arg(long)]
    kid: Option<String>,
    /// Do not set a key identifier
    #[arg(long)]
    no_kid: bool,
    #[command(flatten)]
    output: OutputArgs,
    #[command(flatten)]
    encryption: EncryptionArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// The certificate or key file to convert
    #[arg(long)]
    input_path: PathBuf,
    /// Also write the public key to this file
    #[arg(long)]
    public_output_path: Option<PathBuf>,
    #[command(flatten)]
    output: OutputArgs,
    #[command(flatten)]
    encryption: EncryptionArgs,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct KeySourceArgs {
    /// The key or envelope text
    #[arg(long)]
    key: Option<String>,
    /// The file holding the key or envelope
    #[arg(long)]
    input_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write the result to this file instead of the console
    #[arg(long)]
    output_path: Option<PathBuf>,
    /// Overwrite existing files
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct DerivationArgs {
    /// PBKDF2 iteration count
    #[arg(long, default_value_t = DEFAULT_ITERATION_COUNT)]
    iteration_count: u32,
    /// PBKDF2 salt size in bits
    #[arg(long, default_value_t = DEFAULT_SALT_SIZE)]
    salt_size: u32,
}

#[derive(Args, Debug)]
struct EncryptionArgs {
    /// Encrypt the key with this password
    #[arg(long, env = "JWK_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[command(flatten)]
    derivation: DerivationArgs,
}

impl OutputArgs {
    fn into_target(self) -> OutputTarget {
        OutputTarget { path: self.output_path, force: self.force }
    }
}

impl DerivationArgs {
    fn with_password(self, password: String) -> DerivationParameters {
        DerivationParameters::new(SecretString::new(password))
            .with_iteration_count(self.iteration_count)
            .with_salt_size(self.salt_size)
    }
}

impl EncryptionArgs {
    fn into_parameters(self) -> Option<DerivationParameters> {
        let derivation = self.derivation;
        self.password.map(|password| derivation.with_password(password))
    }
}

impl KeySourceArgs {
    fn into_source(self) -> anyhow::Result<KeySource> {
        match (self.key, self.input_path) {
            (Some(key), _) => Ok(KeySource::Literal(SecretString::new(key))),
            (None, Some(path)) => Ok(KeySource::File(path)),
            (None, None) => anyhow::bail!("either --key or --input-path is required"),
        }
    }
}

impl NewArgs {
    fn into_params(self, spec: KeySpec) -> NewParams {
        // An explicit kid wins over --no-kid
        let kid = match (self.kid, self.no_kid) {
            (Some(kid), _) => KidPolicy::Explicit(kid),
            (None, true) => KidPolicy::Omit,
            (None, false) => KidPolicy::Thumbprint,
        };
        NewParams {
            spec,
            attributes: KeyAttributes {
                alg: self.alg,
                key_use: self.key_use,
                key_ops: self.key_ops,
                kid,
            },
            encryption: self.encryption.into_parameters(),
            output: self.output.into_target(),
        }
    }
}

impl ConvertArgs {
    fn into_params(self) -> ConvertParams {
        ConvertParams {
            input_path: self.input_path,
            output: self.output.into_target(),
            public_output_path: self.public_output_path,
            encryption: self.encryption.into_parameters(),
        }
    }
}

impl Commands {
    fn into_command(self) -> anyhow::Result<Command> {
        let command = match self {
            Self::New { kind } => Command::New(match kind {
                NewKind::Oct { length, attributes } => {
                    attributes.into_params(KeySpec::Oct { length })
                }
                NewKind::Rsa { length, attributes } => {
                    attributes.into_params(KeySpec::Rsa { length })
                }
                NewKind::Ec { curve, attributes } => attributes.into_params(KeySpec::Ec { curve }),
            }),
            Self::Check { input_path } => Command::Check(CheckParams { input_path }),
            Self::Encrypt { source, output, password, derivation } => {
                Command::Encrypt(EncryptParams {
                    source: source.into_source()?,
                    derivation: derivation.with_password(password),
                    output: output.into_target(),
                })
            }
            Self::Decrypt { source, output, password, iteration_count, salt_size } => {
                debug!(?iteration_count, ?salt_size, "derivation parameters are read from the envelope");
                Command::Decrypt(DecryptParams {
                    source: source.into_source()?,
                    password: SecretString::new(password),
                    output: output.into_target(),
                })
            }
            Self::Convert { format } => match format {
                ConvertFormat::X509 { convert, certificate_password } => {
                    Command::ConvertX509(ConvertX509Params {
                        certificate_password: certificate_password.map(SecretString::new),
                        convert: convert.into_params(),
                    })
                }
                ConvertFormat::Pem { convert } => Command::ConvertPem(convert.into_params()),
            },
        };
        Ok(command)
    }
}

/// Console writing results to stdout and reports to stderr.
struct StdConsole;

impl Console for StdConsole {
    fn write(&mut self, text: &str) {
        println!("{text}");
    }

    fn error(&mut self, text: &str) {
        eprintln!("{text}");
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "warn,jwkit=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.into_command()?;
    let name = command.name();
    let options = OutputOptions { verbose: cli.verbose };

    pipeline::run(command, &FileStore::new(), &mut StdConsole, options)
        .with_context(|| format!("jwk {name} failed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use secrecy::ExposeSecret;

    const DERIVATION_FLAGS: [&str; 6] =
        ["--password", "P@ssw0rd", "--iteration-count", "10000", "--salt-size", "256"];

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jwk").chain(args.iter().copied()))
            .expect("parse failed")
    }

    fn parse_new(kind: &[&str]) -> NewParams {
        let mut args = vec!["new"];
        args.extend_from_slice(kind);
        args.extend_from_slice(&["--use", "sig", "--key-ops", "sign", "verify"]);
        args.extend_from_slice(&DERIVATION_FLAGS);
        args.extend_from_slice(&["--no-kid", "--kid", "Billy", "--output-path", "./key.json"]);
        args.extend_from_slice(&["--force", "--verbose"]);

        let cli = parse(&args);
        assert!(cli.verbose);
        match cli.command.into_command().expect("conversion failed") {
            Command::New(params) => params,
            other => panic!("expected new command, got {other:?}"),
        }
    }

    fn assert_new_attributes(params: &NewParams, alg: &str) {
        assert_eq!(params.attributes.alg.as_deref(), Some(alg));
        assert_eq!(params.attributes.key_use, Some(KeyUse::Signature));
        assert_eq!(params.attributes.key_ops, vec![KeyOperation::Sign, KeyOperation::Verify]);
        assert_eq!(params.attributes.kid, KidPolicy::Explicit("Billy".to_string()));
        assert_eq!(params.output, OutputTarget::file("./key.json", true));
        assert_derivation(params.encryption.as_ref().expect("password given"));
    }

    fn assert_derivation(params: &DerivationParameters) {
        assert_eq!(params.password().expose_secret(), "P@ssw0rd");
        assert_eq!(params.iteration_count(), 10_000);
        assert_eq!(params.salt_size(), 256);
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_new_oct() {
        let params = parse_new(&["oct", "--length", "128", "--alg", "HS256"]);
        assert_eq!(params.spec, KeySpec::Oct { length: Some(128) });
        assert_new_attributes(&params, "HS256");
    }

    #[test]
    fn test_parse_new_rsa() {
        let params = parse_new(&["RSA", "--length", "1024", "--alg", "PS256"]);
        assert_eq!(params.spec, KeySpec::Rsa { length: Some(1024) });
        assert_new_attributes(&params, "PS256");
    }

    #[test]
    fn test_parse_new_ec() {
        let params = parse_new(&["EC", "--curve", "P-256", "--alg", "ES256"]);
        assert_eq!(params.spec, KeySpec::Ec { curve: Curve::P256 });
        assert_new_attributes(&params, "ES256");
    }

    #[test]
    fn test_parse_new_defaults() {
        let cli = parse(&["new", "EC"]);
        assert!(!cli.verbose);
        let Command::New(params) = cli.command.into_command().expect("conversion failed") else {
            panic!("expected new command");
        };
        assert_eq!(params.spec, KeySpec::Ec { curve: Curve::P256 });
        assert_eq!(params.attributes.kid, KidPolicy::Thumbprint);
        assert_eq!(params.output, OutputTarget::console());
    }

    #[test]
    fn test_parse_no_kid() {
        let cli = parse(&["new", "oct", "--no-kid"]);
        let Command::New(params) = cli.command.into_command().expect("conversion failed") else {
            panic!("expected new command");
        };
        assert_eq!(params.attributes.kid, KidPolicy::Omit);
    }

    #[test]
    fn test_parse_encrypt() {
        let mut args = vec!["encrypt", "--input-path", "./key.json", "--output-path", "./encrypted.json"];
        args.extend_from_slice(&DERIVATION_FLAGS);
        args.extend_from_slice(&["--force", "--verbose"]);

        let Command::Encrypt(params) = parse(&args).command.into_command().expect("conversion failed")
        else {
            panic!("expected encrypt command");
        };
        assert!(matches!(params.source, KeySource::File(ref path) if path == &PathBuf::from("./key.json")));
        assert_eq!(params.output, OutputTarget::file("./encrypted.json", true));
        assert_derivation(&params.derivation);
    }

    #[test]
    fn test_parse_decrypt() {
        let mut args = vec!["decrypt", "--input-path", "./encrypted.json", "--output-path", "./key.json"];
        args.extend_from_slice(&DERIVATION_FLAGS);
        args.extend_from_slice(&["--force", "--verbose"]);

        let Command::Decrypt(params) = parse(&args).command.into_command().expect("conversion failed")
        else {
            panic!("expected decrypt command");
        };
        assert!(matches!(params.source, KeySource::File(ref path) if path == &PathBuf::from("./encrypted.json")));
        assert_eq!(params.password.expose_secret(), "P@ssw0rd");
        assert_eq!(params.output, OutputTarget::file("./key.json", true));
    }

    #[test]
    fn test_parse_literal_key() {
        let cli = parse(&["encrypt", "--key", r#"{"kty":"oct","k":"AA"}"#, "--password", "pw"]);
        let Command::Encrypt(params) = cli.command.into_command().expect("conversion failed") else {
            panic!("expected encrypt command");
        };
        assert!(matches!(params.source, KeySource::Literal(ref key) if key.expose_secret() == r#"{"kty":"oct","k":"AA"}"#));
        assert_eq!(params.derivation.iteration_count(), DEFAULT_ITERATION_COUNT);
        assert_eq!(params.derivation.salt_size(), DEFAULT_SALT_SIZE);
    }

    #[test]
    fn test_key_and_input_path_conflict() {
        let result = Cli::try_parse_from([
            "jwk", "encrypt", "--key", "{}", "--input-path", "./key.json", "--password", "pw",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_convert_pem() {
        let mut args = vec![
            "convert",
            "PEM",
            "--input-path",
            "./key.pem",
            "--output-path",
            "./key.json",
            "--public-output-path",
            "./public_key.json",
        ];
        args.extend_from_slice(&DERIVATION_FLAGS);
        args.extend_from_slice(&["--force", "--verbose"]);

        let Command::ConvertPem(params) = parse(&args).command.into_command().expect("conversion failed")
        else {
            panic!("expected convert PEM command");
        };
        assert_eq!(params.input_path, PathBuf::from("./key.pem"));
        assert_eq!(params.output, OutputTarget::file("./key.json", true));
        assert_eq!(params.public_output_path, Some(PathBuf::from("./public_key.json")));
        assert_derivation(params.encryption.as_ref().expect("password given"));
    }

    #[test]
    fn test_parse_convert_x509() {
        let mut args = vec![
            "convert",
            "X509",
            "--input-path",
            "./key.cer",
            "--output-path",
            "./key.json",
            "--public-output-path",
            "./public_key.json",
            "--certificate-password",
            "P@ssw0rdX",
        ];
        args.extend_from_slice(&DERIVATION_FLAGS);
        args.extend_from_slice(&["--force", "--verbose"]);

        let Command::ConvertX509(params) = parse(&args).command.into_command().expect("conversion failed")
        else {
            panic!("expected convert X509 command");
        };
        assert_eq!(
            params.certificate_password.as_ref().map(|password| password.expose_secret().as_str()),
            Some("P@ssw0rdX")
        );
        assert_eq!(params.convert.input_path, PathBuf::from("./key.cer"));
        assert_eq!(params.convert.public_output_path, Some(PathBuf::from("./public_key.json")));
        assert_derivation(params.convert.encryption.as_ref().expect("password given"));
    }

    #[test]
    fn test_parse_check() {
        let Command::Check(params) = parse(&["check", "--input-path", "./key.json"])
            .command
            .into_command()
            .expect("conversion failed")
        else {
            panic!("expected check command");
        };
        assert_eq!(params.input_path, PathBuf::from("./key.json"));
    }

    #[test]
    fn test_rejects_unknown_curve() {
        assert!(Cli::try_parse_from(["jwk", "new", "EC", "--curve", "P-192"]).is_err());
    }
}
