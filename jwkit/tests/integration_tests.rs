//! Integration tests for jwkit with FileStore.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jwkit::console::{MemoryConsole, OutputOptions};
use jwkit::envelope::{self, DerivationParameters};
use jwkit::error::Error;
use jwkit::generate::{KeyAttributes, KeySpec, KidPolicy};
use jwkit::jwk::{Curve, Jwk, KeyMaterial};
use jwkit::pipeline::{
    run, CheckParams, Command, ConvertParams, ConvertX509Params, DecryptParams, EncryptParams,
    KeySource, NewParams, OutputTarget,
};
use jwkit::store::Store;
use jwkit_file_store::FileStore;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
const BUNDLE_PASSWORD: &str = "P@ssw0rdX";

fn fixture(name: &str) -> PathBuf {
    Path::new(FIXTURES).join(name)
}

fn workspace() -> (TempDir, FileStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = FileStore::with_base_dir(dir.path()).expect("Failed to create store");
    (dir, store)
}

fn secret(value: &str) -> SecretString {
    SecretString::new(value.to_string())
}

fn run_quiet(command: Command, store: &FileStore) -> Result<MemoryConsole, Error> {
    let mut console = MemoryConsole::default();
    run(command, store, &mut console, OutputOptions::default())?;
    Ok(console)
}

fn read_jwk(store: &FileStore, path: &str) -> Jwk {
    let text = store.read(Path::new(path)).expect("Failed to read key file");
    Jwk::from_json(text.as_bytes()).expect("Key file does not validate")
}

#[test]
fn test_new_oct_key_to_file() {
    let (_dir, store) = workspace();

    let command = Command::New(NewParams {
        spec: KeySpec::Oct { length: Some(128) },
        attributes: KeyAttributes::default(),
        encryption: None,
        output: OutputTarget::file("key.json", false),
    });
    run_quiet(command, &store).expect("new failed");

    let jwk = read_jwk(&store, "key.json");
    let KeyMaterial::Symmetric(key) = &jwk.material else { panic!("expected oct key") };
    assert_eq!(key.k.len(), 16);
    assert_eq!(jwk.kid, Some(jwk.thumbprint()));
}

#[test]
fn test_new_key_overwrite_guard() {
    let (dir, store) = workspace();
    std::fs::write(dir.path().join("key.json"), "original").expect("Failed to seed file");

    let command = |force| {
        Command::New(NewParams {
            spec: KeySpec::Ec { curve: Curve::P384 },
            attributes: KeyAttributes { kid: KidPolicy::Explicit("Billy".to_string()), ..Default::default() },
            encryption: None,
            output: OutputTarget::file("key.json", force),
        })
    };

    let err = run_quiet(command(false), &store).unwrap_err();
    assert!(matches!(err, Error::OutputConflict(_)));
    assert_eq!(store.read(Path::new("key.json")).expect("read failed"), "original");

    run_quiet(command(true), &store).expect("forced new failed");
    let jwk = read_jwk(&store, "key.json");
    assert_eq!(jwk.kid.as_deref(), Some("Billy"));
}

#[test]
fn test_new_encrypted_key() {
    let (_dir, store) = workspace();

    let command = Command::New(NewParams {
        spec: KeySpec::Ec { curve: Curve::P256 },
        attributes: KeyAttributes::default(),
        encryption: Some(DerivationParameters::new(secret("P@ssw0rd"))),
        output: OutputTarget::file("key.jwe", false),
    });
    run_quiet(command, &store).expect("new failed");

    let sealed = store.read(Path::new("key.jwe")).expect("read failed");
    let opened = envelope::unwrap(&sealed, &secret("P@ssw0rd")).expect("unwrap failed");
    let jwk = Jwk::from_json(opened.expose_secret().as_bytes()).expect("key does not validate");
    assert!(jwk.material.is_private());
}

#[test]
fn test_check_fixture_keys() {
    let store = FileStore::new();

    for name in ["rsa_private.jwk.json", "ec_p256_private.jwk.json"] {
        let command = Command::Check(CheckParams { input_path: fixture(name) });
        let console = run_quiet(command, &store).expect("check failed");
        assert_eq!(console.output, vec!["JWK Validated."], "{name}");
        assert!(console.errors.is_empty(), "{name}");
    }
}

fn check_report(store: &FileStore, path: &str) -> MemoryConsole {
    let command = Command::Check(CheckParams { input_path: path.into() });
    run_quiet(command, store).expect("check returns Ok for invalid keys")
}

#[test]
fn test_check_truncated_modulus() {
    let (dir, store) = workspace();
    let original = std::fs::read_to_string(fixture("rsa_private.jwk.json")).expect("read failed");
    let mut document: serde_json::Value = serde_json::from_str(&original).expect("fixture is JSON");
    let mut n = URL_SAFE_NO_PAD
        .decode(document["n"].as_str().expect("n is a string"))
        .expect("n is base64url");
    n.pop();
    document["n"] = serde_json::Value::String(URL_SAFE_NO_PAD.encode(&n));
    let public = serde_json::json!({
        "kty": "RSA",
        "n": document["n"].clone(),
        "e": document["e"].clone(),
    });
    std::fs::write(dir.path().join("private.json"), document.to_string()).expect("write failed");
    std::fs::write(dir.path().join("public.json"), public.to_string()).expect("write failed");

    for path in ["private.json", "public.json"] {
        let console = check_report(&store, path);
        assert!(console.output.is_empty(), "{path}");
        assert_eq!(
            console.errors,
            vec!["Error:", "invalid 'n' member: modulus must be odd"],
            "{path}"
        );
    }
}

#[test]
fn test_check_private_key_for_other_modulus() {
    let (dir, store) = workspace();
    let original = std::fs::read_to_string(fixture("rsa_private.jwk.json")).expect("read failed");
    let mut document: serde_json::Value = serde_json::from_str(&original).expect("fixture is JSON");
    let mut n = URL_SAFE_NO_PAD
        .decode(document["n"].as_str().expect("n is a string"))
        .expect("n is base64url");
    n.remove(0);
    document["n"] = serde_json::Value::String(URL_SAFE_NO_PAD.encode(&n));
    std::fs::write(dir.path().join("key.json"), document.to_string()).expect("write failed");

    let console = check_report(&store, "key.json");

    assert!(console.output.is_empty());
    assert_eq!(
        console.errors,
        vec!["Error:", "invalid key: private parameters do not correspond to the public key"]
    );
}

#[test]
fn test_encrypt_decrypt_files() {
    let (_dir, store) = workspace();
    let key = r#"{"kty":"oct","k":"GawgguFyGrWKav7AX4VKUg"}"#;

    let encrypt = Command::Encrypt(EncryptParams {
        source: KeySource::Literal(secret(key)),
        derivation: DerivationParameters::new(secret("P@ssw0rd"))
            .with_iteration_count(10_000)
            .with_salt_size(256),
        output: OutputTarget::file("encrypted.jwe", false),
    });
    run_quiet(encrypt, &store).expect("encrypt failed");

    let sealed = store.read(Path::new("encrypted.jwe")).expect("read failed");
    let segments: Vec<&str> = sealed.split('.').collect();
    assert_eq!(segments.len(), 5);
    let wrapped_cek = URL_SAFE_NO_PAD.decode(segments[1]).expect("encrypted key is base64url");
    assert_eq!(wrapped_cek.len(), 40);

    let decrypt = Command::Decrypt(DecryptParams {
        source: KeySource::File("encrypted.jwe".into()),
        password: secret("P@ssw0rd"),
        output: OutputTarget::file("decrypted.json", false),
    });
    run_quiet(decrypt, &store).expect("decrypt failed");

    assert_eq!(store.read(Path::new("decrypted.json")).expect("read failed"), key);
}

#[test]
fn test_decrypt_with_wrong_password_writes_nothing() {
    let (_dir, store) = workspace();
    let sealed = envelope::wrap(r#"{"kty":"oct","k":"AAAA"}"#, &DerivationParameters::new(secret("right")))
        .expect("wrap failed");

    let decrypt = Command::Decrypt(DecryptParams {
        source: KeySource::Literal(secret(sealed.as_str())),
        password: secret("wrong"),
        output: OutputTarget::file("key.json", false),
    });
    let err = run_quiet(decrypt, &store).unwrap_err();

    assert!(matches!(err, Error::Decryption { .. }));
    assert!(!store.exists(Path::new("key.json")));
}

#[test]
fn test_encrypt_missing_input() {
    let (_dir, store) = workspace();
    let encrypt = Command::Encrypt(EncryptParams {
        source: KeySource::File("missing.json".into()),
        derivation: DerivationParameters::new(secret("P@ssw0rd")),
        output: OutputTarget::console(),
    });
    assert!(matches!(run_quiet(encrypt, &store), Err(Error::Input(_))));
}

#[test]
fn test_convert_pkcs12_bundle() {
    let (_dir, store) = workspace();

    let convert = |force| {
        Command::ConvertX509(ConvertX509Params {
            certificate_password: Some(secret(BUNDLE_PASSWORD)),
            convert: ConvertParams {
                input_path: fixture("rsa_bundle.p12"),
                output: OutputTarget::file("private.json", force),
                public_output_path: Some("public.json".into()),
                encryption: None,
            },
        })
    };
    run_quiet(convert(false), &store).expect("convert failed");
    let first = store.read(Path::new("private.json")).expect("read failed");

    let private = read_jwk(&store, "private.json");
    let public = read_jwk(&store, "public.json");
    assert!(private.material.is_private());
    assert!(!public.material.is_private());
    assert_eq!(private.kid.as_deref(), Some("VwagBTFpuzqNuRDc0MUKmUbnp1tz0JPzB-AVTu28N3A"));
    assert_eq!(public.x5c, private.x5c);

    let err = run_quiet(convert(false), &store).unwrap_err();
    assert!(matches!(err, Error::OutputConflict(_)));

    run_quiet(convert(true), &store).expect("forced convert failed");
    assert_eq!(store.read(Path::new("private.json")).expect("read failed"), first);
}

#[test]
fn test_convert_certificate_without_key() {
    let store = FileStore::new();
    let command = Command::ConvertX509(ConvertX509Params {
        certificate_password: None,
        convert: ConvertParams {
            input_path: fixture("ec_cert.pem"),
            output: OutputTarget::console(),
            public_output_path: None,
            encryption: None,
        },
    });
    let console = run_quiet(command, &store).expect("convert failed");

    let jwk = Jwk::from_json(console.output[0].as_bytes()).expect("output validates");
    assert_eq!(jwk.material.kty(), "EC");
    assert!(!jwk.material.is_private());
}

#[test]
fn test_convert_unsupported_certificate() {
    let store = FileStore::new();
    let command = Command::ConvertX509(ConvertX509Params {
        certificate_password: None,
        convert: ConvertParams {
            input_path: fixture("ed25519_cert.der"),
            output: OutputTarget::console(),
            public_output_path: None,
            encryption: None,
        },
    });
    let err = run_quiet(command, &store).unwrap_err();
    assert!(err.to_string().contains("Ed25519"));
}

#[test]
fn test_convert_pem_encrypted() {
    let (_dir, store) = workspace();
    let command = Command::ConvertPem(ConvertParams {
        input_path: fixture("rsa_pkcs1.pem"),
        output: OutputTarget::file("key.jwe", false),
        public_output_path: Some("public.json".into()),
        encryption: Some(
            DerivationParameters::new(secret("P@ssw0rd"))
                .with_iteration_count(10_000)
                .with_salt_size(256),
        ),
    });
    run_quiet(command, &store).expect("convert failed");

    let sealed = store.read(Path::new("key.jwe")).expect("read failed");
    let opened = envelope::unwrap(&sealed, &secret("P@ssw0rd")).expect("unwrap failed");
    let private = Jwk::from_json(opened.expose_secret().as_bytes()).expect("key validates");
    let public = read_jwk(&store, "public.json");

    assert!(private.material.same_public_key(&public.material));
    assert_eq!(private.kid, public.kid);
}
