//! Basic usage example for `jwkit`.

use jwkit::prelude::*;
use secrecy::{ExposeSecret, SecretString};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("jwkit Basic Usage Example");
    println!("=========================\n");

    // Generate a signing key with a thumbprint kid
    let attributes = KeyAttributes {
        alg: Some("ES256".to_string()),
        key_use: Some(KeyUse::Signature),
        ..KeyAttributes::default()
    };
    let jwk = generate(KeySpec::Ec { curve: Curve::P256 }, &attributes)?;
    println!("✓ Generated {} key", jwk.material.kty());
    println!("  - kid: {}", jwk.kid.as_deref().unwrap_or("<none>"));

    // Validate the serialized form
    let document = jwk.to_json();
    check(document.as_bytes())?;
    println!("✓ Key validated\n");

    // Encrypt it under a password
    let password = SecretString::new("correct horse battery staple".to_string());
    let params = DerivationParameters::new(password.clone()).with_iteration_count(10_000);
    let envelope = wrap(&document, &params)?;
    println!("Envelope: {envelope}\n");

    // Decrypt and compare
    let plaintext = unwrap(envelope.as_str(), &password)?;
    let recovered = Jwk::from_json(plaintext.expose_secret().as_bytes())?;
    assert_eq!(recovered, jwk);
    println!("✓ Round-trip verification successful");

    // Share only the public half
    if let Some(public) = jwk.to_public() {
        println!("\nPublic key: {}", public.to_json().as_str());
    }

    Ok(())
}
