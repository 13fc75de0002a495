//! Loading PEM material from inline data or files
//!
//! Inline data may be base64-encoded (as kubeconfig `*-data` fields are) or
//! raw PEM text. Inline data is always read before the file.

use std::fs;
use std::path::Path;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};
use openssl::pkey::{Id, PKey, Private};
use openssl::x509::X509;

use crate::common::{FactoryError, Result};

/// Decode inline credential data
pub fn decode_inline(data: &str) -> Vec<u8> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => data.as_bytes().to_vec(),
    }
}

/// Parse every certificate in a PEM bundle, or a single DER certificate
pub fn parse_certificates(bytes: &[u8]) -> Result<Vec<X509>> {
    match X509::stack_from_pem(bytes) {
        Ok(certs) if !certs.is_empty() => Ok(certs),
        _ => X509::from_der(bytes)
            .map(|cert| vec![cert])
            .map_err(|e| FactoryError::Transport(format!("No certificate found: {}", e))),
    }
}

/// Trust anchors from inline data and file, merged in that order
///
/// A source that fails to load is skipped with a warning as long as the other
/// one yields certificates.
pub fn load_ca_certificates(data: Option<&str>, file: Option<&Path>) -> Result<Vec<X509>> {
    let mut roots = Vec::new();
    let mut failures = Vec::new();

    if let Some(data) = data {
        match parse_certificates(&decode_inline(data)) {
            Ok(certs) => {
                debug!("Loaded {} CA certificate(s) from inline data", certs.len());
                roots.extend(certs);
            }
            Err(e) => failures.push(format!("inline CA data: {}", e)),
        }
    }

    if let Some(file) = file {
        match read_file(file).and_then(|bytes| parse_certificates(&bytes)) {
            Ok(certs) => {
                debug!("Loaded {} CA certificate(s) from {}", certs.len(), file.display());
                roots.extend(certs);
            }
            Err(e) => failures.push(format!("CA file {}: {}", file.display(), e)),
        }
    }

    if roots.is_empty() {
        return Err(FactoryError::Transport(format!(
            "No usable CA certificates ({})",
            failures.join("; ")
        )));
    }

    for failure in failures {
        warn!("Ignoring unusable CA source, {}", failure);
    }

    Ok(roots)
}

/// Client certificate chain, inline data taking precedence over the file
pub fn load_certificate_chain(data: Option<&str>, file: Option<&Path>) -> Result<Vec<X509>> {
    let bytes = read_data_or_file(data, file, "client certificate")?;
    parse_certificates(&bytes)
}

/// Client private key, inline data taking precedence over the file
///
/// The password decrypts encrypted PEM keys and is ignored otherwise. The
/// key must be of the configured algorithm.
pub fn load_private_key(
    data: Option<&str>,
    file: Option<&Path>,
    algorithm: &str,
    password: &str,
) -> Result<PKey<Private>> {
    let bytes = read_data_or_file(data, file, "client key")?;
    let key = PKey::private_key_from_pem_passphrase(&bytes, password.as_bytes())
        .or_else(|_| PKey::private_key_from_der(&bytes))
        .map_err(|e| FactoryError::Transport(format!("Failed to parse client key: {}", e)))?;

    let expected = key_algorithm(algorithm)?;
    if !expected.contains(&key.id()) {
        return Err(FactoryError::Transport(format!(
            "Client key is not a {} key",
            algorithm
        )));
    }

    Ok(key)
}

/// Key types accepted for a configured algorithm name
fn key_algorithm(algorithm: &str) -> Result<&'static [Id]> {
    match algorithm.to_ascii_uppercase().as_str() {
        "RSA" => Ok(&[Id::RSA]),
        "EC" | "ECDSA" => Ok(&[Id::EC]),
        "DSA" => Ok(&[Id::DSA]),
        "ED25519" => Ok(&[Id::ED25519]),
        other => Err(FactoryError::Transport(format!(
            "Unsupported client key algorithm: {}",
            other
        ))),
    }
}

fn read_data_or_file(data: Option<&str>, file: Option<&Path>, what: &str) -> Result<Vec<u8>> {
    match (data, file) {
        (Some(data), _) => Ok(decode_inline(data)),
        (None, Some(file)) => read_file(file),
        (None, None) => Err(FactoryError::Transport(format!("No {} configured", what))),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        FactoryError::Transport(format!("Failed to read {}: {}", path.display(), e))
    })
}
