//! Certificate directory
//!
//! One PEM file per certificate, named by the identifier of its public key.
//! Certificates are public, so files are written in plaintext.

use std::fs;
use std::path::Path;

use super::Certificate;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::key::KeyId;
use crate::utils;

const CERT_FILE_MODE: u32 = 0o644;

/// Writes `cert` into `dir` unless a file with its identifier exists
///
/// Returns the identifier the certificate is stored under.
pub fn store_cert(cert: &Certificate, dir: &Path) -> CryptoResult<KeyId> {
    if dir.as_os_str().is_empty() {
        return Err(CryptoError::EmptyKeyPath {
            error_code: error_codes::EMPTY_KEY_PATH,
        });
    }
    fs::create_dir_all(dir)?;

    let id = cert.id();
    let path = dir.join(id.as_str());
    if utils::write_new_file(&path, cert.to_pem()?.as_bytes(), CERT_FILE_MODE)? {
        log::info!("Stored certificate {} ({})", id, cert.subject());
    } else {
        log::info!("Certificate {} already stored, not overwriting", id);
    }

    Ok(id)
}

/// Loads the certificate stored under `id`
///
/// # Errors
///
/// `CertificateNotFound` if the identifier is malformed, no such file
/// exists, or the file does not hold the certificate for `id`.
pub fn load_cert(id: &str, dir: &Path) -> CryptoResult<Certificate> {
    let key_id = KeyId::parse(id).map_err(|e| CryptoError::certificate_not_found(id, &e.to_string()))?;

    let path = dir.join(key_id.as_str());
    let pem = match fs::read_to_string(&path) {
        Ok(pem) => pem,
        Err(e) => return Err(CryptoError::certificate_not_found(id, &e.to_string())),
    };

    let cert = Certificate::from_pem(&pem)
        .map_err(|e| CryptoError::certificate_not_found(id, &e.to_string()))?;
    if cert.id() != key_id {
        return Err(CryptoError::certificate_not_found(
            id,
            "file holds a certificate for a different key",
        ));
    }

    Ok(cert)
}

/// Loads every certificate in a trust directory
///
/// Entries that are not certificates are skipped.
pub fn load_all_certs(dir: &Path) -> CryptoResult<Vec<Certificate>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        CryptoError::certificate_not_found(&dir.display().to_string(), &e.to_string())
    })?;

    let mut certs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        match fs::read_to_string(&path)
            .map_err(CryptoError::from)
            .and_then(|pem| Certificate::from_pem(&pem))
        {
            Ok(cert) => certs.push(cert),
            Err(e) => log::debug!("Skipping {}: {}", path.display(), e),
        }
    }

    Ok(certs)
}
