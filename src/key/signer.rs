//! Message signing with stored keys
//!
//! ECDSA signs with the curve's native digest and produces fixed-width
//! `r || s` signatures. RSA signs with PKCS#1 v1.5 over SHA-256.

use rsa::pkcs1v15;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::Sha256;

use super::ecdsa_key::{EcdsaPrivateKey, EcdsaPublicKey};
use super::{Key, KeyMaterial};
use crate::error::{error_codes, CryptoError, CryptoResult};

fn signing_error(algorithm: &str, e: impl ToString) -> CryptoError {
    CryptoError::key_generation_error(algorithm, &e.to_string(), error_codes::KEY_GENERATION_FAILED)
}

/// Signs `message` with a private key
///
/// # Errors
///
/// `InvalidParameter` when `key` is a public key.
pub fn sign(key: &Key, message: &[u8]) -> CryptoResult<Vec<u8>> {
    match key.material() {
        KeyMaterial::RsaPrivate(private) => {
            let signing_key = pkcs1v15::SigningKey::<Sha256>::new(private.clone());
            let signature = signing_key
                .try_sign(message)
                .map_err(|e| signing_error("RSA", e))?;
            Ok(signature.to_vec())
        }
        KeyMaterial::EcdsaPrivate(private) => sign_ecdsa(private, message),
        KeyMaterial::RsaPublic(_) | KeyMaterial::EcdsaPublic(_) => Err(
            CryptoError::invalid_parameter("key", "private key", "public key"),
        ),
    }
}

fn sign_ecdsa(private: &EcdsaPrivateKey, message: &[u8]) -> CryptoResult<Vec<u8>> {
    let scalar = private.scalar_bytes();
    let bytes = scalar.as_bytes();

    let signature = match private {
        EcdsaPrivateKey::P224(_) => {
            let signing_key = p224::ecdsa::SigningKey::from_slice(bytes)
                .map_err(|e| signing_error("ECDSA", e))?;
            let signature: p224::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| signing_error("ECDSA", e))?;
            signature.to_bytes().to_vec()
        }
        EcdsaPrivateKey::P256(_) => {
            let signing_key = p256::ecdsa::SigningKey::from_slice(bytes)
                .map_err(|e| signing_error("ECDSA", e))?;
            let signature: p256::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| signing_error("ECDSA", e))?;
            signature.to_bytes().to_vec()
        }
        EcdsaPrivateKey::P384(_) => {
            let signing_key = p384::ecdsa::SigningKey::from_slice(bytes)
                .map_err(|e| signing_error("ECDSA", e))?;
            let signature: p384::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| signing_error("ECDSA", e))?;
            signature.to_bytes().to_vec()
        }
        EcdsaPrivateKey::P521(_) => {
            let signing_key = p521::ecdsa::SigningKey::from_slice(bytes)
                .map_err(|e| signing_error("ECDSA", e))?;
            let signature: p521::ecdsa::Signature = signing_key
                .try_sign(message)
                .map_err(|e| signing_error("ECDSA", e))?;
            signature.to_bytes().to_vec()
        }
    };

    Ok(signature)
}

/// Verifies `signature` over `message`; either half of a pair may be used
///
/// A signature that does not verify (or does not even parse) yields
/// `Ok(false)`.
pub fn verify(key: &Key, signature: &[u8], message: &[u8]) -> CryptoResult<bool> {
    match key.public_key().material() {
        KeyMaterial::RsaPublic(public) => {
            let verifying_key = pkcs1v15::VerifyingKey::<Sha256>::new(public.clone());
            let signature = match pkcs1v15::Signature::try_from(signature) {
                Ok(signature) => signature,
                Err(_) => return Ok(false),
            };
            Ok(verifying_key.verify(message, &signature).is_ok())
        }
        KeyMaterial::EcdsaPublic(public) => verify_ecdsa(public, signature, message),
        KeyMaterial::RsaPrivate(_) | KeyMaterial::EcdsaPrivate(_) => Err(
            CryptoError::invalid_parameter("key", "public key", "private key"),
        ),
    }
}

fn verify_ecdsa(public: &EcdsaPublicKey, signature: &[u8], message: &[u8]) -> CryptoResult<bool> {
    let point = public.to_uncompressed_point();

    macro_rules! check {
        ($curve:ident) => {{
            let verifying_key = $curve::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| signing_error("ECDSA", e))?;
            match $curve::ecdsa::Signature::from_slice(signature) {
                Ok(signature) => verifying_key.verify(message, &signature).is_ok(),
                Err(_) => false,
            }
        }};
    }

    let valid = match public {
        EcdsaPublicKey::P224(_) => check!(p224),
        EcdsaPublicKey::P256(_) => check!(p256),
        EcdsaPublicKey::P384(_) => check!(p384),
        EcdsaPublicKey::P521(_) => check!(p521),
    };

    Ok(valid)
}
