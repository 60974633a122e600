//! RSA key pairs
//!
//! Private keys are encoded as PKCS#1 `RSAPrivateKey` DER and public keys as
//! PKCS#1 `RSAPublicKey` DER, which is also the input to the SKI digest.

use rand::rngs::OsRng;
use rsa::pkcs1::{
    DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey,
};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use super::{Key, KeyGenOpt, KeyMaterial};
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

/// Generator for RSA key pairs of one modulus length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsaKeyGenerator {
    bits: usize,
}

impl RsaKeyGenerator {
    /// Creates a generator; only the defined RSA sizes are accepted
    pub fn new(bits: usize) -> CryptoResult<Self> {
        let opt = KeyGenOpt::from_rsa_bits(bits);
        if !opt.is_valid() {
            return Err(CryptoError::invalid_key_gen_option(&format!("rsa{}", bits)));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn gen_opt(&self) -> KeyGenOpt {
        KeyGenOpt::from_rsa_bits(self.bits)
    }

    /// Generates a fresh key pair and returns `(private, public)`
    pub fn generate(&self) -> CryptoResult<(Key, Key)> {
        let private = RsaPrivateKey::new(&mut OsRng, self.bits).map_err(|e| {
            CryptoError::key_generation_error(
                "RSA",
                &e.to_string(),
                error_codes::KEY_GENERATION_FAILED,
            )
        })?;

        let private = Key::from_material(KeyMaterial::RsaPrivate(private))?;
        let public = private.public_key();
        log::debug!("Generated {} key {}", self.gen_opt(), private.id());

        Ok((private, public))
    }

    /// Rebuilds a key from its canonical encoding
    ///
    /// Rejects bytes that do not decode to a valid RSA key of this size.
    pub fn recover(&self, key_bytes: &[u8], is_private: bool) -> CryptoResult<Key> {
        let material = if is_private {
            let key = RsaPrivateKey::from_pkcs1_der(key_bytes).map_err(recovery_error)?;
            key.validate().map_err(|e| recovery_error(e.to_string()))?;
            KeyMaterial::RsaPrivate(key)
        } else {
            KeyMaterial::RsaPublic(RsaPublicKey::from_pkcs1_der(key_bytes).map_err(recovery_error)?)
        };

        let key = Key::from_material(material)?;
        if key.gen_opt() != self.gen_opt() {
            return Err(CryptoError::key_generation_error(
                "RSA",
                &format!(
                    "decoded key is {}, expected {}",
                    key.gen_opt(),
                    self.gen_opt()
                ),
                error_codes::KEY_RECOVERY_FAILED,
            ));
        }

        Ok(key)
    }
}

fn recovery_error(e: impl ToString) -> CryptoError {
    CryptoError::key_generation_error("RSA", &e.to_string(), error_codes::KEY_RECOVERY_FAILED)
}

fn encoding_error(e: impl ToString) -> CryptoError {
    CryptoError::key_generation_error("RSA", &e.to_string(), error_codes::KEY_ENCODING_FAILED)
}

pub(crate) fn gen_opt_for(key: &impl PublicKeyParts) -> KeyGenOpt {
    KeyGenOpt::from_rsa_bits(key.size() * 8)
}

/// PKCS#1 DER of the public key (modulus and exponent)
pub(crate) fn public_encoding(key: &RsaPublicKey) -> CryptoResult<Vec<u8>> {
    key.to_pkcs1_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(encoding_error)
}

pub(crate) fn private_to_der(key: &RsaPrivateKey) -> CryptoResult<SecureBytes> {
    key.to_pkcs1_der()
        .map(|doc| SecureBytes::new(doc.as_bytes()))
        .map_err(encoding_error)
}

pub(crate) fn private_to_pem(key: &RsaPrivateKey) -> CryptoResult<Zeroizing<String>> {
    key.to_pkcs1_pem(LineEnding::LF).map_err(encoding_error)
}

pub(crate) fn public_to_pem(key: &RsaPublicKey) -> CryptoResult<String> {
    key.to_public_key_pem(LineEnding::LF).map_err(encoding_error)
}
