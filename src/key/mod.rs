/*!
 * Key entities
 *
 * A `Key` is one half (private or public) of an RSA or ECDSA key pair. Its
 * subject key identifier (SKI) is the SHA-256 digest of the canonical public
 * encoding and is computed once, when the key is constructed, so both halves
 * of a pair always carry the same SKI and the same `KeyId`.
 */

use std::fmt;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;
use crate::utils;

pub mod ecdsa_key;
pub mod opts;
pub mod registry;
pub mod rsa_key;
pub mod signer;

pub use self::ecdsa_key::{EcdsaKeyGenerator, EcdsaPrivateKey, EcdsaPublicKey};
pub use self::opts::{EcdsaCurve, KeyGenOpt};
pub use self::registry::{KeyGenerator, KeyRecoverer, KeyRegistry};
pub use self::rsa_key::RsaKeyGenerator;

/// Prefix of every key identifier
pub const KEY_ID_PREFIX: &str = "QK";

/// Length of a subject key identifier in bytes
pub const SKI_LEN: usize = 32;

/// Computes the subject key identifier of a canonical public key encoding
pub fn compute_ski(public_encoding: &[u8]) -> Vec<u8> {
    Sha256::digest(public_encoding).to_vec()
}

/// Whether a key holds private or public material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Private,
    Public,
}

/// Identifier derived from a SKI; doubles as the on-disk file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId(String);

impl KeyId {
    /// Builds the identifier for a SKI
    pub fn from_ski(ski: &[u8]) -> Self {
        KeyId(format!("{}{}", KEY_ID_PREFIX, hex::encode(ski)))
    }

    /// Checks prefix and shape of an identifier string
    pub fn parse(raw: &str) -> CryptoResult<Self> {
        let digest = raw
            .strip_prefix(KEY_ID_PREFIX)
            .ok_or_else(|| CryptoError::invalid_key_id(raw, "missing key id prefix"))?;

        if digest.len() != SKI_LEN * 2 {
            return Err(CryptoError::invalid_key_id(
                raw,
                &format!("expected {} hex characters after prefix", SKI_LEN * 2),
            ));
        }

        if !digest
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(CryptoError::invalid_key_id(raw, "not lowercase hex"));
        }

        Ok(KeyId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the SKI encoded in this identifier
    pub fn ski(&self) -> CryptoResult<Vec<u8>> {
        hex::decode(&self.0[KEY_ID_PREFIX.len()..])
            .map_err(|e| CryptoError::invalid_key_id(&self.0, &e.to_string()))
    }

    /// Constant-time check that `ski` is the SKI this identifier was built from
    pub fn matches_ski(&self, ski: &[u8]) -> bool {
        match self.ski() {
            Ok(own) => utils::constant_time_eq(&own, ski),
            Err(_) => false,
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Algorithm specific key material
#[derive(Clone)]
pub enum KeyMaterial {
    RsaPrivate(::rsa::RsaPrivateKey),
    RsaPublic(::rsa::RsaPublicKey),
    EcdsaPrivate(EcdsaPrivateKey),
    EcdsaPublic(EcdsaPublicKey),
}

/// One half of a key pair together with its SKI
#[derive(Clone)]
pub struct Key {
    ski: Vec<u8>,
    gen_opt: KeyGenOpt,
    material: KeyMaterial,
}

impl Key {
    /// Wraps key material, computing the SKI from its public half
    pub fn from_material(material: KeyMaterial) -> CryptoResult<Self> {
        let (public_encoding, gen_opt) = match &material {
            KeyMaterial::RsaPrivate(key) => (
                rsa_key::public_encoding(&key.to_public_key())?,
                rsa_key::gen_opt_for(key),
            ),
            KeyMaterial::RsaPublic(key) => {
                (rsa_key::public_encoding(key)?, rsa_key::gen_opt_for(key))
            }
            KeyMaterial::EcdsaPrivate(key) => (
                key.public_key().to_uncompressed_point(),
                KeyGenOpt::from_ecdsa_curve(key.curve()),
            ),
            KeyMaterial::EcdsaPublic(key) => (
                key.to_uncompressed_point(),
                KeyGenOpt::from_ecdsa_curve(key.curve()),
            ),
        };

        Ok(Self {
            ski: compute_ski(&public_encoding),
            gen_opt,
            material,
        })
    }

    /// Subject key identifier (SHA-256 of the public encoding)
    pub fn ski(&self) -> &[u8] {
        &self.ski
    }

    pub fn id(&self) -> KeyId {
        KeyId::from_ski(&self.ski)
    }

    /// Option that describes this key's algorithm and size
    ///
    /// RSA keys with a modulus outside the defined sizes report `Unknown`.
    pub fn gen_opt(&self) -> KeyGenOpt {
        self.gen_opt
    }

    pub fn key_type(&self) -> KeyType {
        match self.material {
            KeyMaterial::RsaPrivate(_) | KeyMaterial::EcdsaPrivate(_) => KeyType::Private,
            KeyMaterial::RsaPublic(_) | KeyMaterial::EcdsaPublic(_) => KeyType::Public,
        }
    }

    pub fn is_private(&self) -> bool {
        self.key_type() == KeyType::Private
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Public half of this key; a public key returns a copy of itself
    pub fn public_key(&self) -> Key {
        let material = match &self.material {
            KeyMaterial::RsaPrivate(key) => KeyMaterial::RsaPublic(key.to_public_key()),
            KeyMaterial::EcdsaPrivate(key) => KeyMaterial::EcdsaPublic(key.public_key()),
            public => public.clone(),
        };

        Key {
            ski: self.ski.clone(),
            gen_opt: self.gen_opt,
            material,
        }
    }

    /// Canonical byte encoding consumed by the keystore
    ///
    /// Private keys: PKCS#1 DER (RSA) or SEC1 DER (ECDSA). Public keys:
    /// PKCS#1 DER (RSA) or the uncompressed SEC1 point (ECDSA).
    pub fn to_raw_bytes(&self) -> CryptoResult<SecureBytes> {
        match &self.material {
            KeyMaterial::RsaPrivate(key) => rsa_key::private_to_der(key),
            KeyMaterial::RsaPublic(key) => rsa_key::public_encoding(key).map(SecureBytes::from),
            KeyMaterial::EcdsaPrivate(key) => key.to_sec1_der(),
            KeyMaterial::EcdsaPublic(key) => Ok(SecureBytes::from(key.to_uncompressed_point())),
        }
    }

    /// Standard PEM encoding of the key
    pub fn to_pem(&self) -> CryptoResult<Zeroizing<String>> {
        match &self.material {
            KeyMaterial::RsaPrivate(key) => rsa_key::private_to_pem(key),
            KeyMaterial::RsaPublic(key) => rsa_key::public_to_pem(key).map(Zeroizing::new),
            KeyMaterial::EcdsaPrivate(key) => key.to_pem(),
            KeyMaterial::EcdsaPublic(key) => key.to_pem().map(Zeroizing::new),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id().as_str())
            .field("gen_opt", &self.gen_opt)
            .field("key_type", &self.key_type())
            .finish()
    }
}

/// Generates a key pair for `opt` without going through a registry
pub fn generate_key(opt: KeyGenOpt) -> CryptoResult<(Key, Key)> {
    KeyGenerator::for_option(opt)?.generate()
}
