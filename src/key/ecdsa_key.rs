//! ECDSA key pairs over the NIST curves P-224, P-256, P-384 and P-521
//!
//! Private keys are encoded as SEC1 `ECPrivateKey` DER. Public keys are
//! encoded as the uncompressed SEC1 point `0x04 || X || Y`, which is also
//! the input to the SKI digest.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use super::{EcdsaCurve, Key, KeyGenOpt, KeyMaterial};
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

/// Private scalar on one of the supported curves
#[derive(Clone)]
pub enum EcdsaPrivateKey {
    P224(p224::SecretKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

/// Public point on one of the supported curves
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EcdsaPublicKey {
    P224(p224::PublicKey),
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(p521::PublicKey),
}

// Runs the same expression against whichever curve variant is present.
macro_rules! each_curve {
    ($value:expr, $ty:ident, $inner:ident => $body:expr) => {
        match $value {
            $ty::P224($inner) => $body,
            $ty::P256($inner) => $body,
            $ty::P384($inner) => $body,
            $ty::P521($inner) => $body,
        }
    };
}

fn encoding_error(e: impl ToString) -> CryptoError {
    CryptoError::key_generation_error("ECDSA", &e.to_string(), error_codes::KEY_ENCODING_FAILED)
}

fn recovery_error(e: impl ToString) -> CryptoError {
    CryptoError::key_generation_error("ECDSA", &e.to_string(), error_codes::KEY_RECOVERY_FAILED)
}

impl EcdsaPrivateKey {
    /// Draws a fresh private scalar from the OS CSPRNG
    pub fn generate(curve: EcdsaCurve) -> Self {
        match curve {
            EcdsaCurve::P224 => EcdsaPrivateKey::P224(p224::SecretKey::random(&mut OsRng)),
            EcdsaCurve::P256 => EcdsaPrivateKey::P256(p256::SecretKey::random(&mut OsRng)),
            EcdsaCurve::P384 => EcdsaPrivateKey::P384(p384::SecretKey::random(&mut OsRng)),
            EcdsaCurve::P521 => EcdsaPrivateKey::P521(p521::SecretKey::random(&mut OsRng)),
        }
    }

    /// Decodes a SEC1 DER private key on the given curve
    pub fn from_sec1_der(curve: EcdsaCurve, der: &[u8]) -> CryptoResult<Self> {
        let key = match curve {
            EcdsaCurve::P224 => p224::SecretKey::from_sec1_der(der).map(EcdsaPrivateKey::P224),
            EcdsaCurve::P256 => p256::SecretKey::from_sec1_der(der).map(EcdsaPrivateKey::P256),
            EcdsaCurve::P384 => p384::SecretKey::from_sec1_der(der).map(EcdsaPrivateKey::P384),
            EcdsaCurve::P521 => p521::SecretKey::from_sec1_der(der).map(EcdsaPrivateKey::P521),
        };
        key.map_err(recovery_error)
    }

    pub fn curve(&self) -> EcdsaCurve {
        match self {
            EcdsaPrivateKey::P224(_) => EcdsaCurve::P224,
            EcdsaPrivateKey::P256(_) => EcdsaCurve::P256,
            EcdsaPrivateKey::P384(_) => EcdsaCurve::P384,
            EcdsaPrivateKey::P521(_) => EcdsaCurve::P521,
        }
    }

    pub fn public_key(&self) -> EcdsaPublicKey {
        match self {
            EcdsaPrivateKey::P224(sk) => EcdsaPublicKey::P224(sk.public_key()),
            EcdsaPrivateKey::P256(sk) => EcdsaPublicKey::P256(sk.public_key()),
            EcdsaPrivateKey::P384(sk) => EcdsaPublicKey::P384(sk.public_key()),
            EcdsaPrivateKey::P521(sk) => EcdsaPublicKey::P521(sk.public_key()),
        }
    }

    /// Big-endian scalar bytes, sized to the curve's field
    pub(crate) fn scalar_bytes(&self) -> SecureBytes {
        each_curve!(self, EcdsaPrivateKey, sk => SecureBytes::new(sk.to_bytes().as_slice()))
    }

    pub fn to_sec1_der(&self) -> CryptoResult<SecureBytes> {
        let der = each_curve!(self, EcdsaPrivateKey, sk => sk.to_sec1_der())
            .map_err(encoding_error)?;
        Ok(SecureBytes::new(der.as_slice()))
    }

    pub fn to_pem(&self) -> CryptoResult<Zeroizing<String>> {
        each_curve!(self, EcdsaPrivateKey, sk => sk.to_sec1_pem(LineEnding::LF))
            .map_err(encoding_error)
    }
}

impl EcdsaPublicKey {
    /// Decodes a SEC1 encoded point on the given curve
    pub fn from_sec1_bytes(curve: EcdsaCurve, bytes: &[u8]) -> CryptoResult<Self> {
        let key = match curve {
            EcdsaCurve::P224 => p224::PublicKey::from_sec1_bytes(bytes).map(EcdsaPublicKey::P224),
            EcdsaCurve::P256 => p256::PublicKey::from_sec1_bytes(bytes).map(EcdsaPublicKey::P256),
            EcdsaCurve::P384 => p384::PublicKey::from_sec1_bytes(bytes).map(EcdsaPublicKey::P384),
            EcdsaCurve::P521 => p521::PublicKey::from_sec1_bytes(bytes).map(EcdsaPublicKey::P521),
        };
        key.map_err(recovery_error)
    }

    pub fn curve(&self) -> EcdsaCurve {
        match self {
            EcdsaPublicKey::P224(_) => EcdsaCurve::P224,
            EcdsaPublicKey::P256(_) => EcdsaCurve::P256,
            EcdsaPublicKey::P384(_) => EcdsaCurve::P384,
            EcdsaPublicKey::P521(_) => EcdsaCurve::P521,
        }
    }

    /// Uncompressed SEC1 point: `0x04 || X || Y`
    pub fn to_uncompressed_point(&self) -> Vec<u8> {
        each_curve!(self, EcdsaPublicKey, pk => pk.to_encoded_point(false).as_bytes().to_vec())
    }

    /// SubjectPublicKeyInfo PEM
    pub fn to_pem(&self) -> CryptoResult<String> {
        each_curve!(self, EcdsaPublicKey, pk => pk.to_public_key_pem(LineEnding::LF))
            .map_err(encoding_error)
    }
}

/// Generator for ECDSA key pairs on one curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaKeyGenerator {
    curve: EcdsaCurve,
}

impl EcdsaKeyGenerator {
    pub fn new(curve: EcdsaCurve) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> EcdsaCurve {
        self.curve
    }

    pub fn gen_opt(&self) -> KeyGenOpt {
        KeyGenOpt::from_ecdsa_curve(self.curve)
    }

    /// Generates a fresh key pair and returns `(private, public)`
    pub fn generate(&self) -> CryptoResult<(Key, Key)> {
        let private = Key::from_material(KeyMaterial::EcdsaPrivate(EcdsaPrivateKey::generate(
            self.curve,
        )))?;
        let public = private.public_key();
        log::debug!("Generated {} key {}", self.gen_opt(), private.id());

        Ok((private, public))
    }

    /// Rebuilds a key from SEC1 DER (private) or an uncompressed point (public)
    pub fn recover(&self, key_bytes: &[u8], is_private: bool) -> CryptoResult<Key> {
        let material = if is_private {
            KeyMaterial::EcdsaPrivate(EcdsaPrivateKey::from_sec1_der(self.curve, key_bytes)?)
        } else {
            KeyMaterial::EcdsaPublic(EcdsaPublicKey::from_sec1_bytes(self.curve, key_bytes)?)
        };
        Key::from_material(material)
    }
}
