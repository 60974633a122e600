//! Key generation options
//!
//! A `KeyGenOpt` names an algorithm together with its parameter set. Each
//! defined option has exactly one lowercase string token, and parsing any
//! other string fails with `CryptoError::InvalidKeyGenOption`.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CryptoError, CryptoResult};

/// Key generation option (algorithm + parameter set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyGenOpt {
    Rsa1024,
    Rsa2048,
    Rsa4096,
    Ecdsa224,
    Ecdsa256,
    Ecdsa384,
    Ecdsa521,
    /// Placeholder for anything that is not a defined option
    Unknown,
}

/// Named NIST curves usable for ECDSA keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcdsaCurve {
    P224,
    P256,
    P384,
    P521,
}

impl EcdsaCurve {
    /// Standard curve name, e.g. `P-256`
    pub fn name(&self) -> &'static str {
        match self {
            EcdsaCurve::P224 => "P-224",
            EcdsaCurve::P256 => "P-256",
            EcdsaCurve::P384 => "P-384",
            EcdsaCurve::P521 => "P-521",
        }
    }

    /// Size of the curve order in bits
    pub fn bits(&self) -> usize {
        match self {
            EcdsaCurve::P224 => 224,
            EcdsaCurve::P256 => 256,
            EcdsaCurve::P384 => 384,
            EcdsaCurve::P521 => 521,
        }
    }
}

impl fmt::Display for EcdsaCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const UNKNOWN_TOKEN: &str = "unknown_keyGenOpt";

impl KeyGenOpt {
    /// Every defined option, in declaration order
    pub const ALL: [KeyGenOpt; 7] = [
        KeyGenOpt::Rsa1024,
        KeyGenOpt::Rsa2048,
        KeyGenOpt::Rsa4096,
        KeyGenOpt::Ecdsa224,
        KeyGenOpt::Ecdsa256,
        KeyGenOpt::Ecdsa384,
        KeyGenOpt::Ecdsa521,
    ];

    /// Returns `true` for every option except `Unknown`
    pub fn is_valid(&self) -> bool {
        !matches!(self, KeyGenOpt::Unknown)
    }

    /// Canonical lowercase token, e.g. `ecdsa384`
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyGenOpt::Rsa1024 => "rsa1024",
            KeyGenOpt::Rsa2048 => "rsa2048",
            KeyGenOpt::Rsa4096 => "rsa4096",
            KeyGenOpt::Ecdsa224 => "ecdsa224",
            KeyGenOpt::Ecdsa256 => "ecdsa256",
            KeyGenOpt::Ecdsa384 => "ecdsa384",
            KeyGenOpt::Ecdsa521 => "ecdsa521",
            KeyGenOpt::Unknown => UNKNOWN_TOKEN,
        }
    }

    /// Algorithm family name
    pub fn algorithm(&self) -> &'static str {
        match self {
            KeyGenOpt::Rsa1024 | KeyGenOpt::Rsa2048 | KeyGenOpt::Rsa4096 => "RSA",
            KeyGenOpt::Ecdsa224
            | KeyGenOpt::Ecdsa256
            | KeyGenOpt::Ecdsa384
            | KeyGenOpt::Ecdsa521 => "ECDSA",
            KeyGenOpt::Unknown => "UNKNOWN",
        }
    }

    /// Modulus length for RSA, curve size for ECDSA
    pub fn bits(&self) -> Option<usize> {
        self.rsa_bits()
            .or_else(|| self.ecdsa_curve().map(|curve| curve.bits()))
    }

    pub fn rsa_bits(&self) -> Option<usize> {
        match self {
            KeyGenOpt::Rsa1024 => Some(1024),
            KeyGenOpt::Rsa2048 => Some(2048),
            KeyGenOpt::Rsa4096 => Some(4096),
            _ => None,
        }
    }

    /// Maps an RSA modulus length to its option; `Unknown` for any other length
    pub fn from_rsa_bits(bits: usize) -> KeyGenOpt {
        match bits {
            1024 => KeyGenOpt::Rsa1024,
            2048 => KeyGenOpt::Rsa2048,
            4096 => KeyGenOpt::Rsa4096,
            _ => KeyGenOpt::Unknown,
        }
    }

    pub fn ecdsa_curve(&self) -> Option<EcdsaCurve> {
        match self {
            KeyGenOpt::Ecdsa224 => Some(EcdsaCurve::P224),
            KeyGenOpt::Ecdsa256 => Some(EcdsaCurve::P256),
            KeyGenOpt::Ecdsa384 => Some(EcdsaCurve::P384),
            KeyGenOpt::Ecdsa521 => Some(EcdsaCurve::P521),
            _ => None,
        }
    }

    pub fn from_ecdsa_curve(curve: EcdsaCurve) -> KeyGenOpt {
        match curve {
            EcdsaCurve::P224 => KeyGenOpt::Ecdsa224,
            EcdsaCurve::P256 => KeyGenOpt::Ecdsa256,
            EcdsaCurve::P384 => KeyGenOpt::Ecdsa384,
            EcdsaCurve::P521 => KeyGenOpt::Ecdsa521,
        }
    }

    /// Fails with `InvalidKeyGenOption` unless the option is defined
    pub fn ensure_valid(&self) -> CryptoResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(CryptoError::invalid_key_gen_option(self.as_str()))
        }
    }
}

impl fmt::Display for KeyGenOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyGenOpt {
    type Err = CryptoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        KeyGenOpt::ALL
            .iter()
            .copied()
            .find(|opt| opt.as_str() == raw)
            .ok_or_else(|| CryptoError::invalid_key_gen_option(raw))
    }
}

impl Serialize for KeyGenOpt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KeyGenOpt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
