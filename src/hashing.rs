//! Digest dispatch
//!
//! Maps a `HashOpt` to the matching SHA-2 function. Tokens follow the same
//! rules as key generation options: one lowercase token per option.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::error::{CryptoError, CryptoResult};

/// Supported digest functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashOpt {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashOpt {
    pub const ALL: [HashOpt; 4] = [
        HashOpt::Sha224,
        HashOpt::Sha256,
        HashOpt::Sha384,
        HashOpt::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashOpt::Sha224 => "sha224",
            HashOpt::Sha256 => "sha256",
            HashOpt::Sha384 => "sha384",
            HashOpt::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            HashOpt::Sha224 => 28,
            HashOpt::Sha256 => 32,
            HashOpt::Sha384 => 48,
            HashOpt::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashOpt {
    type Err = CryptoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        HashOpt::ALL
            .iter()
            .copied()
            .find(|opt| opt.as_str() == raw)
            .ok_or_else(|| CryptoError::invalid_parameter("hash option", "sha224|sha256|sha384|sha512", raw))
    }
}

impl Serialize for HashOpt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HashOpt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Hashes `data` with the selected function
///
/// # Errors
///
/// `InvalidParameter` when `data` is empty
pub fn hash(data: &[u8], opt: HashOpt) -> CryptoResult<Vec<u8>> {
    if data.is_empty() {
        return Err(CryptoError::invalid_parameter(
            "data",
            "non-empty input",
            "empty input",
        ));
    }

    let digest = match opt {
        HashOpt::Sha224 => Sha224::digest(data).to_vec(),
        HashOpt::Sha256 => Sha256::digest(data).to_vec(),
        HashOpt::Sha384 => Sha384::digest(data).to_vec(),
        HashOpt::Sha512 => Sha512::digest(data).to_vec(),
    };
    Ok(digest)
}
