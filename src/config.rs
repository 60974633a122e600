//! Configuration
//!
//! A flat record of algorithm choices and directories. `Config::new` fills
//! it from a security level; the record can also be saved and loaded as
//! JSON.

use std::convert::TryFrom;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aes::{CipherMode, EncOpts};
use crate::cert::{CrlFailurePolicy, HttpCrlFetcher, TrustValidator};
use crate::error::{CryptoError, CryptoResult};
use crate::hashing::HashOpt;
use crate::key::KeyGenOpt;
use crate::key_management::{KdfOpts, KeyManagerConfig};
use crate::secure_memory::SecureBytes;

pub const DEFAULT_KEY_DIR: &str = "./.keys";
pub const DEFAULT_CERT_DIR: &str = "./.certs";
pub const DEFAULT_CRL_TIMEOUT_SECS: u64 = 10;

/// Security strength in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SecurityLevel {
    Level128,
    #[default]
    Level192,
    Level256,
}

impl SecurityLevel {
    pub fn bits(&self) -> u32 {
        match self {
            SecurityLevel::Level128 => 128,
            SecurityLevel::Level192 => 192,
            SecurityLevel::Level256 => 256,
        }
    }

    pub fn key_gen_opt(&self) -> KeyGenOpt {
        match self {
            SecurityLevel::Level128 => KeyGenOpt::Ecdsa256,
            SecurityLevel::Level192 => KeyGenOpt::Ecdsa384,
            SecurityLevel::Level256 => KeyGenOpt::Ecdsa521,
        }
    }

    pub fn hash_opt(&self) -> HashOpt {
        match self {
            SecurityLevel::Level128 => HashOpt::Sha256,
            SecurityLevel::Level192 => HashOpt::Sha384,
            SecurityLevel::Level256 => HashOpt::Sha512,
        }
    }

    /// AES key length in bytes
    pub fn aes_key_len(&self) -> usize {
        match self {
            SecurityLevel::Level128 => 16,
            SecurityLevel::Level192 => 24,
            SecurityLevel::Level256 => 32,
        }
    }
}

impl TryFrom<u32> for SecurityLevel {
    type Error = CryptoError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            128 => Ok(SecurityLevel::Level128),
            192 => Ok(SecurityLevel::Level192),
            256 => Ok(SecurityLevel::Level256),
            other => Err(CryptoError::invalid_parameter(
                "security level",
                "128, 192 or 256",
                &other.to_string(),
            )),
        }
    }
}

impl From<SecurityLevel> for u32 {
    fn from(level: SecurityLevel) -> u32 {
        level.bits()
    }
}

/// Resolved algorithm choices and locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub key_dir: PathBuf,
    pub cert_dir: PathBuf,
    pub key_gen_opt: KeyGenOpt,
    pub enc_opts: EncOpts,
    pub kdf_opts: KdfOpts,
    pub hash_opt: HashOpt,
    pub crl_timeout_secs: u64,
    pub crl_failure_policy: CrlFailurePolicy,
}

impl Config {
    pub fn new(level: SecurityLevel) -> Self {
        Self {
            key_dir: PathBuf::from(DEFAULT_KEY_DIR),
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            key_gen_opt: level.key_gen_opt(),
            enc_opts: EncOpts {
                key_len: level.aes_key_len(),
                mode: CipherMode::Ctr,
                ..EncOpts::default()
            },
            kdf_opts: KdfOpts::default(),
            hash_opt: level.hash_opt(),
            crl_timeout_secs: DEFAULT_CRL_TIMEOUT_SECS,
            crl_failure_policy: CrlFailurePolicy::default(),
        }
    }

    /// Loads a JSON config file and validates its options
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> CryptoResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> CryptoResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn validate(&self) -> CryptoResult<()> {
        self.key_gen_opt.ensure_valid()?;
        self.enc_opts.validate()?;
        self.kdf_opts.validate()?;
        if self.crl_timeout_secs == 0 {
            return Err(CryptoError::invalid_parameter(
                "crl_timeout_secs",
                "a positive number of seconds",
                "0",
            ));
        }
        Ok(())
    }

    pub fn crl_timeout(&self) -> Duration {
        Duration::from_secs(self.crl_timeout_secs)
    }

    /// Key manager settings for this config's key directory
    pub fn key_manager_config(&self, password: SecureBytes) -> KeyManagerConfig {
        KeyManagerConfig {
            key_dir: self.key_dir.clone(),
            password,
            enc_opts: self.enc_opts.clone(),
            kdf_opts: self.kdf_opts,
        }
    }

    /// HTTP backed trust validator with the configured timeout and policy
    pub fn trust_validator(&self) -> CryptoResult<TrustValidator> {
        let fetcher = HttpCrlFetcher::new(self.crl_timeout())?;
        Ok(TrustValidator::new(Box::new(fetcher), self.crl_failure_policy))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(SecurityLevel::default())
    }
}
