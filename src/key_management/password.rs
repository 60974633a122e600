//! Password-based key derivation for the keystore
//!
//! Work parameters come back from key files on disk, so both functions are
//! bounded before anything is allocated.

use argon2::{Algorithm, Argon2, Version};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;
use crate::utils;

/// Length in bytes of the salt drawn for every stored key
pub const SALT_LEN: usize = 8;

/// Largest accepted scrypt cost exponent (N = 2^22)
pub const MAX_SCRYPT_LOG_N: u32 = 22;
/// Upper bound on scrypt `R * P`
pub const MAX_SCRYPT_RP: u64 = 64;
/// Upper bound on the scrypt working set (128 * R * N bytes)
pub const MAX_SCRYPT_MEMORY: u64 = 1 << 30;
/// Upper bound on Argon2 memory cost in KiB
pub const MAX_ARGON2_MEMORY_KIB: u32 = 1 << 20;
/// Upper bound on Argon2 iterations
pub const MAX_ARGON2_TIME_COST: u32 = 64;
/// Upper bound on Argon2 lanes
pub const MAX_ARGON2_PARALLELISM: u32 = 64;

/// scrypt work parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    /// CPU/memory cost, a power of two greater than 1
    #[serde(rename = "N")]
    pub n: u64,
    /// Block size
    #[serde(rename = "R")]
    pub r: u32,
    /// Parallelism
    #[serde(rename = "P")]
    pub p: u32,
}

impl Default for ScryptParams {
    fn default() -> Self {
        Self {
            n: 1 << 18,
            r: 8,
            p: 1,
        }
    }
}

/// Argon2id work parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost (in KB)
    #[serde(rename = "M")]
    pub memory_cost: u32,
    /// Time cost (iterations)
    #[serde(rename = "T")]
    pub time_cost: u32,
    /// Parallelism factor
    #[serde(rename = "P")]
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Key derivation function together with its parameters
///
/// Serialized as `{"KdfName": "scrypt", "KdfParams": {"N": .., "R": .., "P": ..}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "KdfName", content = "KdfParams")]
pub enum KdfOpts {
    #[serde(rename = "scrypt")]
    Scrypt(ScryptParams),
    #[serde(rename = "argon2id")]
    Argon2id(Argon2Params),
}

impl Default for KdfOpts {
    fn default() -> Self {
        KdfOpts::Scrypt(ScryptParams::default())
    }
}

impl KdfOpts {
    pub fn scrypt(n: u64, r: u32, p: u32) -> Self {
        KdfOpts::Scrypt(ScryptParams { n, r, p })
    }

    pub fn argon2id(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        KdfOpts::Argon2id(Argon2Params {
            memory_cost,
            time_cost,
            parallelism,
        })
    }

    /// Function name as stored in key files
    pub fn name(&self) -> &'static str {
        match self {
            KdfOpts::Scrypt(_) => "scrypt",
            KdfOpts::Argon2id(_) => "argon2id",
        }
    }

    /// Checks the parameters against the legal domain of the function
    pub fn validate(&self) -> CryptoResult<()> {
        match self {
            KdfOpts::Scrypt(params) => scrypt_params(params, 32).map(|_| ()),
            KdfOpts::Argon2id(params) => argon2_params(params, 32).map(|_| ()),
        }
    }
}

fn scrypt_params(params: &ScryptParams, output_len: usize) -> CryptoResult<scrypt::Params> {
    if params.n < 2 || !params.n.is_power_of_two() {
        return Err(CryptoError::kdf_parameter_error(
            "N",
            &format!("{} is not a power of two greater than 1", params.n),
        ));
    }

    if params.r == 0 || params.p == 0 {
        return Err(CryptoError::kdf_parameter_error(
            "R/P",
            "block size and parallelism must be non-zero",
        ));
    }

    let log_n = params.n.trailing_zeros();
    if log_n > MAX_SCRYPT_LOG_N {
        return Err(CryptoError::kdf_parameter_error(
            "N",
            &format!("2^{} exceeds the limit of 2^{}", log_n, MAX_SCRYPT_LOG_N),
        ));
    }

    let rp = u64::from(params.r) * u64::from(params.p);
    if rp > MAX_SCRYPT_RP {
        return Err(CryptoError::kdf_parameter_error(
            "R/P",
            &format!("R * P = {} exceeds the limit of {}", rp, MAX_SCRYPT_RP),
        ));
    }

    let memory = 128 * u64::from(params.r) * params.n;
    if memory > MAX_SCRYPT_MEMORY {
        return Err(CryptoError::kdf_parameter_error(
            "N/R",
            &format!("{} bytes of working memory exceeds the limit", memory),
        ));
    }

    let log_n = log_n as u8;
    scrypt::Params::new(log_n, params.r, params.p, output_len)
        .map_err(|e| CryptoError::kdf_parameter_error("scrypt", &e.to_string()))
}

fn argon2_params(params: &Argon2Params, output_len: usize) -> CryptoResult<argon2::Params> {
    if params.memory_cost > MAX_ARGON2_MEMORY_KIB {
        return Err(CryptoError::kdf_parameter_error(
            "M",
            &format!("{} KiB exceeds the limit of {} KiB", params.memory_cost, MAX_ARGON2_MEMORY_KIB),
        ));
    }
    if params.time_cost > MAX_ARGON2_TIME_COST {
        return Err(CryptoError::kdf_parameter_error(
            "T",
            &format!("{} iterations exceeds the limit of {}", params.time_cost, MAX_ARGON2_TIME_COST),
        ));
    }
    if params.parallelism > MAX_ARGON2_PARALLELISM {
        return Err(CryptoError::kdf_parameter_error(
            "P",
            &format!("{} lanes exceeds the limit of {}", params.parallelism, MAX_ARGON2_PARALLELISM),
        ));
    }

    argon2::Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(output_len),
    )
    .map_err(|e| CryptoError::kdf_parameter_error("argon2id", &e.to_string()))
}

/// Derives `output_len` bytes from a password and salt
///
/// # Arguments
///
/// * `password` - The password to derive a key from
/// * `salt` - Salt stored next to the encrypted key
/// * `output_len` - Length of the derived key in bytes
/// * `opts` - Function and work parameters
///
/// # Returns
///
/// The derived key, zeroed when dropped
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    output_len: usize,
    opts: &KdfOpts,
) -> CryptoResult<SecureBytes> {
    if output_len == 0 {
        return Err(CryptoError::kdf_parameter_error(
            "output_len",
            "derived key length must be non-zero",
        ));
    }

    let mut derived = SecureBytes::zeroed(output_len);

    match opts {
        KdfOpts::Scrypt(params) => {
            let params = scrypt_params(params, output_len)?;
            scrypt::scrypt(password, salt, &params, derived.as_bytes_mut())
                .map_err(|e| CryptoError::kdf_parameter_error("output_len", &e.to_string()))?;
        }
        KdfOpts::Argon2id(params) => {
            let params = argon2_params(params, output_len)?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(password, salt, derived.as_bytes_mut())
                .map_err(|e| CryptoError::kdf_parameter_error("argon2id", &e.to_string()))?;
        }
    }

    Ok(derived)
}

/// Generates a cryptographically secure random salt
pub fn generate_salt() -> CryptoResult<Vec<u8>> {
    utils::random_bytes(SALT_LEN)
}
