use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Nonce};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use ctr::cipher::{KeyIvInit, StreamCipher};
use serde::{Deserialize, Serialize};

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::key::Key;
use crate::secure_memory::SecureBytes;
use crate::utils;

/// Length of the CTR initial counter block prepended to the ciphertext
pub const CTR_IV_LEN: usize = 16;

/// Length of the GCM nonce prepended to the ciphertext
pub const GCM_NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag appended to the ciphertext
pub const GCM_TAG_LEN: usize = 16;

const ALGORITHM: &str = "AES";

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes192Ctr = ctr::Ctr128BE<Aes192>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type Aes192Gcm = AesGcm<Aes192, U12>;

/// Block cipher mode of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherMode {
    /// Counter mode; confidentiality only
    #[serde(rename = "CTR")]
    Ctr,
    /// Galois/counter mode; the tag authenticates the wrapped key
    #[serde(rename = "GCM")]
    Gcm,
}

/// Symmetric encryption options stored in key file hints
///
/// Serialized as `{"Algorithm": "AES", "KeyLen": 24, "OpMode": "CTR"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncOpts {
    #[serde(rename = "Algorithm")]
    pub algorithm: String,
    /// AES key length in bytes (16, 24 or 32)
    #[serde(rename = "KeyLen")]
    pub key_len: usize,
    #[serde(rename = "OpMode")]
    pub mode: CipherMode,
}

impl Default for EncOpts {
    fn default() -> Self {
        Self {
            algorithm: ALGORITHM.to_string(),
            key_len: 24,
            mode: CipherMode::Ctr,
        }
    }
}

impl EncOpts {
    /// Create validated AES options
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `key_len` is not 16, 24 or 32
    pub fn new(key_len: usize, mode: CipherMode) -> CryptoResult<Self> {
        let opts = Self {
            algorithm: ALGORITHM.to_string(),
            key_len,
            mode,
        };
        opts.validate()?;
        Ok(opts)
    }

    /// Checks the algorithm name and key length
    pub fn validate(&self) -> CryptoResult<()> {
        if self.algorithm != ALGORITHM {
            return Err(CryptoError::invalid_parameter(
                "Algorithm",
                ALGORITHM,
                &self.algorithm,
            ));
        }

        if !matches!(self.key_len, 16 | 24 | 32) {
            return Err(CryptoError::InvalidParameter {
                parameter: "KeyLen".to_string(),
                expected: "16, 24 or 32 bytes".to_string(),
                actual: format!("{} bytes", self.key_len),
                error_code: error_codes::AES_INVALID_KEY_SIZE,
            });
        }

        Ok(())
    }
}

fn check_key(key: &[u8], opts: &EncOpts) -> CryptoResult<()> {
    opts.validate()?;
    if key.len() != opts.key_len {
        return Err(CryptoError::InvalidParameter {
            parameter: "key".to_string(),
            expected: format!("{} bytes", opts.key_len),
            actual: format!("{} bytes", key.len()),
            error_code: error_codes::AES_INVALID_KEY_SIZE,
        });
    }
    Ok(())
}

fn apply_keystream<C: KeyIvInit + StreamCipher>(
    key: &[u8],
    iv: &[u8],
    buffer: &mut [u8],
) -> CryptoResult<()> {
    let mut cipher = C::new_from_slices(key, iv)
        .map_err(|e| CryptoError::encryption_failure(&format!("AES-CTR setup failed: {}", e)))?;
    cipher
        .try_apply_keystream(buffer)
        .map_err(|e| CryptoError::encryption_failure(&format!("AES-CTR keystream exhausted: {}", e)))
}

fn ctr_keystream(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> CryptoResult<()> {
    match key.len() {
        16 => apply_keystream::<Aes128Ctr>(key, iv, buffer),
        24 => apply_keystream::<Aes192Ctr>(key, iv, buffer),
        _ => apply_keystream::<Aes256Ctr>(key, iv, buffer),
    }
}

fn gcm_seal<A: Aead + KeyInit>(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = A::new_from_slice(key)
        .map_err(|e| CryptoError::encryption_failure(&format!("AES-GCM setup failed: {}", e)))?;
    cipher
        .encrypt(Nonce::<A>::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::encryption_failure(&format!("AES-GCM encryption failed: {}", e)))
}

fn gcm_open<A: Aead + KeyInit>(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = A::new_from_slice(key).map_err(|e| {
        CryptoError::decryption_failure(
            &format!("AES-GCM setup failed: {}", e),
            error_codes::AES_DECRYPTION_FAILED,
        )
    })?;
    cipher
        .decrypt(Nonce::<A>::from_slice(nonce), ciphertext)
        .map_err(|_| {
            CryptoError::decryption_failure(
                "AES-GCM authentication tag mismatch",
                error_codes::AES_AUTHENTICATION_FAILED,
            )
        })
}

/// Encrypt bytes under a derived key
///
/// # Arguments
///
/// * `plaintext` - The data to encrypt
/// * `key` - Symmetric key of exactly `opts.key_len` bytes
/// * `opts` - Key length and mode
///
/// # Returns
///
/// `IV || ciphertext` in CTR mode, `nonce || ciphertext || tag` in GCM mode.
/// A fresh IV or nonce is drawn for every call.
///
/// # Examples
///
/// ```
/// use qasa_pki::aes::{decrypt, encrypt, CipherMode, EncOpts};
///
/// let opts = EncOpts::new(32, CipherMode::Ctr).unwrap();
/// let key = [0x42u8; 32];
///
/// let ciphertext = encrypt(b"key material", &key, &opts).unwrap();
/// let plaintext = decrypt(&ciphertext, &key, &opts).unwrap();
/// assert_eq!(plaintext.as_bytes(), b"key material");
/// ```
pub fn encrypt(plaintext: &[u8], key: &[u8], opts: &EncOpts) -> CryptoResult<Vec<u8>> {
    check_key(key, opts)?;

    match opts.mode {
        CipherMode::Ctr => {
            let mut output = utils::random_bytes(CTR_IV_LEN)?;
            output.extend_from_slice(plaintext);
            let (iv, body) = output.split_at_mut(CTR_IV_LEN);
            ctr_keystream(key, iv, body)?;
            Ok(output)
        }
        CipherMode::Gcm => {
            let nonce = utils::random_bytes(GCM_NONCE_LEN)?;
            let sealed = match key.len() {
                16 => gcm_seal::<Aes128Gcm>(key, &nonce, plaintext)?,
                24 => gcm_seal::<Aes192Gcm>(key, &nonce, plaintext)?,
                _ => gcm_seal::<Aes256Gcm>(key, &nonce, plaintext)?,
            };
            let mut output = nonce;
            output.extend_from_slice(&sealed);
            Ok(output)
        }
    }
}

/// Decrypt bytes produced by [`encrypt`]
///
/// In CTR mode a wrong key yields garbage rather than an error; callers must
/// check the result themselves. In GCM mode a wrong key or any modification
/// of the ciphertext fails with `DecryptionFailure`.
pub fn decrypt(ciphertext: &[u8], key: &[u8], opts: &EncOpts) -> CryptoResult<SecureBytes> {
    check_key(key, opts)?;

    match opts.mode {
        CipherMode::Ctr => {
            if ciphertext.len() < CTR_IV_LEN {
                return Err(CryptoError::decryption_failure(
                    "ciphertext shorter than the AES-CTR IV",
                    error_codes::AES_DECRYPTION_FAILED,
                ));
            }
            let (iv, body) = ciphertext.split_at(CTR_IV_LEN);
            let mut plaintext = SecureBytes::new(body);
            ctr_keystream(key, iv, plaintext.as_bytes_mut()).map_err(|e| {
                CryptoError::decryption_failure(&e.to_string(), error_codes::AES_DECRYPTION_FAILED)
            })?;
            Ok(plaintext)
        }
        CipherMode::Gcm => {
            if ciphertext.len() < GCM_NONCE_LEN + GCM_TAG_LEN {
                return Err(CryptoError::decryption_failure(
                    "ciphertext shorter than the AES-GCM nonce and tag",
                    error_codes::AES_DECRYPTION_FAILED,
                ));
            }
            let (nonce, body) = ciphertext.split_at(GCM_NONCE_LEN);
            let opened = match key.len() {
                16 => gcm_open::<Aes128Gcm>(key, nonce, body)?,
                24 => gcm_open::<Aes192Gcm>(key, nonce, body)?,
                _ => gcm_open::<Aes256Gcm>(key, nonce, body)?,
            };
            Ok(SecureBytes::from(opened))
        }
    }
}

/// Encrypt the canonical raw bytes of a key
pub fn encrypt_key(key: &Key, derived_key: &SecureBytes, opts: &EncOpts) -> CryptoResult<Vec<u8>> {
    let raw = key.to_raw_bytes()?;
    encrypt(raw.as_bytes(), derived_key.as_bytes(), opts)
}

/// Decrypt wrapped key bytes; the result still has to be recovered into a `Key`
pub fn decrypt_key(
    ciphertext: &[u8],
    derived_key: &SecureBytes,
    opts: &EncOpts,
) -> CryptoResult<SecureBytes> {
    decrypt(ciphertext, derived_key.as_bytes(), opts)
}
