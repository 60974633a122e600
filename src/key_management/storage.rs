//! Password-protected key files
//!
//! One JSON file per key, named by the key identifier. The private key bytes
//! are encrypted under a key derived from the password and a fresh salt; the
//! parameters needed to reverse this are stored alongside as hints.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aes::{decrypt_key, encrypt_key, EncOpts};
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::key::{Key, KeyGenOpt, KeyId, KeyRecoverer};
use crate::key_management::password::{derive_key, generate_salt, KdfOpts};
use crate::utils;

#[cfg(unix)]
use std::os::unix::fs::DirBuilderExt;

/// Permission bits of key files on unix (owner read/write)
pub const KEY_FILE_MODE: u32 = 0o600;

/// Parameters needed to re-derive the key and decrypt a key file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionHints {
    #[serde(rename = "EncOpt")]
    pub enc_opts: EncOpts,
    #[serde(rename = "KDFOpt")]
    pub kdf_opts: KdfOpts,
    #[serde(rename = "KDFSalt", with = "base64_bytes")]
    pub kdf_salt: Vec<u8>,
}

/// On-disk record of an encrypted key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    #[serde(rename = "SKI", with = "base64_bytes")]
    pub ski: Vec<u8>,
    /// Option token, parsed explicitly on load so an unknown token is reported as such
    #[serde(rename = "KeyGenOpt")]
    pub key_gen_opt: String,
    #[serde(rename = "IsPrivate")]
    pub is_private: bool,
    /// Hex encoded ciphertext
    #[serde(rename = "EncryptedKey")]
    pub encrypted_key: String,
    #[serde(rename = "Hints")]
    pub hints: EncryptionHints,
}

mod base64_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::decode(encoded).map_err(de::Error::custom)
    }
}

fn ensure_path(dir: &Path) -> CryptoResult<()> {
    if dir.as_os_str().is_empty() {
        return Err(CryptoError::EmptyKeyPath {
            error_code: error_codes::EMPTY_KEY_PATH,
        });
    }
    Ok(())
}

/// Creates the key directory (owner-only on unix) if it does not exist yet
fn create_key_dir(dir: &Path) -> CryptoResult<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir)?;
    Ok(())
}

/// Encrypts `key` under `password` and writes it into `dir`
///
/// # Arguments
///
/// * `key` - Key to persist
/// * `password` - Password the wrapping key is derived from
/// * `dir` - Key directory, created if missing
/// * `enc_opts` - Cipher used to wrap the key
/// * `kdf_opts` - Function used to derive the wrapping key
///
/// # Returns
///
/// The identifier the key file is stored under. If a file with that
/// identifier already exists it is left untouched and the call still succeeds.
pub fn store_key(
    key: &Key,
    password: &[u8],
    dir: &Path,
    enc_opts: &EncOpts,
    kdf_opts: &KdfOpts,
) -> CryptoResult<KeyId> {
    key.gen_opt().ensure_valid()?;
    ensure_path(dir)?;
    enc_opts.validate()?;
    kdf_opts.validate()?;

    create_key_dir(dir)?;
    let key_id = key.id();
    let path = dir.join(key_id.as_str());

    if path.exists() {
        log::info!("Key file {} already exists, not overwriting", key_id);
        return Ok(key_id);
    }

    let salt = generate_salt()?;
    let derived = derive_key(password, &salt, enc_opts.key_len, kdf_opts)?;
    let ciphertext = encrypt_key(key, &derived, enc_opts)?;

    let key_file = KeyFile {
        ski: key.ski().to_vec(),
        key_gen_opt: key.gen_opt().to_string(),
        is_private: key.is_private(),
        encrypted_key: hex::encode(ciphertext),
        hints: EncryptionHints {
            enc_opts: enc_opts.clone(),
            kdf_opts: *kdf_opts,
            kdf_salt: salt,
        },
    };
    let contents = serde_json::to_vec_pretty(&key_file)?;

    if utils::write_new_file(&path, &contents, KEY_FILE_MODE)? {
        log::info!("Stored {} key {}", key.gen_opt(), key_id);
    } else {
        log::info!("Key file {} appeared concurrently, not overwriting", key_id);
    }

    Ok(key_id)
}

/// Finds the file named `key_id` inside `dir`
fn find_key_file(key_id: &KeyId, dir: &Path) -> CryptoResult<PathBuf> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == key_id.as_str() {
            return Ok(entry.path());
        }
    }

    Err(CryptoError::WrongKeyId {
        key_id: key_id.to_string(),
        error_code: error_codes::WRONG_KEY_ID,
    })
}

/// Reads and parses the key file stored under `key_id`
pub fn read_key_file(key_id: &str, dir: &Path) -> CryptoResult<KeyFile> {
    ensure_path(dir)?;
    if !dir.is_dir() {
        return Err(CryptoError::KeyDirectoryMissing {
            path: dir.display().to_string(),
            error_code: error_codes::KEY_DIRECTORY_MISSING,
        });
    }

    let key_id = KeyId::parse(key_id)?;
    let path = find_key_file(&key_id, dir)?;
    let contents = fs::read(path)?;
    Ok(serde_json::from_slice(&contents)?)
}

/// Loads and decrypts the key stored under `key_id`
///
/// # Errors
///
/// * `KeyDirectoryMissing` - `dir` does not exist; nothing is scanned
/// * `InvalidKeyId` - `key_id` has the wrong prefix or shape
/// * `WrongKeyId` - no file with that name exists in `dir`
/// * `IntegrityMismatch` - the file does not belong to `key_id`, or the
///   decrypted bytes do not reproduce the stored SKI (wrong password or
///   tampering)
/// * `DecryptionFailure` - the cipher rejected the ciphertext
pub fn load_key(
    key_id: &str,
    password: &[u8],
    dir: &Path,
    recoverer: &dyn KeyRecoverer,
) -> CryptoResult<Key> {
    let key_file = read_key_file(key_id, dir)?;
    let key_id = KeyId::parse(key_id)?;

    if !key_id.matches_ski(&key_file.ski) {
        log::warn!("Key file {} does not carry the SKI of its identifier", key_id);
        return Err(CryptoError::integrity_mismatch(
            key_id.as_str(),
            "stored SKI does not match the key identifier",
        ));
    }

    let gen_opt: KeyGenOpt = key_file.key_gen_opt.parse()?;
    let hints = &key_file.hints;
    hints.enc_opts.validate()?;
    hints.kdf_opts.validate()?;

    let derived = derive_key(
        password,
        &hints.kdf_salt,
        hints.enc_opts.key_len,
        &hints.kdf_opts,
    )?;

    let ciphertext = hex::decode(&key_file.encrypted_key).map_err(|e| {
        CryptoError::SerializationError(format!("EncryptedKey is not valid hex: {}", e))
    })?;
    let key_bytes = decrypt_key(&ciphertext, &derived, &hints.enc_opts)?;

    let key = recoverer
        .recover_key(key_bytes.as_bytes(), gen_opt, key_file.is_private)
        .map_err(|e| match e {
            CryptoError::InvalidKeyGenOption { .. } => e,
            other => {
                log::warn!("Decrypted key {} does not decode: {}", key_id, other);
                CryptoError::integrity_mismatch(
                    key_id.as_str(),
                    "decrypted key material does not decode",
                )
            }
        })?;

    if !utils::constant_time_eq(key.ski(), &key_file.ski) {
        log::warn!("Recovered key does not match SKI of {}", key_id);
        return Err(CryptoError::integrity_mismatch(
            key_id.as_str(),
            "recovered key SKI differs from stored SKI",
        ));
    }

    log::debug!("Loaded {} key {}", gen_opt, key_id);
    Ok(key)
}

/// Identifiers of all key files in `dir`, sorted
///
/// Files whose names are not key identifiers are ignored.
pub fn list_key_ids(dir: &Path) -> CryptoResult<Vec<KeyId>> {
    ensure_path(dir)?;
    if !dir.is_dir() {
        return Err(CryptoError::KeyDirectoryMissing {
            path: dir.display().to_string(),
            error_code: error_codes::KEY_DIRECTORY_MISSING,
        });
    }

    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if let Ok(id) = KeyId::parse(name) {
                ids.push(id);
            }
        }
    }
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(ids)
}

/// Stores keys with a fixed set of options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStorer {
    pub enc_opts: EncOpts,
    pub kdf_opts: KdfOpts,
}

impl KeyStorer {
    pub fn new(enc_opts: EncOpts, kdf_opts: KdfOpts) -> Self {
        Self { enc_opts, kdf_opts }
    }

    pub fn store(&self, key: &Key, password: &[u8], dir: &Path) -> CryptoResult<KeyId> {
        store_key(key, password, dir, &self.enc_opts, &self.kdf_opts)
    }
}

/// Loads keys through a fixed recoverer
#[derive(Debug, Clone)]
pub struct KeyLoader<R: KeyRecoverer> {
    recoverer: R,
}

impl<R: KeyRecoverer> KeyLoader<R> {
    pub fn new(recoverer: R) -> Self {
        Self { recoverer }
    }

    pub fn load(&self, key_id: &str, password: &[u8], dir: &Path) -> CryptoResult<Key> {
        load_key(key_id, password, dir, &self.recoverer)
    }
}
