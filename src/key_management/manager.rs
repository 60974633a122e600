//! Key lifecycle for a single identity
//!
//! A `KeyManager` owns one key directory and at most one key pair. The pair
//! is cached after the first generate or load; later calls return the cached
//! pair without touching the disk. Instances are not synchronised, so share
//! one across threads only behind a `Mutex`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::aes::EncOpts;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::key::{Key, KeyGenOpt, KeyRegistry};
use crate::key_management::password::KdfOpts;
use crate::key_management::storage;
use crate::secure_memory::SecureBytes;

/// Settings for a `KeyManager`
#[derive(Clone)]
pub struct KeyManagerConfig {
    /// Directory holding this identity's key file
    pub key_dir: PathBuf,
    /// Password protecting the key file; zeroed when the config is dropped
    pub password: SecureBytes,
    pub enc_opts: EncOpts,
    pub kdf_opts: KdfOpts,
}

impl KeyManagerConfig {
    /// Config with default cipher and KDF options
    pub fn new<P: AsRef<Path>>(key_dir: P, password: SecureBytes) -> Self {
        Self {
            key_dir: key_dir.as_ref().to_path_buf(),
            password,
            enc_opts: EncOpts::default(),
            kdf_opts: KdfOpts::default(),
        }
    }
}

impl fmt::Debug for KeyManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManagerConfig")
            .field("key_dir", &self.key_dir)
            .field("password", &"[REDACTED]")
            .field("enc_opts", &self.enc_opts)
            .field("kdf_opts", &self.kdf_opts)
            .finish()
    }
}

/// Stateful owner of one identity's key pair
pub struct KeyManager {
    config: KeyManagerConfig,
    registry: KeyRegistry,
    cached: Option<(Key, Key)>,
}

impl KeyManager {
    /// Creates a manager in the empty state
    pub fn new(config: KeyManagerConfig, registry: KeyRegistry) -> Self {
        Self {
            config,
            registry,
            cached: None,
        }
    }

    pub fn key_dir(&self) -> &Path {
        &self.config.key_dir
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Whether a key pair is held in memory
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Replaces this identity's key with a freshly generated pair
    ///
    /// Everything inside the key directory is deleted first; this cannot be
    /// undone. The option is checked against the registry before anything is
    /// removed.
    ///
    /// # Returns
    ///
    /// The new `(private, public)` pair
    pub fn generate_key(&mut self, opt: KeyGenOpt) -> CryptoResult<(Key, Key)> {
        let generator = *self.registry.get(opt)?;

        self.cached = None;
        self.remove_keys()?;

        let (private, public) = generator.generate()?;
        let key_id = storage::store_key(
            &private,
            self.config.password.as_bytes(),
            &self.config.key_dir,
            &self.config.enc_opts,
            &self.config.kdf_opts,
        )?;
        log::info!("Generated new {} identity key {}", opt, key_id);

        self.cached = Some((private.clone(), public.clone()));
        Ok((private, public))
    }

    /// Returns the identity's key pair, loading it from disk if not cached
    ///
    /// # Errors
    ///
    /// * `KeyDirectoryMissing` - no key has been generated in this directory
    /// * `WrongKeyId` - the directory holds no key file
    /// * `InvalidParameter` - the directory holds more than one key file
    /// * any error of `storage::load_key`
    pub fn get_key(&mut self) -> CryptoResult<(Key, Key)> {
        if let Some((private, public)) = &self.cached {
            return Ok((private.clone(), public.clone()));
        }

        let ids = storage::list_key_ids(&self.config.key_dir)?;
        let key_id = match ids.as_slice() {
            [key_id] => key_id,
            [] => {
                return Err(CryptoError::WrongKeyId {
                    key_id: String::new(),
                    error_code: error_codes::WRONG_KEY_ID,
                })
            }
            _ => {
                return Err(CryptoError::invalid_parameter(
                    "key_dir",
                    "exactly one key file",
                    &format!("{} key files", ids.len()),
                ))
            }
        };

        let private = storage::load_key(
            key_id.as_str(),
            self.config.password.as_bytes(),
            &self.config.key_dir,
            &self.registry,
        )?;
        let public = private.public_key();

        self.cached = Some((private.clone(), public.clone()));
        Ok((private, public))
    }

    /// Drops the cached pair; the next `get_key` reads from disk
    pub fn clear(&mut self) {
        self.cached = None;
    }

    fn remove_keys(&self) -> CryptoResult<()> {
        let dir = &self.config.key_dir;
        if dir.as_os_str().is_empty() {
            return Err(CryptoError::EmptyKeyPath {
                error_code: error_codes::EMPTY_KEY_PATH,
            });
        }

        if dir.exists() {
            log::warn!("Removing existing key material in {}", dir.display());
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("config", &self.config)
            .field("cached", &self.cached.as_ref().map(|(private, _)| private.id()))
            .finish()
    }
}
