/*!
 * Key Management System for asymmetric keys
 *
 * Password-based key derivation, the encrypted on-disk keystore and the
 * stateful key manager built on top of it.
 */

pub mod manager;
pub mod password;
pub mod storage;

#[cfg(test)]
mod tests;

pub use manager::{KeyManager, KeyManagerConfig};
pub use password::{derive_key, generate_salt, Argon2Params, KdfOpts, ScryptParams, SALT_LEN};
pub use storage::{
    list_key_ids, load_key, read_key_file, store_key, EncryptionHints, KeyFile, KeyLoader,
    KeyStorer,
};
