/*!
 * QaSa PKI
 *
 * Algorithm-agnostic key handling for a small public key infrastructure:
 *
 * - RSA and ECDSA key pairs selected through a registry of generation options
 * - A password-protected keystore (scrypt or Argon2id, then AES-CTR or AES-GCM)
 * - A key manager that owns one identity's key pair
 * - A certificate store and a validator for chains of trust and CRL revocation
 *
 * Keys and certificates share one identifier, derived from the public key,
 * so a key pair and the certificate for it are looked up the same way.
 */

/// AES encryption of key material
pub mod aes;

/// X.509 certificate store, chain validation and revocation checks
pub mod cert;

/// Algorithm and directory configuration per security level
pub mod config;

/// Common error types
pub mod error;

/// SHA-2 digest dispatch
pub mod hashing;

/// Key generation options, key entities and signing
pub mod key;

/// Keystore and key manager
pub mod key_management;

/// Secure memory handling utilities
pub mod secure_memory;

/// Utilities for cryptographic operations
pub mod utils;

// Re-export main types for convenience
pub use cert::{Certificate, CrlFailurePolicy, TrustValidator};
pub use config::{Config, SecurityLevel};
pub use error::{CryptoError, CryptoResult};
pub use key::{Key, KeyGenOpt, KeyId, KeyRegistry};
pub use key_management::{KeyManager, KeyManagerConfig};

/// The most commonly used types and functions
pub mod prelude {
    pub use crate::aes::{CipherMode, EncOpts};
    pub use crate::cert::{
        load_cert, store_cert, Certificate, CrlFailurePolicy, CrlFetcher, HttpCrlFetcher,
        TrustValidator,
    };
    pub use crate::config::{Config, SecurityLevel};
    pub use crate::hashing::{hash, HashOpt};
    pub use crate::key::signer::{sign, verify};
    pub use crate::key::{generate_key, Key, KeyGenOpt, KeyId, KeyRegistry};
    pub use crate::key_management::{
        load_key, store_key, KdfOpts, KeyLoader, KeyManager, KeyManagerConfig, KeyStorer,
    };
    pub use crate::secure_memory::{with_secure_scope, SecureBuffer, SecureBytes};
    pub use crate::CryptoError;
    pub use crate::CryptoResult;
}
