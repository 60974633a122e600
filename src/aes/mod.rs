/*!
 * AES key wrapping
 *
 * Encrypts the canonical bytes of a private key under a password-derived
 * key. AES-CTR is the default and carries no integrity tag, so the keystore
 * detects wrong passwords and tampering by recomputing the SKI. AES-GCM is
 * available for new key files and reports tag failures directly.
 */

mod aes;

pub use aes::*;
