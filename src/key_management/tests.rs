use std::fs;

use tempfile::TempDir;

use super::*;
use crate::aes::{CipherMode, EncOpts};
use crate::error::CryptoError;
use crate::key::{generate_key, KeyGenOpt, KeyRegistry};
use crate::secure_memory::SecureBytes;

const PASSWORD: &[u8] = b"TestPassword123!";

fn fast_kdf() -> KdfOpts {
    KdfOpts::scrypt(1 << 10, 8, 1)
}

fn storer() -> KeyStorer {
    KeyStorer::new(EncOpts::default(), fast_kdf())
}

fn manager(dir: &TempDir) -> KeyManager {
    let mut config = KeyManagerConfig::new(dir.path().join("keys"), SecureBytes::from(PASSWORD));
    config.kdf_opts = fast_kdf();
    KeyManager::new(config, KeyRegistry::with_defaults().unwrap())
}

#[test]
fn test_store_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let registry = KeyRegistry::with_defaults().unwrap();

    for opt in [KeyGenOpt::Ecdsa224, KeyGenOpt::Ecdsa384, KeyGenOpt::Rsa1024] {
        let (private, _) = generate_key(opt).unwrap();
        let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();
        assert_eq!(key_id, private.id());

        let loaded = load_key(key_id.as_str(), PASSWORD, dir.path(), &registry).unwrap();
        assert!(loaded.is_private());
        assert_eq!(loaded.gen_opt(), opt);
        assert_eq!(loaded.ski(), private.ski());
    }
}

#[test]
fn test_gcm_round_trip() {
    let dir = TempDir::new().unwrap();
    let storer = KeyStorer::new(EncOpts::new(32, CipherMode::Gcm).unwrap(), fast_kdf());
    let loader = KeyLoader::new(KeyRegistry::with_defaults().unwrap());

    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer.store(&private, PASSWORD, dir.path()).unwrap();

    let loaded = loader.load(key_id.as_str(), PASSWORD, dir.path()).unwrap();
    assert_eq!(loaded.ski(), private.ski());

    let err = loader
        .load(key_id.as_str(), b"wrong password", dir.path())
        .unwrap_err();
    assert!(matches!(err, CryptoError::DecryptionFailure { .. }));
}

#[test]
fn test_key_file_layout() {
    let dir = TempDir::new().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();

    let raw = fs::read_to_string(dir.path().join(key_id.as_str())).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    for field in ["SKI", "KeyGenOpt", "IsPrivate", "EncryptedKey", "Hints"] {
        assert!(json.get(field).is_some(), "missing {}", field);
    }
    assert_eq!(json["KeyGenOpt"], "ecdsa256");
    assert_eq!(json["IsPrivate"], true);
    assert_eq!(json["Hints"]["EncOpt"]["OpMode"], "CTR");
    assert_eq!(json["Hints"]["KDFOpt"]["KdfName"], "scrypt");

    let key_file = read_key_file(key_id.as_str(), dir.path()).unwrap();
    assert_eq!(key_file.ski, private.ski());
    assert_eq!(key_file.hints.kdf_salt.len(), SALT_LEN);
    assert!(hex::decode(&key_file.encrypted_key).is_ok());
}

#[cfg(unix)]
#[test]
fn test_key_file_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let key_dir = dir.path().join("nested").join("keys");
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer().store(&private, PASSWORD, &key_dir).unwrap();

    let mode = fs::metadata(key_dir.join(key_id.as_str()))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_wrong_password_ctr() {
    let dir = TempDir::new().unwrap();
    let registry = KeyRegistry::with_defaults().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();

    let err = load_key(key_id.as_str(), b"not the password", dir.path(), &registry).unwrap_err();
    assert!(matches!(
        err,
        CryptoError::IntegrityMismatch { .. } | CryptoError::DecryptionFailure { .. }
    ));
}

#[test]
fn test_store_does_not_clobber() {
    let dir = TempDir::new().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();

    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();
    let path = dir.path().join(key_id.as_str());
    let first = fs::read(&path).unwrap();

    storer().store(&private, b"other password", dir.path()).unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);

    // the first password still opens the file
    let registry = KeyRegistry::with_defaults().unwrap();
    assert!(load_key(key_id.as_str(), PASSWORD, dir.path(), &registry).is_ok());
}

#[test]
fn test_fresh_salt_per_store() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();

    let key_id = storer().store(&private, PASSWORD, a.path()).unwrap();
    storer().store(&private, PASSWORD, b.path()).unwrap();

    let first = read_key_file(key_id.as_str(), a.path()).unwrap();
    let second = read_key_file(key_id.as_str(), b.path()).unwrap();
    assert_ne!(first.hints.kdf_salt, second.hints.kdf_salt);
    assert_ne!(first.encrypted_key, second.encrypted_key);
}

#[test]
fn test_load_errors() {
    let dir = TempDir::new().unwrap();
    let registry = KeyRegistry::with_defaults().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let (other, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();

    let missing = dir.path().join("does-not-exist");
    let err = load_key(key_id.as_str(), PASSWORD, &missing, &registry).unwrap_err();
    assert!(matches!(err, CryptoError::KeyDirectoryMissing { .. }));

    let err = load_key("not-an-id", PASSWORD, dir.path(), &registry).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKeyId { .. }));

    let err = load_key(other.id().as_str(), PASSWORD, dir.path(), &registry).unwrap_err();
    assert!(matches!(err, CryptoError::WrongKeyId { .. }));

    let err = load_key(key_id.as_str(), PASSWORD, std::path::Path::new(""), &registry).unwrap_err();
    assert!(matches!(err, CryptoError::EmptyKeyPath { .. }));
}

#[test]
fn test_renamed_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let registry = KeyRegistry::with_defaults().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let (other, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();

    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();
    fs::rename(
        dir.path().join(key_id.as_str()),
        dir.path().join(other.id().as_str()),
    )
    .unwrap();

    let err = load_key(other.id().as_str(), PASSWORD, dir.path(), &registry).unwrap_err();
    assert!(matches!(err, CryptoError::IntegrityMismatch { .. }));
}

#[test]
fn test_tampered_ciphertext_is_rejected() {
    let dir = TempDir::new().unwrap();
    let registry = KeyRegistry::with_defaults().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();

    let path = dir.path().join(key_id.as_str());
    let mut key_file = read_key_file(key_id.as_str(), dir.path()).unwrap();
    let mut ciphertext = hex::decode(&key_file.encrypted_key).unwrap();
    // lands inside the private scalar of the SEC1 encoding
    ciphertext[crate::aes::CTR_IV_LEN + 10] ^= 0xff;
    key_file.encrypted_key = hex::encode(ciphertext);
    fs::write(&path, serde_json::to_vec(&key_file).unwrap()).unwrap();

    let err = load_key(key_id.as_str(), PASSWORD, dir.path(), &registry).unwrap_err();
    assert!(matches!(err, CryptoError::IntegrityMismatch { .. }));
}

#[test]
fn test_oversized_kdf_cost_in_file() {
    let dir = TempDir::new().unwrap();
    let registry = KeyRegistry::with_defaults().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();

    let path = dir.path().join(key_id.as_str());
    let mut json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    json["Hints"]["KDFOpt"]["KdfParams"]["N"] = serde_json::json!(1u64 << 40);
    fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

    let err = load_key(key_id.as_str(), PASSWORD, dir.path(), &registry).unwrap_err();
    assert!(matches!(err, CryptoError::KdfParameterError { .. }));

    json["Hints"]["KDFOpt"] = serde_json::json!({
        "KdfName": "argon2id",
        "KdfParams": { "M": u32::MAX, "T": 1, "P": 1 }
    });
    fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

    let err = load_key(key_id.as_str(), PASSWORD, dir.path(), &registry).unwrap_err();
    assert!(matches!(err, CryptoError::KdfParameterError { .. }));
}

#[test]
fn test_unknown_option_in_file() {
    let dir = TempDir::new().unwrap();
    let registry = KeyRegistry::with_defaults().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();

    let mut key_file = read_key_file(key_id.as_str(), dir.path()).unwrap();
    key_file.key_gen_opt = "ecdsa999".to_string();
    fs::write(
        dir.path().join(key_id.as_str()),
        serde_json::to_vec(&key_file).unwrap(),
    )
    .unwrap();

    let err = load_key(key_id.as_str(), PASSWORD, dir.path(), &registry).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKeyGenOption { .. }));
}

#[test]
fn test_list_key_ids_skips_other_files() {
    let dir = TempDir::new().unwrap();
    let (private, _) = generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let key_id = storer().store(&private, PASSWORD, dir.path()).unwrap();
    fs::write(dir.path().join("README"), b"not a key").unwrap();

    assert_eq!(list_key_ids(dir.path()).unwrap(), vec![key_id]);
}

#[test]
fn test_manager_generate_and_cache() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir);
    assert!(!manager.is_cached());

    let (private, public) = manager.generate_key(KeyGenOpt::Ecdsa256).unwrap();
    assert!(manager.is_cached());
    assert_eq!(private.ski(), public.ski());

    // only the private key is persisted
    assert_eq!(list_key_ids(manager.key_dir()).unwrap(), vec![private.id()]);

    // cached pair is returned even after the files are gone
    fs::remove_dir_all(manager.key_dir()).unwrap();
    let (cached, _) = manager.get_key().unwrap();
    assert_eq!(cached.ski(), private.ski());
}

#[test]
fn test_manager_loads_after_clear() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir);
    let (private, _) = manager.generate_key(KeyGenOpt::Ecdsa384).unwrap();

    manager.clear();
    assert!(!manager.is_cached());

    let (loaded, public) = manager.get_key().unwrap();
    assert!(manager.is_cached());
    assert_eq!(loaded.ski(), private.ski());
    assert!(!public.is_private());
    assert_eq!(public.ski(), private.ski());
}

#[test]
fn test_manager_regenerate_replaces_key() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir);

    let (first, _) = manager.generate_key(KeyGenOpt::Ecdsa256).unwrap();
    let (second, _) = manager.generate_key(KeyGenOpt::Ecdsa256).unwrap();
    assert_ne!(first.ski(), second.ski());
    assert_eq!(list_key_ids(manager.key_dir()).unwrap(), vec![second.id()]);
}

#[test]
fn test_manager_invalid_option_keeps_existing_key() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir);
    let (private, _) = manager.generate_key(KeyGenOpt::Ecdsa256).unwrap();

    let err = manager.generate_key(KeyGenOpt::Unknown).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKeyGenOption { .. }));
    assert_eq!(list_key_ids(manager.key_dir()).unwrap(), vec![private.id()]);
}

#[test]
fn test_manager_without_key() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir);

    let err = manager.get_key().unwrap_err();
    assert!(matches!(err, CryptoError::KeyDirectoryMissing { .. }));

    fs::create_dir_all(manager.key_dir()).unwrap();
    let err = manager.get_key().unwrap_err();
    assert!(matches!(err, CryptoError::WrongKeyId { .. }));
}

#[test]
fn test_manager_wrong_password() {
    let dir = TempDir::new().unwrap();
    let mut writer = manager(&dir);
    writer.generate_key(KeyGenOpt::Ecdsa256).unwrap();

    let mut config = KeyManagerConfig::new(writer.key_dir(), SecureBytes::from("wrong"));
    config.kdf_opts = fast_kdf();
    let mut reader = KeyManager::new(config, KeyRegistry::with_defaults().unwrap());

    assert!(reader.get_key().is_err());
    assert!(!reader.is_cached());
}
