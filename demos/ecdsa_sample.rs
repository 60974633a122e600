//! Generates an identity key, stores it encrypted, reloads it through a
//! second manager and signs a message with it.

use qasa_pki::config::{Config, SecurityLevel};
use qasa_pki::hashing::hash;
use qasa_pki::key::signer::{sign, verify};
use qasa_pki::key::KeyRegistry;
use qasa_pki::key_management::{read_key_file, KdfOpts, KeyManager};
use qasa_pki::secure_memory::SecureBytes;
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;

    let mut config = Config::new(SecurityLevel::Level192);
    config.key_dir = temp_dir.path().join("keys");
    // keep the demo quick; real deployments should keep the default cost
    config.kdf_opts = KdfOpts::scrypt(1 << 14, 8, 1);

    println!("Security level 192: {} keys, {} digests", config.key_gen_opt, config.hash_opt);

    let password = SecureBytes::from("demo password");
    let mut manager = KeyManager::new(
        config.key_manager_config(password.clone()),
        KeyRegistry::with_defaults()?,
    );

    let start = Instant::now();
    let (private, public) = manager.generate_key(config.key_gen_opt)?;
    println!("Generated and stored {} in {:.2?}", private.id(), start.elapsed());

    let key_file = read_key_file(private.id().as_str(), &config.key_dir)?;
    println!("{}", serde_json::to_string_pretty(&key_file)?);

    // a second manager has nothing cached and reads the key file
    let mut reader = KeyManager::new(
        config.key_manager_config(password),
        KeyRegistry::with_defaults()?,
    );
    let start = Instant::now();
    let (loaded, _) = reader.get_key()?;
    println!("Loaded {} in {:.2?}", loaded.id(), start.elapsed());

    let digest = hash(b"hello from qasa-pki", config.hash_opt)?;
    let signature = sign(&loaded, &digest)?;
    println!("Signature ({} bytes): {}", signature.len(), hex::encode(&signature));
    println!("Verified: {}", verify(&public, &signature, &digest)?);
    println!("{}", public.to_pem()?.as_str());

    Ok(())
}
