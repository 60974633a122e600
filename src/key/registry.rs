//! Key generator registry
//!
//! Maps each defined `KeyGenOpt` to the generator that produces and recovers
//! keys for it. A registry is an ordinary value passed to whoever needs it;
//! there is no process-wide instance.

use std::collections::HashMap;

use super::ecdsa_key::EcdsaKeyGenerator;
use super::rsa_key::RsaKeyGenerator;
use super::{Key, KeyGenOpt};
use crate::error::{CryptoError, CryptoResult};

/// Generator for one key generation option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenerator {
    Rsa(RsaKeyGenerator),
    Ecdsa(EcdsaKeyGenerator),
}

impl KeyGenerator {
    /// Builds the generator for `opt`; `Unknown` is rejected
    pub fn for_option(opt: KeyGenOpt) -> CryptoResult<Self> {
        if let Some(bits) = opt.rsa_bits() {
            return Ok(KeyGenerator::Rsa(RsaKeyGenerator::new(bits)?));
        }
        if let Some(curve) = opt.ecdsa_curve() {
            return Ok(KeyGenerator::Ecdsa(EcdsaKeyGenerator::new(curve)));
        }
        Err(CryptoError::invalid_key_gen_option(opt.as_str()))
    }

    pub fn gen_opt(&self) -> KeyGenOpt {
        match self {
            KeyGenerator::Rsa(generator) => generator.gen_opt(),
            KeyGenerator::Ecdsa(generator) => generator.gen_opt(),
        }
    }

    /// Generates a fresh `(private, public)` pair
    pub fn generate(&self) -> CryptoResult<(Key, Key)> {
        match self {
            KeyGenerator::Rsa(generator) => generator.generate(),
            KeyGenerator::Ecdsa(generator) => generator.generate(),
        }
    }

    pub fn recover(&self, key_bytes: &[u8], is_private: bool) -> CryptoResult<Key> {
        match self {
            KeyGenerator::Rsa(generator) => generator.recover(key_bytes, is_private),
            KeyGenerator::Ecdsa(generator) => generator.recover(key_bytes, is_private),
        }
    }
}

/// Rebuilds a key from its canonical bytes and generation option
///
/// The keystore depends on this trait rather than on `KeyRegistry` so that
/// callers can plug in a restricted set of algorithms.
pub trait KeyRecoverer {
    fn recover_key(&self, key_bytes: &[u8], opt: KeyGenOpt, is_private: bool) -> CryptoResult<Key>;
}

/// Set of generators keyed by option
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    generators: HashMap<KeyGenOpt, KeyGenerator>,
}

impl KeyRegistry {
    /// Registry with no generators
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    /// Registry holding a generator for every defined option
    pub fn with_defaults() -> CryptoResult<Self> {
        let mut registry = Self::empty();
        for opt in KeyGenOpt::ALL {
            registry.register(KeyGenerator::for_option(opt)?);
        }
        Ok(registry)
    }

    /// Adds or replaces the generator for its option
    pub fn register(&mut self, generator: KeyGenerator) {
        self.generators.insert(generator.gen_opt(), generator);
    }

    pub fn get(&self, opt: KeyGenOpt) -> CryptoResult<&KeyGenerator> {
        self.generators
            .get(&opt)
            .ok_or_else(|| CryptoError::invalid_key_gen_option(opt.as_str()))
    }

    pub fn contains(&self, opt: KeyGenOpt) -> bool {
        self.generators.contains_key(&opt)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Generates a fresh key pair for `opt`
    pub fn generate(&self, opt: KeyGenOpt) -> CryptoResult<(Key, Key)> {
        self.get(opt)?.generate()
    }
}

impl KeyRecoverer for KeyRegistry {
    fn recover_key(&self, key_bytes: &[u8], opt: KeyGenOpt, is_private: bool) -> CryptoResult<Key> {
        self.get(opt)?.recover(key_bytes, is_private)
    }
}
