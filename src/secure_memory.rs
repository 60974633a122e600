//! Secure Memory Handling Utilities
//!
//! Containers for passwords, derived symmetric keys and raw private key bytes.
//! Every container zeroes its contents when dropped, so secrets are erased on
//! all paths, including early returns through `?`.

use std::fmt;
use std::ops::{Deref, DerefMut};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure container for sensitive data that will be automatically
/// zeroed when dropped, preventing the data from remaining in memory.
///
/// # Example
///
/// ```
/// use qasa_pki::secure_memory::SecureBuffer;
///
/// let key = SecureBuffer::new(vec![1u8, 2, 3, 4, 5]);
/// assert_eq!(key.len(), 5);
/// // When 'key' goes out of scope, it will be automatically zeroed
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBuffer<T: Zeroize> {
    inner: T,
}

impl<T: Zeroize> SecureBuffer<T> {
    /// Create a new secure buffer containing the given data
    pub fn new(data: T) -> Self {
        Self { inner: data }
    }
}

impl<T: Zeroize> Deref for SecureBuffer<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Zeroize> DerefMut for SecureBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T: Zeroize> fmt::Debug for SecureBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureBuffer([REDACTED])")
    }
}

/// A byte container for passwords, derived keys and raw key material.
///
/// `SecureBytes` never prints its contents and zeroes its memory when dropped.
///
/// # Example
///
/// ```
/// use qasa_pki::secure_memory::SecureBytes;
///
/// let password = SecureBytes::from("correct horse battery staple");
/// assert_eq!(format!("{:?}", password), "SecureBytes([REDACTED])");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    bytes: Vec<u8>,
}

impl SecureBytes {
    /// Create a new SecureBytes holding a copy of the given data
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
        }
    }

    /// Create a zero-filled SecureBytes of the given length
    ///
    /// Used as an output buffer for key derivation and decryption.
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    /// Get a reference to the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get a mutable reference to the underlying bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Consume the container and return the contained bytes
    ///
    /// After calling this method the caller is responsible for zeroizing
    /// the returned vector.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Clear the buffer, securely zeroing all data
    pub fn clear(&mut self) {
        self.bytes.zeroize();
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureBytes([REDACTED])")
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl From<&str> for SecureBytes {
    fn from(password: &str) -> Self {
        Self::new(password.as_bytes())
    }
}

impl From<String> for SecureBytes {
    fn from(password: String) -> Self {
        Self::from(password.into_bytes())
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Securely zero memory after a function has completed
///
/// The data is zeroized after the closure returns, on early return and
/// during unwinding.
///
/// # Example
///
/// ```
/// use qasa_pki::secure_memory::with_secure_scope;
///
/// let mut key = vec![7u8; 32];
/// let first = with_secure_scope(&mut key, |k| k[0]);
/// assert_eq!(first, 7);
/// assert!(key.iter().all(|b| *b == 0));
/// ```
pub fn with_secure_scope<T, F, R>(data: &mut T, f: F) -> R
where
    T: Zeroize,
    F: FnOnce(&mut T) -> R,
{
    struct ScopeGuard<'a, T: Zeroize> {
        data: &'a mut T,
    }

    impl<'a, T: Zeroize> Drop for ScopeGuard<'a, T> {
        fn drop(&mut self) {
            self.data.zeroize();
        }
    }

    let guard = ScopeGuard { data };
    f(guard.data)
}
