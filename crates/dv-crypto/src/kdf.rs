//! Key derivation: PBKDF2-HMAC-SHA256 password/recovery code → wrapping key

use std::num::NonZeroU32;

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit symmetric key derived from a password or recovery code.
///
/// Zeroized on drop to prevent secrets lingering in memory.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters for KDF
#[derive(Debug, Clone, Copy)]
pub struct KdfParams {
    /// Iteration count (default: 100000, costing tens of milliseconds per
    /// call on commodity hardware; the deliberate defense against offline
    /// brute force)
    pub iterations: NonZeroU32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: NonZeroU32::new(100_000).unwrap(),
        }
    }
}

impl KdfParams {
    /// Build from a configured iteration count. Returns `None` for zero.
    pub fn new(iterations: u32) -> Option<Self> {
        NonZeroU32::new(iterations).map(|iterations| Self { iterations })
    }
}

/// Derive a 256-bit wrapping key from a secret and salt using
/// PBKDF2-HMAC-SHA256.
///
/// Deterministic: the same `(secret, salt)` pair always yields the same key;
/// different salts yield unlinkable keys. The salt should be 16 random bytes
/// stored alongside the wrapped data (it does not need to be secret).
///
/// CPU-bound; async callers should run this under `spawn_blocking`.
pub fn derive_key(secret: &SecretString, salt: &[u8; SALT_SIZE], params: &KdfParams) -> DerivedKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        secret.expose_secret().as_bytes(),
        salt,
        params.iterations.get(),
        &mut key,
    );
    let derived = DerivedKey::from_bytes(key);
    key.zeroize();
    derived
}
