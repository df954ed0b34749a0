//! Stored password hashing (Argon2id, PHC strings)
//!
//! Only for login verification. The KDF that wraps the master key lives in
//! dv-crypto and carries its own salt inside the envelope; the two never
//! share state, so a database leak of password hashes says nothing about
//! wrapping keys.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use secrecy::{ExposeSecret, SecretString};

use dv_core::{DvError, DvResult};

/// Hash a password for storage. Argon2id with default parameters, encoded
/// as a PHC string (self-describing: salt and costs travel in the hash).
pub fn hash_password(password: &SecretString) -> DvResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DvError::Other(anyhow::anyhow!("password hashing failed: {e}")))
}

/// Verify a password against a stored PHC string. Unparseable stored
/// values verify as false.
pub fn verify_password(password: &SecretString, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Whether a stored value is a PHC-format hash, as opposed to a legacy
/// plaintext password awaiting migration.
pub fn is_password_hash(stored: &str) -> bool {
    PasswordHash::new(stored).is_ok()
}
