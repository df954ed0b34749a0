//! dv-crypto: envelope encryption for Deskvault
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit random, generated once per account)
//!   ├── wrapped under KDF(password, salt)       → "ENC:" + b64(salt‖iv‖tag‖ct)
//!   ├── wrapped under KDF(recovery code, salt)  → "ENC:" + b64(salt‖iv‖tag‖ct)
//!   └── Field AEAD: AES-256-GCM (key = raw master key, iv = random 96-bit)
//!       → "ENC:" + b64(iv‖ct‖tag)
//! ```
//!
//! The server only ever stores the wrapped forms; the raw master key exists
//! in memory during wrap/unwrap and inside an unlock session (dv-session).

pub mod envelope;
pub mod error;
pub mod field;
pub mod kdf;
pub mod master_key;
pub mod recovery;

pub use envelope::Envelope;
pub use error::CryptoError;
pub use field::{decrypt_field, encrypt_field, is_encrypted};
pub use kdf::{derive_key, DerivedKey, KdfParams};
pub use master_key::{
    rewrap_password, unwrap_with_password, unwrap_with_recovery, wrap_with_password,
    wrap_with_recovery, MasterKey,
};
pub use recovery::{generate_recovery_code, hash_recovery_code, normalize_recovery_code};

/// Size of the master key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the KDF salt carried inside key envelopes
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Literal prefix discriminating ciphertext from plaintext in stored values
pub const ENC_PREFIX: &str = "ENC:";

pub(crate) fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

pub(crate) fn base64_decode(s: &str) -> Result<Vec<u8>, error::CryptoError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.decode(s).map_err(|_| error::CryptoError::InvalidFormat)
}
