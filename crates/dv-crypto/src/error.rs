use thiserror::Error;

/// Failures surfaced by the envelope codec and field cipher.
///
/// Wrong-secret and corrupted-ciphertext are deliberately folded into one
/// variant: callers must not be able to tell them apart, and the user-facing
/// message for both is "incorrect password".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The blob does not match the tagged envelope structure.
    #[error("invalid encrypted data format")]
    InvalidFormat,

    /// Authentication-tag verification failed: wrong secret or corrupted data.
    #[error("decryption failed: wrong secret or corrupted data")]
    AuthenticationFailed,

    /// The AEAD refused to encrypt (practically unreachable for field-sized inputs).
    #[error("encryption failed")]
    EncryptionFailed,
}
