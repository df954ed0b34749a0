//! Field-level encryption under the raw master key
//!
//! Wire format:
//! ```text
//! "ENC:" + base64(iv[12] ‖ ciphertext ‖ tag[16])
//! ```
//!
//! No salt and no KDF: the master key is already uniformly random, so
//! fields take the fast path. Unlike key envelopes, the tag stays where
//! AES-GCM appends it, after the ciphertext.
//!
//! The `ENC:` prefix is the sole discriminator between ciphertext and
//! plaintext; values without it pass through untouched so records that
//! predate encryption keep rendering.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;

use crate::error::CryptoError;
use crate::master_key::MasterKey;
use crate::{base64_decode, base64_encode, ENC_PREFIX, IV_SIZE, TAG_SIZE};

/// Whether a stored value is ciphertext.
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENC_PREFIX)
}

/// Encrypt a content field under the master key.
///
/// The empty string is its own fixed point: no ciphertext is produced for
/// it, which avoids both the wasted work and a recognizable constant blob
/// for empty content. A fresh random nonce is drawn per call, so repeated
/// encryptions of the same plaintext differ.
pub fn encrypt_field(plaintext: &str, key: &MasterKey) -> Result<String, CryptoError> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let ct_with_tag = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut combined = Vec::with_capacity(IV_SIZE + ct_with_tag.len());
    combined.extend_from_slice(&iv);
    combined.extend_from_slice(&ct_with_tag);

    Ok(format!("{ENC_PREFIX}{}", base64_encode(&combined)))
}

/// Decrypt a stored field value.
///
/// Values without the `ENC:` prefix are returned unchanged (legacy
/// plaintext pass-through), so the call is safe on mixed data. Failure on
/// a prefixed value is `AuthenticationFailed`; the caller decides whether
/// to surface it or degrade to showing the stored value.
pub fn decrypt_field(stored: &str, key: &MasterKey) -> Result<String, CryptoError> {
    if stored.is_empty() {
        return Ok(String::new());
    }
    let Some(b64) = stored.strip_prefix(ENC_PREFIX) else {
        return Ok(stored.to_string());
    };

    let combined = base64_decode(b64)?;
    if combined.len() < IV_SIZE + TAG_SIZE {
        return Err(CryptoError::InvalidFormat);
    }
    let (iv, ct_with_tag) = combined.split_at(IV_SIZE);

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(iv);

    let plain = cipher
        .decrypt(nonce, ct_with_tag)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    String::from_utf8(plain).map_err(|_| CryptoError::AuthenticationFailed)
}
