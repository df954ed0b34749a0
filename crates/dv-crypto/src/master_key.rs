//! Master key generation and password/recovery wrapping

use rand::RngCore;
use secrecy::SecretString;
use zeroize::Zeroize;

use crate::envelope::{seal, Envelope};
use crate::error::CryptoError;
use crate::kdf::{derive_key, KdfParams};
use crate::recovery::normalize_recovery_code;
use crate::{base64_decode, base64_encode, KEY_SIZE, SALT_SIZE};

/// The per-account 256-bit content encryption key.
///
/// Generated once at encryption setup and never persisted raw: the server
/// only stores it wrapped under the password- or recovery-derived key. In
/// memory it exists transiently during wrap/unwrap and inside an unlock
/// session. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    /// Generate a fresh random master key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Base64 form for handing the unlocked key across an API boundary.
    pub fn to_base64(&self) -> String {
        base64_encode(&self.bytes)
    }

    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let mut decoded = base64_decode(s)?;
        if decoded.len() != KEY_SIZE {
            decoded.zeroize();
            return Err(CryptoError::InvalidFormat);
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Wrap (encrypt) the master key under a password.
///
/// Draws a fresh random salt, derives the wrapping key, and seals the raw
/// key bytes. Two calls with identical inputs produce different blobs.
pub fn wrap_with_password(
    key: &MasterKey,
    password: &SecretString,
    params: &KdfParams,
) -> Result<String, CryptoError> {
    wrap_with_secret(key, password, params)
}

/// Unwrap a password envelope. Wrong password and corrupted blob both fail
/// with `AuthenticationFailed`; a malformed blob is `InvalidFormat`.
pub fn unwrap_with_password(
    blob: &str,
    password: &SecretString,
    params: &KdfParams,
) -> Result<MasterKey, CryptoError> {
    unwrap_with_secret(blob, password, params)
}

/// Wrap the master key under a recovery code. The code is normalized first,
/// so raw and user-formatted inputs wrap identically.
pub fn wrap_with_recovery(
    key: &MasterKey,
    recovery_code: &str,
    params: &KdfParams,
) -> Result<String, CryptoError> {
    let secret = SecretString::from(normalize_recovery_code(recovery_code));
    wrap_with_secret(key, &secret, params)
}

/// Unwrap a recovery envelope, normalizing the supplied code first.
pub fn unwrap_with_recovery(
    blob: &str,
    recovery_code: &str,
    params: &KdfParams,
) -> Result<MasterKey, CryptoError> {
    let secret = SecretString::from(normalize_recovery_code(recovery_code));
    unwrap_with_secret(blob, &secret, params)
}

/// Re-wrap a password envelope under a new password.
///
/// Unwraps with the old password and wraps with the new one entirely in
/// memory; the intermediate master key is zeroized before returning. On any
/// failure no output is produced, so the caller's stored envelope stays
/// untouched.
pub fn rewrap_password(
    blob: &str,
    old_password: &SecretString,
    new_password: &SecretString,
    params: &KdfParams,
) -> Result<String, CryptoError> {
    let master = unwrap_with_secret(blob, old_password, params)?;
    wrap_with_secret(&master, new_password, params)
}

// The codec is agnostic to where the secret came from; password and
// recovery wrapping differ only in normalization.
fn wrap_with_secret(
    key: &MasterKey,
    secret: &SecretString,
    params: &KdfParams,
) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let wrapping_key = derive_key(secret, &salt, params);
    seal(key.as_bytes(), &wrapping_key, &salt)
}

fn unwrap_with_secret(
    blob: &str,
    secret: &SecretString,
    params: &KdfParams,
) -> Result<MasterKey, CryptoError> {
    let envelope = Envelope::parse(blob)?;
    let wrapping_key = derive_key(secret, &envelope.salt, params);

    let mut plain = envelope.open(&wrapping_key)?;
    if plain.len() != KEY_SIZE {
        plain.zeroize();
        return Err(CryptoError::AuthenticationFailed);
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&plain);
    plain.zeroize();

    Ok(MasterKey::from_bytes(bytes))
}
