//! dv-session: the client-held unlock session
//!
//! The single owning holder of the decrypted master key. All field
//! encryption/decryption routes through here; no other component may cache
//! or copy the key. Only the *wrapped* envelopes are durable; the session
//! starts Locked on every process start, so a stolen persisted-session
//! artifact without the password or recovery code yields nothing.
//!
//! While Locked, field operations are explicit no-op pass-throughs rather
//! than errors: call sites rendering legacy (never-encrypted) data must
//! keep working when no key is available.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::RwLock;

use dv_crypto::{
    decrypt_field, encrypt_field, is_encrypted, unwrap_with_password, KdfParams, MasterKey,
};

/// Session unlock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No master key held; field operations pass through unchanged.
    Locked,
    /// A KDF/unwrap is in flight.
    Unlocking,
    /// Master key held in memory; field operations are live.
    Unlocked,
}

enum Slot {
    Locked,
    Unlocking,
    Unlocked(MasterKey),
}

/// In-memory, session-scoped holder of the decrypted master key.
///
/// Cheap to clone; clones share the same underlying slot. Initial state is
/// always Locked.
#[derive(Clone)]
pub struct UnlockSession {
    slot: Arc<RwLock<Slot>>,
    params: KdfParams,
}

impl UnlockSession {
    pub fn new(params: KdfParams) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot::Locked)),
            params,
        }
    }

    pub async fn state(&self) -> SessionState {
        match *self.slot.read().await {
            Slot::Locked => SessionState::Locked,
            Slot::Unlocking => SessionState::Unlocking,
            Slot::Unlocked(_) => SessionState::Unlocked,
        }
    }

    pub async fn is_unlocked(&self) -> bool {
        matches!(*self.slot.read().await, Slot::Unlocked(_))
    }

    /// Unlock by re-deriving the password key and opening the envelope.
    ///
    /// Returns false on failure and the session stays Locked; wrong password
    /// and corrupt envelope are not distinguished to the caller. Concurrent
    /// duplicate unlocks (double-submit) race harmlessly, since both derive
    /// the same key from the same inputs.
    pub async fn unlock_with_password(
        &self,
        encrypted_master_key: &str,
        password: SecretString,
    ) -> bool {
        {
            let mut slot = self.slot.write().await;
            if matches!(*slot, Slot::Locked) {
                *slot = Slot::Unlocking;
            }
        }

        let blob = encrypted_master_key.to_string();
        let params = self.params;
        let result =
            tokio::task::spawn_blocking(move || unwrap_with_password(&blob, &password, &params))
                .await;

        let mut slot = self.slot.write().await;
        match result {
            Ok(Ok(key)) => {
                *slot = Slot::Unlocked(key);
                tracing::debug!("session unlocked");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("unlock failed: {e}");
                if matches!(*slot, Slot::Unlocking) {
                    *slot = Slot::Locked;
                }
                false
            }
            Err(e) => {
                tracing::error!("unlock task panicked or was cancelled: {e}");
                if matches!(*slot, Slot::Unlocking) {
                    *slot = Slot::Locked;
                }
                false
            }
        }
    }

    /// Install a freshly generated key directly, skipping the redundant
    /// unwrap. Used right after registration/setup where the key is already
    /// known in plaintext.
    pub async fn set_master_key(&self, key: MasterKey) {
        *self.slot.write().await = Slot::Unlocked(key);
        tracing::debug!("session unlocked with freshly generated key");
    }

    /// Drop the key and return to Locked. The key memory is zeroized on
    /// drop. Called on sign-out.
    pub async fn lock(&self) {
        *self.slot.write().await = Slot::Locked;
        tracing::debug!("session locked");
    }

    /// Encrypt a content field under the session key.
    ///
    /// While Locked this is a no-op pass-through: the input is returned
    /// unchanged so call sites degrade gracefully during progressive
    /// rollout. The empty string is returned as-is in every state.
    pub async fn encrypt_field(&self, plaintext: &str) -> String {
        let slot = self.slot.read().await;
        match &*slot {
            Slot::Unlocked(key) => match encrypt_field(plaintext, key) {
                Ok(encrypted) => encrypted,
                Err(e) => {
                    tracing::warn!("field encryption failed, keeping plaintext: {e}");
                    plaintext.to_string()
                }
            },
            // locked: explicit no-op pass-through
            _ => plaintext.to_string(),
        }
    }

    /// Decrypt a stored field value.
    ///
    /// While Locked this is a no-op pass-through. While Unlocked, values
    /// without the `ENC:` prefix pass through (legacy plaintext), and a
    /// value that fails to decrypt degrades to the stored value unchanged
    /// with a warning: the read path must never crash or silently render
    /// empty content.
    pub async fn decrypt_field(&self, stored: &str) -> String {
        let slot = self.slot.read().await;
        match &*slot {
            Slot::Unlocked(key) => match decrypt_field(stored, key) {
                Ok(plain) => plain,
                Err(e) => {
                    tracing::warn!("field decryption failed, returning stored value: {e}");
                    stored.to_string()
                }
            },
            // locked: explicit no-op pass-through
            _ => stored.to_string(),
        }
    }

    /// Whether a stored value is ciphertext. State-independent.
    pub fn is_field_encrypted(&self, value: &str) -> bool {
        is_encrypted(value)
    }
}
