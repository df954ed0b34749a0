use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque account identifier supplied by the identity subsystem.
pub type UserId = Uuid;

/// A user row as seen by the encryption subsystem.
///
/// The identity/account collaborator owns the full user document; this is
/// the slice of it the encryption core reads and writes. All key material
/// here is in wrapped (string) form only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub email: String,
    /// Argon2 PHC string. Legacy rows migrated from older deployments may
    /// still hold a plaintext password until the migration pass runs.
    pub password_hash: String,
    /// Master key wrapped under the password-derived key (`ENC:` blob).
    pub encrypted_master_key: Option<String>,
    /// SHA-256 hex of the normalized recovery code.
    pub recovery_key_hash: Option<String>,
    /// Master key wrapped under the recovery-derived key (`ENC:` blob).
    pub recovery_encrypted_master_key: Option<String>,
}

impl UserRecord {
    /// Whether the account has an encryption envelope at all.
    pub fn has_encryption(&self) -> bool {
        self.encrypted_master_key.is_some()
    }

    /// Whether the account can be recovered with a recovery key.
    pub fn has_recovery(&self) -> bool {
        self.recovery_key_hash.is_some() && self.recovery_encrypted_master_key.is_some()
    }
}
