//! Account storage seam
//!
//! The real deployment keeps user documents in the application database;
//! this trait is the slice of it the encryption flows read and write. All
//! key material crossing this boundary is opaque wrapped strings.

use std::collections::HashMap;
use std::sync::Mutex;

use dv_core::{DvError, DvResult, UserId, UserRecord};

/// Partial update of a user's encryption fields.
///
/// `None` leaves a field unchanged. Implementations must apply the update
/// as a single write; the flows rely on never observing a half-applied
/// password change.
#[derive(Debug, Clone, Default)]
pub struct EncryptionUpdate {
    pub password_hash: Option<String>,
    pub encrypted_master_key: Option<String>,
    pub recovery_key_hash: Option<String>,
    pub recovery_encrypted_master_key: Option<String>,
}

pub trait AccountStore: Send + Sync {
    fn find_by_id(&self, user_id: UserId) -> DvResult<Option<UserRecord>>;
    fn find_by_email(&self, email: &str) -> DvResult<Option<UserRecord>>;
    fn insert(&self, record: UserRecord) -> DvResult<()>;
    /// Apply a partial update to a user's encryption fields in one write.
    fn apply_update(&self, user_id: UserId, update: EncryptionUpdate) -> DvResult<()>;
    /// Every record, for maintenance passes. Implementations backed by a
    /// real database should page instead of materializing everything.
    fn all_users(&self) -> DvResult<Vec<UserRecord>>;
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<UserId, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryStore {
    fn find_by_id(&self, user_id: UserId) -> DvResult<Option<UserRecord>> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    fn find_by_email(&self, email: &str) -> DvResult<Option<UserRecord>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn insert(&self, record: UserRecord) -> DvResult<()> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&record.user_id) {
            return Err(DvError::Store(format!(
                "user {} already exists",
                record.user_id
            )));
        }
        users.insert(record.user_id, record);
        Ok(())
    }

    fn apply_update(&self, user_id: UserId, update: EncryptionUpdate) -> DvResult<()> {
        let mut users = self.users.lock().unwrap();
        let record = users.get_mut(&user_id).ok_or(DvError::AccountNotFound)?;

        if let Some(hash) = update.password_hash {
            record.password_hash = hash;
        }
        if let Some(blob) = update.encrypted_master_key {
            record.encrypted_master_key = Some(blob);
        }
        if let Some(hash) = update.recovery_key_hash {
            record.recovery_key_hash = Some(hash);
        }
        if let Some(blob) = update.recovery_encrypted_master_key {
            record.recovery_encrypted_master_key = Some(blob);
        }
        Ok(())
    }

    fn all_users(&self) -> DvResult<Vec<UserRecord>> {
        Ok(self.users.lock().unwrap().values().cloned().collect())
    }
}
