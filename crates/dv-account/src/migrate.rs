//! One-time migration: hash legacy plaintext passwords in place
//!
//! Early deployments stored raw passwords. This pass finds every record
//! whose stored value is not a PHC hash and replaces it with one. Safe to
//! re-run: already-hashed rows are skipped.

use secrecy::SecretString;

use dv_core::{DvError, DvResult};

use crate::password;
use crate::store::{AccountStore, EncryptionUpdate};

/// Hash every legacy plaintext password in the store. Returns how many
/// records were migrated.
pub async fn migrate_legacy_password_hashes<S: AccountStore>(store: &S) -> DvResult<usize> {
    let users = store.all_users()?;
    let mut migrated = 0;

    for user in users {
        if password::is_password_hash(&user.password_hash) {
            continue;
        }

        let user_id = user.user_id;
        let plain = SecretString::from(user.password_hash);
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
            .await
            .map_err(|e| DvError::Other(anyhow::anyhow!("hashing task failed: {e}")))??;

        store.apply_update(
            user_id,
            EncryptionUpdate {
                password_hash: Some(hash),
                ..Default::default()
            },
        )?;

        tracing::info!(user = %user_id, "hashed legacy plaintext password");
        migrated += 1;
    }

    if migrated > 0 {
        tracing::info!("password migration complete: {migrated} record(s) hashed");
    }
    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use dv_core::UserRecord;
    use uuid::Uuid;

    fn legacy_record(email: &str, plain_password: &str) -> UserRecord {
        UserRecord {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: plain_password.to_string(),
            encrypted_master_key: None,
            recovery_key_hash: None,
            recovery_encrypted_master_key: None,
        }
    }

    #[tokio::test]
    async fn test_migrates_plaintext_rows_only() {
        let store = MemoryStore::new();

        let legacy = legacy_record("old@example.com", "hunter2");
        let legacy_id = legacy.user_id;
        store.insert(legacy).unwrap();

        let mut hashed = legacy_record("new@example.com", "");
        hashed.password_hash =
            password::hash_password(&SecretString::from("correcthorse")).unwrap();
        let hashed_value = hashed.password_hash.clone();
        let hashed_id = hashed.user_id;
        store.insert(hashed).unwrap();

        let migrated = migrate_legacy_password_hashes(&store).await.unwrap();
        assert_eq!(migrated, 1);

        let legacy_after = store.find_by_id(legacy_id).unwrap().unwrap();
        assert!(password::is_password_hash(&legacy_after.password_hash));
        assert!(password::verify_password(
            &SecretString::from("hunter2"),
            &legacy_after.password_hash
        ));

        // untouched
        let hashed_after = store.find_by_id(hashed_id).unwrap().unwrap();
        assert_eq!(hashed_after.password_hash, hashed_value);
    }

    #[tokio::test]
    async fn test_rerun_is_noop() {
        let store = MemoryStore::new();
        store
            .insert(legacy_record("old@example.com", "hunter2"))
            .unwrap();

        assert_eq!(migrate_legacy_password_hashes(&store).await.unwrap(), 1);
        assert_eq!(migrate_legacy_password_hashes(&store).await.unwrap(), 0);
    }
}
