//! Integration tests for recovery provisioning and password reset.
//!
//! Covers the lost-password path end to end: recovery material is minted at
//! first login, the code is viewable once through the pending reveal, and a
//! reset with the (case- and dash-insensitively entered) code re-wraps the
//! master key under a new password without touching the recovery envelope.

use secrecy::SecretString;

use dv_account::{AccountService, AccountStore, MemoryStore};
use dv_core::config::DvConfig;
use dv_core::DvError;
use dv_crypto::KdfParams;
use dv_session::UnlockSession;

fn test_config() -> DvConfig {
    let mut config = DvConfig::default();
    config.crypto.pbkdf2_iterations = 1000;
    config
}

fn test_service() -> AccountService<MemoryStore> {
    AccountService::new(MemoryStore::new(), &test_config()).unwrap()
}

fn test_session() -> UnlockSession {
    UnlockSession::new(KdfParams::new(1000).unwrap())
}

/// Register and log in once, returning the user id and the revealed code.
async fn provisioned_account(service: &AccountService<MemoryStore>) -> (dv_core::UserId, String) {
    service
        .register("user@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap();

    let login = service
        .authenticate("user@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap();
    assert!(login.recovery_provisioned);

    let code = service.pending_recovery_code(login.user_id).unwrap();
    (login.user_id, code)
}

#[tokio::test]
async fn first_login_retrofits_recovery_material() {
    let service = test_service();
    let (user_id, code) = provisioned_account(&service).await;

    let record = service.store().find_by_id(user_id).unwrap().unwrap();
    assert!(record.has_recovery());
    assert!(record
        .recovery_encrypted_master_key
        .as_ref()
        .unwrap()
        .starts_with("ENC:"));

    // code shape: dash-separated uppercase alphanumeric groups
    assert!(code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-'));

    // second login does not mint again
    let login = service
        .authenticate("user@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap();
    assert!(!login.recovery_provisioned);
}

#[tokio::test]
async fn pending_reveal_is_one_time_after_acknowledgment() {
    let service = test_service();
    let (user_id, code) = provisioned_account(&service).await;

    // survives a "page reload"
    assert_eq!(service.pending_recovery_code(user_id).unwrap(), code);

    service.acknowledge_recovery_code(user_id);
    assert!(service.pending_recovery_code(user_id).is_none());
}

#[tokio::test]
async fn recovery_reset_with_sloppy_code_formatting() {
    let service = test_service();
    let (user_id, code) = provisioned_account(&service).await;

    let record_before = service.store().find_by_id(user_id).unwrap().unwrap();
    let old_envelope = record_before.encrypted_master_key.clone().unwrap();

    // encrypt a field under the original master key
    let session = test_session();
    session
        .unlock_with_password(&old_envelope, SecretString::from("correcthorse"))
        .await;
    let encrypted = session.encrypt_field("survives recovery").await;
    session.lock().await;

    // lowercase the code and sprinkle whitespace: must still verify
    let sloppy = format!(" {} ", code.to_lowercase());
    let new_envelope = service
        .reset_password_with_recovery(
            "user@example.com",
            &sloppy,
            SecretString::from("newpass123"),
        )
        .await
        .unwrap();
    assert_ne!(new_envelope, old_envelope);

    let record_after = service.store().find_by_id(user_id).unwrap().unwrap();
    // password envelope replaced, recovery material untouched
    assert_eq!(
        record_after.encrypted_master_key.as_deref(),
        Some(new_envelope.as_str())
    );
    assert_eq!(
        record_after.recovery_key_hash,
        record_before.recovery_key_hash
    );
    assert_eq!(
        record_after.recovery_encrypted_master_key,
        record_before.recovery_encrypted_master_key
    );

    // content written before the reset decrypts under the new password
    assert!(
        session
            .unlock_with_password(&new_envelope, SecretString::from("newpass123"))
            .await
    );
    assert_eq!(session.decrypt_field(&encrypted).await, "survives recovery");

    // the same recovery code still works after the reset
    let again = service
        .reset_password_with_recovery(
            "user@example.com",
            &code,
            SecretString::from("anotherpass"),
        )
        .await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn recovery_reset_rejects_wrong_code() {
    let service = test_service();
    let (user_id, code) = provisioned_account(&service).await;

    // flip the last character to another symbol
    let mut wrong = code.clone();
    let last = wrong.pop().unwrap();
    wrong.push(if last == 'A' { 'B' } else { 'A' });

    let err = service
        .reset_password_with_recovery(
            "user@example.com",
            &wrong,
            SecretString::from("newpass123"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DvError::AuthenticationFailed));

    // nothing changed
    let record = service.store().find_by_id(user_id).unwrap().unwrap();
    assert!(record.has_recovery());
}

#[tokio::test]
async fn recovery_reset_without_material_is_not_set_up() {
    let service = test_service();
    // registered but never logged in: no recovery material yet
    service
        .register("user@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap();

    let err = service
        .reset_password_with_recovery(
            "user@example.com",
            "WXYZ-1234-AB12-99ZZ",
            SecretString::from("newpass123"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DvError::NotSetUp));
}

#[tokio::test]
async fn check_recovery_reflects_provisioning() {
    let service = test_service();
    service
        .register("user@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap();

    assert!(!service.check_recovery("user@example.com").await.unwrap());

    service
        .authenticate("user@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap();

    assert!(service.check_recovery("user@example.com").await.unwrap());

    let err = service
        .check_recovery("missing@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, DvError::AccountNotFound));
}

#[tokio::test]
async fn authenticate_rejects_bad_credentials() {
    let service = test_service();
    service
        .register("user@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap();

    let err = service
        .authenticate("user@example.com", SecretString::from("wrongpassword"))
        .await
        .unwrap_err();
    assert!(matches!(err, DvError::AuthenticationFailed));

    // unknown email fails the same way, not with a not-found error
    let err = service
        .authenticate("ghost@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap_err();
    assert!(matches!(err, DvError::AuthenticationFailed));
}

#[tokio::test]
async fn login_provisions_envelope_for_pre_encryption_account() {
    use dv_core::UserRecord;
    use uuid::Uuid;

    let service = test_service();

    // seed a pre-encryption account directly: hashed password, no envelope
    let user_id = Uuid::new_v4();
    let password_hash =
        dv_account::password::hash_password(&SecretString::from("correcthorse")).unwrap();
    service
        .store()
        .insert(UserRecord {
            user_id,
            email: "old@example.com".to_string(),
            password_hash,
            encrypted_master_key: None,
            recovery_key_hash: None,
            recovery_encrypted_master_key: None,
        })
        .unwrap();

    let login = service
        .authenticate("old@example.com", SecretString::from("correcthorse"))
        .await
        .unwrap();
    assert!(login.recovery_provisioned);

    let envelope = login.encrypted_master_key.unwrap();
    assert!(envelope.starts_with("ENC:"));

    // the minted envelope unlocks with the login password
    let session = test_session();
    assert!(
        session
            .unlock_with_password(&envelope, SecretString::from("correcthorse"))
            .await
    );

    // and the recovery code recovers the same master key: reset then unlock
    let code = service.pending_recovery_code(user_id).unwrap();
    let encrypted = session.encrypt_field("minted at login").await;
    session.lock().await;

    let new_envelope = service
        .reset_password_with_recovery("old@example.com", &code, SecretString::from("newpass123"))
        .await
        .unwrap();
    assert!(
        session
            .unlock_with_password(&new_envelope, SecretString::from("newpass123"))
            .await
    );
    assert_eq!(session.decrypt_field(&encrypted).await, "minted at login");
}
