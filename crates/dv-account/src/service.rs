//! Account encryption flows
//!
//! Server-side protocol: registration, login-time provisioning, encryption
//! setup, password change, and recovery-based reset. Each flow runs its
//! CPU-bound key derivation in one `spawn_blocking` section and touches the
//! store only after every in-memory step succeeded, so a failure anywhere
//! leaves the stored envelope and password hash unchanged.

use std::time::Duration;

use secrecy::SecretString;
use uuid::Uuid;

use dv_core::config::DvConfig;
use dv_core::{DvError, DvResult, UserId, UserRecord};
use dv_crypto::{
    generate_recovery_code, hash_recovery_code, normalize_recovery_code, rewrap_password,
    unwrap_with_password, unwrap_with_recovery, wrap_with_password, wrap_with_recovery, KdfParams,
    MasterKey,
};

use crate::password;
use crate::reveal::PendingReveals;
use crate::store::{AccountStore, EncryptionUpdate};

/// Result of setting up encryption. The recovery code is shown to the user
/// exactly once; only its hash and the recovery envelope are stored.
#[derive(Debug)]
pub struct SetupOutcome {
    pub encrypted_master_key: String,
    pub recovery_code: String,
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user_id: UserId,
    /// Password envelope for the client-side unlock.
    pub encrypted_master_key: Option<String>,
    /// True when this login minted new recovery material; the code is held
    /// as a pending reveal for the user to view once.
    pub recovery_provisioned: bool,
}

/// Recovery material minted during login-time provisioning.
struct ProvisionedMaterial {
    /// Present only when the whole envelope was missing and freshly created.
    encrypted_master_key: Option<String>,
    recovery_code: String,
    recovery_key_hash: String,
    recovery_encrypted_master_key: String,
}

pub struct AccountService<S> {
    store: S,
    reveals: PendingReveals,
    kdf: KdfParams,
    min_password_len: usize,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: S, config: &DvConfig) -> DvResult<Self> {
        let kdf = KdfParams::new(config.crypto.pbkdf2_iterations)
            .ok_or_else(|| DvError::Config("pbkdf2_iterations must be non-zero".into()))?;

        Ok(Self {
            store,
            reveals: PendingReveals::new(Duration::from_secs(config.account.reveal_ttl_secs)),
            kdf,
            min_password_len: config.account.min_password_len,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an account with a password-wrapped master key.
    ///
    /// Recovery material is not minted here; it is provisioned at first
    /// login, where the reveal flow can show the code to the user.
    pub async fn register(&self, email: &str, password: SecretString) -> DvResult<UserRecord> {
        self.validate_password(&password)?;
        if self.store.find_by_email(email)?.is_some() {
            return Err(DvError::EmailTaken);
        }

        let params = self.kdf;
        let (password_hash, encrypted_master_key) =
            tokio::task::spawn_blocking(move || -> DvResult<(String, String)> {
                let hash = password::hash_password(&password)?;
                let master = MasterKey::generate();
                let blob = wrap_with_password(&master, &password, &params)
                    .map_err(|e| DvError::Other(anyhow::anyhow!("master key wrap failed: {e}")))?;
                Ok((hash, blob))
            })
            .await
            .map_err(join_err)??;

        let record = UserRecord {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            encrypted_master_key: Some(encrypted_master_key),
            recovery_key_hash: None,
            recovery_encrypted_master_key: None,
        };
        self.store.insert(record.clone())?;

        tracing::info!(user = %record.user_id, "registered account with encryption envelope");
        Ok(record)
    }

    /// Verify credentials and lazily provision missing encryption material.
    ///
    /// A user with no envelope at all (pre-encryption account) gets a master
    /// key, password envelope, and recovery material; a user with an
    /// envelope but no recovery key gets recovery material retrofitted by
    /// unwrapping with the just-verified password. Either way the fresh
    /// recovery code is parked as a pending reveal. Retrofit failures are
    /// logged and non-fatal to the login itself.
    pub async fn authenticate(&self, email: &str, password: SecretString) -> DvResult<LoginOutcome> {
        let user = self
            .store
            .find_by_email(email)?
            .ok_or(DvError::AuthenticationFailed)?;

        let params = self.kdf;
        let stored_hash = user.password_hash.clone();
        let envelope = user.encrypted_master_key.clone();
        let has_recovery = user.has_recovery();

        let provisioned = tokio::task::spawn_blocking(
            move || -> DvResult<Option<ProvisionedMaterial>> {
                if !password::verify_password(&password, &stored_hash) {
                    return Err(DvError::AuthenticationFailed);
                }

                match &envelope {
                    None => {
                        let master = MasterKey::generate();
                        let encrypted =
                            wrap_with_password(&master, &password, &params).map_err(|e| {
                                DvError::Other(anyhow::anyhow!("master key wrap failed: {e}"))
                            })?;
                        let material = mint_recovery_material(&master, &params)?;
                        Ok(Some(ProvisionedMaterial {
                            encrypted_master_key: Some(encrypted),
                            ..material
                        }))
                    }
                    Some(blob) if !has_recovery => {
                        match unwrap_with_password(blob, &password, &params) {
                            Ok(master) => Ok(Some(mint_recovery_material(&master, &params)?)),
                            Err(e) => {
                                tracing::warn!(
                                    "cannot unwrap master key at login, skipping recovery retrofit: {e}"
                                );
                                Ok(None)
                            }
                        }
                    }
                    Some(_) => Ok(None),
                }
            },
        )
        .await
        .map_err(join_err)??;

        let mut encrypted_master_key = user.encrypted_master_key.clone();
        let mut recovery_provisioned = false;

        if let Some(material) = provisioned {
            if material.encrypted_master_key.is_some() {
                encrypted_master_key = material.encrypted_master_key.clone();
            }
            self.store.apply_update(
                user.user_id,
                EncryptionUpdate {
                    encrypted_master_key: material.encrypted_master_key,
                    recovery_key_hash: Some(material.recovery_key_hash),
                    recovery_encrypted_master_key: Some(material.recovery_encrypted_master_key),
                    ..Default::default()
                },
            )?;
            self.reveals.insert(user.user_id, &material.recovery_code);
            recovery_provisioned = true;
            tracing::info!(user = %user.user_id, "provisioned recovery material at login");
        }

        Ok(LoginOutcome {
            user_id: user.user_id,
            encrypted_master_key,
            recovery_provisioned,
        })
    }

    /// Set up encryption for an account that has none (e.g. an OAuth user
    /// choosing an encryption password).
    ///
    /// Returns the password envelope and the recovery code. The code
    /// appears nowhere else and is not parked as a pending reveal: this
    /// response is its one display.
    pub async fn setup_encryption(
        &self,
        user_id: UserId,
        password: SecretString,
    ) -> DvResult<SetupOutcome> {
        self.validate_password(&password)?;
        let user = self
            .store
            .find_by_id(user_id)?
            .ok_or(DvError::AccountNotFound)?;
        if user.has_encryption() {
            return Err(DvError::AlreadySetUp);
        }

        let params = self.kdf;
        let (password_hash, encrypted_master_key, material) = tokio::task::spawn_blocking(
            move || -> DvResult<(String, String, ProvisionedMaterial)> {
                let hash = password::hash_password(&password)?;
                let master = MasterKey::generate();
                let encrypted = wrap_with_password(&master, &password, &params)
                    .map_err(|e| DvError::Other(anyhow::anyhow!("master key wrap failed: {e}")))?;
                let material = mint_recovery_material(&master, &params)?;
                Ok((hash, encrypted, material))
            },
        )
        .await
        .map_err(join_err)??;

        self.store.apply_update(
            user_id,
            EncryptionUpdate {
                password_hash: Some(password_hash),
                encrypted_master_key: Some(encrypted_master_key.clone()),
                recovery_key_hash: Some(material.recovery_key_hash),
                recovery_encrypted_master_key: Some(material.recovery_encrypted_master_key),
            },
        )?;

        tracing::info!(user = %user_id, "encryption set up");
        Ok(SetupOutcome {
            encrypted_master_key,
            recovery_code: material.recovery_code,
        })
    }

    /// Change the account password, re-wrapping the master key.
    ///
    /// Verifies the current password, then unwraps and re-wraps entirely in
    /// memory; the store sees the new hash and envelope in one write or not
    /// at all. Recovery material is untouched, so a previously issued
    /// recovery code keeps working. Returns the new envelope (or `None` for
    /// accounts without encryption).
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: SecretString,
        new_password: SecretString,
    ) -> DvResult<Option<String>> {
        self.validate_password(&new_password)?;
        let user = self
            .store
            .find_by_id(user_id)?
            .ok_or(DvError::AccountNotFound)?;

        let params = self.kdf;
        let stored_hash = user.password_hash.clone();
        let envelope = user.encrypted_master_key.clone();

        let (new_hash, new_envelope) = tokio::task::spawn_blocking(
            move || -> DvResult<(String, Option<String>)> {
                if !password::verify_password(&current_password, &stored_hash) {
                    return Err(DvError::AuthenticationFailed);
                }
                let new_hash = password::hash_password(&new_password)?;
                let new_envelope = match &envelope {
                    Some(blob) => Some(
                        rewrap_password(blob, &current_password, &new_password, &params).map_err(
                            |e| {
                                DvError::Other(anyhow::anyhow!(
                                    "failed to re-wrap master key: {e}"
                                ))
                            },
                        )?,
                    ),
                    None => None,
                };
                Ok((new_hash, new_envelope))
            },
        )
        .await
        .map_err(join_err)??;

        self.store.apply_update(
            user_id,
            EncryptionUpdate {
                password_hash: Some(new_hash),
                encrypted_master_key: new_envelope.clone(),
                ..Default::default()
            },
        )?;

        tracing::info!(user = %user_id, "password changed");
        Ok(new_envelope)
    }

    /// Whether the account can run the recovery flow.
    pub async fn check_recovery(&self, email: &str) -> DvResult<bool> {
        let user = self
            .store
            .find_by_email(email)?
            .ok_or(DvError::AccountNotFound)?;
        Ok(user.has_recovery())
    }

    /// Reset a lost password using the recovery code.
    ///
    /// The supplied code is normalized, hash-checked against the stored
    /// verification hash, and used to unwrap the recovery envelope; the
    /// recovered master key is then wrapped under the new password. Only
    /// the password hash and password envelope are replaced; the recovery
    /// material stays as issued. Returns the new password envelope.
    pub async fn reset_password_with_recovery(
        &self,
        email: &str,
        recovery_code: &str,
        new_password: SecretString,
    ) -> DvResult<String> {
        self.validate_password(&new_password)?;
        let user = self
            .store
            .find_by_email(email)?
            .ok_or(DvError::AccountNotFound)?;

        let (Some(stored_code_hash), Some(recovery_envelope)) = (
            user.recovery_key_hash.clone(),
            user.recovery_encrypted_master_key.clone(),
        ) else {
            return Err(DvError::NotSetUp);
        };

        let params = self.kdf;
        let code = recovery_code.to_string();

        let (new_hash, new_envelope) =
            tokio::task::spawn_blocking(move || -> DvResult<(String, String)> {
                let normalized = normalize_recovery_code(&code);
                if hash_recovery_code(&normalized) != stored_code_hash {
                    return Err(DvError::AuthenticationFailed);
                }

                let master = unwrap_with_recovery(&recovery_envelope, &normalized, &params)
                    .map_err(|_| DvError::AuthenticationFailed)?;

                let envelope = wrap_with_password(&master, &new_password, &params)
                    .map_err(|e| DvError::Other(anyhow::anyhow!("master key wrap failed: {e}")))?;
                let hash = password::hash_password(&new_password)?;
                Ok((hash, envelope))
            })
            .await
            .map_err(join_err)??;

        self.store.apply_update(
            user.user_id,
            EncryptionUpdate {
                password_hash: Some(new_hash),
                encrypted_master_key: Some(new_envelope.clone()),
                ..Default::default()
            },
        )?;

        tracing::info!(user = %user.user_id, "password reset via recovery key");
        Ok(new_envelope)
    }

    /// The recovery code minted at login, if its reveal window is still
    /// open. Repeatable until acknowledged, since it has to survive a
    /// redirect.
    pub fn pending_recovery_code(&self, user_id: UserId) -> Option<String> {
        self.reveals.evict_expired();
        self.reveals.peek(user_id)
    }

    /// Delete the pending reveal once the user confirms they saved the code.
    pub fn acknowledge_recovery_code(&self, user_id: UserId) {
        self.reveals.acknowledge(user_id);
    }

    fn validate_password(&self, password: &SecretString) -> DvResult<()> {
        use secrecy::ExposeSecret;
        if password.expose_secret().len() < self.min_password_len {
            return Err(DvError::InvalidPassword(format!(
                "password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }
}

/// Generate a recovery code and wrap the master key under it.
fn mint_recovery_material(
    master: &MasterKey,
    params: &KdfParams,
) -> DvResult<ProvisionedMaterial> {
    let code = generate_recovery_code();
    let hash = hash_recovery_code(&normalize_recovery_code(&code));
    let envelope = wrap_with_recovery(master, &code, params)
        .map_err(|e| DvError::Other(anyhow::anyhow!("recovery key wrap failed: {e}")))?;

    Ok(ProvisionedMaterial {
        encrypted_master_key: None,
        recovery_code: code,
        recovery_key_hash: hash,
        recovery_encrypted_master_key: envelope,
    })
}

fn join_err(e: tokio::task::JoinError) -> DvError {
    DvError::Other(anyhow::anyhow!("crypto task failed: {e}"))
}
