use thiserror::Error;

pub type DvResult<T> = Result<T, DvError>;

#[derive(Debug, Error)]
pub enum DvError {
    /// The account has no encryption envelope yet. Distinguished from
    /// `AuthenticationFailed` so callers can offer setup instead of a
    /// password retry.
    #[error("encryption is not set up for this account")]
    NotSetUp,

    #[error("encryption is already set up for this account")]
    AlreadySetUp,

    /// Wrong password or recovery key. Also covers corrupted envelopes:
    /// the two cases are not distinguished to the caller.
    #[error("incorrect password or recovery key")]
    AuthenticationFailed,

    #[error("invalid encrypted data format")]
    InvalidFormat,

    #[error("no account found with this email")]
    AccountNotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid password: {0}")]
    InvalidPassword(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
