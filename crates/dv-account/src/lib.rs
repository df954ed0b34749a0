//! dv-account: server-side account encryption flows
//!
//! Registration, login-time provisioning, encryption setup, password
//! change, and recovery-based reset. The server only ever handles wrapped
//! key material and hashes; every flow computes its cryptographic results
//! fully in memory before touching the store, so a failed step leaves the
//! stored envelope unchanged.

pub mod migrate;
pub mod password;
pub mod reveal;
pub mod service;
pub mod store;

pub use migrate::migrate_legacy_password_hashes;
pub use reveal::PendingReveals;
pub use service::{AccountService, LoginOutcome, SetupOutcome};
pub use store::{AccountStore, EncryptionUpdate, MemoryStore};
