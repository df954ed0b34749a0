//! Pending recovery-code reveals
//!
//! A freshly generated recovery code has to survive exactly one redirect so
//! the user can read it, and no longer. Each entry is a narrow expiring
//! capability: peekable while its TTL holds, deleted when the user
//! acknowledges saving the code, swept on expiry. The code is held as a
//! `SecretString` and must never appear in logs or backups.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};

use dv_core::UserId;

struct Pending {
    code: SecretString,
    created_at: Instant,
}

/// Thread-safe store of pending reveals with TTL-based expiry.
pub struct PendingReveals {
    entries: Mutex<HashMap<UserId, Pending>>,
    ttl: Duration,
}

impl PendingReveals {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Record a just-generated code for one-time viewing. Replaces any
    /// previous pending code for the user.
    pub fn insert(&self, user_id: UserId, code: &str) {
        let mut map = self.entries.lock().unwrap();
        map.insert(
            user_id,
            Pending {
                code: SecretString::from(code.to_string()),
                created_at: Instant::now(),
            },
        );
    }

    /// The pending code, if still within its reveal window.
    pub fn peek(&self, user_id: UserId) -> Option<String> {
        let map = self.entries.lock().unwrap();
        match map.get(&user_id) {
            Some(pending) if pending.created_at.elapsed() < self.ttl => {
                Some(pending.code.expose_secret().to_string())
            }
            _ => None,
        }
    }

    /// Delete the pending code after the user confirms they saved it.
    pub fn acknowledge(&self, user_id: UserId) {
        let mut map = self.entries.lock().unwrap();
        map.remove(&user_id);
    }

    /// Drop all expired entries. Call periodically to avoid unbounded growth.
    pub fn evict_expired(&self) {
        let mut map = self.entries.lock().unwrap();
        map.retain(|_, pending| pending.created_at.elapsed() < self.ttl);
    }
}
